use crate::ranking::QueryProfile;
use crate::utils::truncate_at_char_boundary;

/// Splits prose after `.`, `!` or `?` when followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Condenses `content` to the sentences most relevant to `profile`, in their
/// original order, within `max_chars` bytes. Falls back to the leading
/// sentences when nothing matches.
pub fn refine_text(content: &str, profile: &QueryProfile, max_chars: usize) -> String {
    let sentences = split_sentences(content);
    if sentences.is_empty() || max_chars == 0 {
        return String::new();
    }

    let mut order: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, profile.score_text(s)))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let best = order[0].0;

    let mut picked = Vec::new();
    let mut used = 0;
    for (i, _) in order {
        let len = sentences[i].len() + usize::from(!picked.is_empty());
        if used + len > max_chars {
            continue;
        }
        used += len;
        picked.push(i);
    }

    if picked.is_empty() {
        // Even the shortest sentence is too long: cut the best one.
        return truncate_at_char_boundary(sentences[best], max_chars).trim_end().to_string();
    }

    picked.sort_unstable();
    picked
        .iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ")
}
