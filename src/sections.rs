//! Splits extracted page text into titled sections.
//!
//! A section runs from one detected heading to the next and keeps the page
//! number the heading was found on. Text that is not under any heading is
//! grouped per page and titled with its first line.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pdf_processor::PageText;
use crate::utils::truncate_at_char_boundary;

const MIN_HEADING_LEN: usize = 4;
const MAX_HEADING_LEN: usize = 100;
const MAX_HEADING_WORDS: usize = 12;
const FALLBACK_TITLE_LEN: usize = 80;

static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d+(\.\d+)*\.?\s+[A-Z][^.!?]*$",             // 1. Numbered / 2.3 Nested
        r"^(Chapter|CHAPTER|Part|PART)\s+[\dIVXLC]+\b.*$", // Chapter headings
        r"^[A-Z][A-Z0-9\s&'/\-]{3,}$",                 // ALL CAPS headings
        r"^[A-Z][A-Za-z\s]{3,}:$",                     // Capitalised label:
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TITLE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9'\-]*(\s+[A-Za-z0-9'&\-]+)*$").unwrap());

const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "into", "of", "on", "or", "the",
    "to", "with",
];

/// A located, titled block of text from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub document: String,
    pub doc_index: usize,
    pub page_number: u32,
    /// Order of appearance inside the document.
    pub position: usize,
    pub title: String,
    pub content: String,
}

/// Returns the heading text if `line` looks like a heading.
pub fn heading_title(line: &str) -> Option<String> {
    let line = line.trim();
    let len = line.chars().count();
    if !(MIN_HEADING_LEN..=MAX_HEADING_LEN).contains(&len) {
        return None;
    }
    if line.split_whitespace().count() > MAX_HEADING_WORDS {
        return None;
    }
    if line.ends_with(['.', ',', ';']) {
        return None;
    }

    let is_heading =
        HEADING_PATTERNS.iter().any(|re| re.is_match(line)) || is_title_case(line);
    is_heading.then(|| line.trim_end_matches(':').trim().to_string())
}

/// A single capitalised word, or several where every word that isn't a
/// minor word is capitalised.
fn is_title_case(line: &str) -> bool {
    if !TITLE_CASE.is_match(line) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() == 1 {
        return line.chars().all(char::is_alphabetic);
    }
    words.iter().skip(1).all(|w| {
        MINOR_WORDS.contains(&w.to_lowercase().as_str())
            || w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
    })
}

struct OpenSection {
    page_number: u32,
    title: String,
    from_heading: bool,
    lines: Vec<String>,
}

pub fn identify_sections(doc_index: usize, document: &str, pages: &[PageText]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<OpenSection> = None;

    let flush = |open: Option<OpenSection>, sections: &mut Vec<Section>| {
        if let Some(open) = open {
            if open.lines.is_empty() {
                return;
            }
            sections.push(Section {
                document: document.to_string(),
                doc_index,
                page_number: open.page_number,
                position: sections.len(),
                title: open.title,
                content: open.lines.join(" "),
            });
        }
    };

    for page in pages {
        // Untitled text is grouped per page.
        if current.as_ref().is_some_and(|s| !s.from_heading) {
            flush(current.take(), &mut sections);
        }

        for line in page.text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(title) = heading_title(line) {
                flush(current.take(), &mut sections);
                current = Some(OpenSection {
                    page_number: page.number,
                    title,
                    from_heading: true,
                    lines: Vec::new(),
                });
                continue;
            }

            match current.as_mut() {
                Some(open) => open.lines.push(line.to_string()),
                None => {
                    current = Some(OpenSection {
                        page_number: page.number,
                        title: truncate_at_char_boundary(line, FALLBACK_TITLE_LEN)
                            .trim()
                            .to_string(),
                        from_heading: false,
                        lines: vec![line.to_string()],
                    })
                }
            }
        }
    }
    flush(current.take(), &mut sections);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_heading_shapes() {
        assert_eq!(heading_title("2.1 Experimental Setup").as_deref(), Some("2.1 Experimental Setup"));
        assert_eq!(heading_title("Chapter 3 Results").as_deref(), Some("Chapter 3 Results"));
        assert_eq!(heading_title("CONCLUSIONS").as_deref(), Some("CONCLUSIONS"));
        assert_eq!(heading_title("Coastal Adventures").as_deref(), Some("Coastal Adventures"));
        assert_eq!(heading_title("Things to Do in Nice").as_deref(), Some("Things to Do in Nice"));
        assert_eq!(heading_title("Ingredients:").as_deref(), Some("Ingredients"));
        assert_eq!(heading_title("Nightlife").as_deref(), Some("Nightlife"));
    }

    #[test]
    fn test_prose_is_not_a_heading() {
        assert_eq!(heading_title("The model was trained on four datasets."), None);
        assert_eq!(heading_title("The quick brown fox jumps"), None);
        assert_eq!(heading_title("however"), None);
        assert_eq!(heading_title("Step2b"), None);
        assert_eq!(heading_title(&"Word ".repeat(20)), None);
    }

    #[test]
    fn test_sections_keep_heading_page() {
        let pages = vec![
            page(1, "Introduction\nThis guide covers the coast.\nBeaches are plentiful."),
            page(2, "more text about beaches\nNightlife\nClubs open late in Nice."),
        ];
        let sections = identify_sections(0, "guide.pdf", &pages);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Introduction");
        assert_eq!(sections[0].page_number, 1);
        assert!(sections[0].content.contains("more text about beaches"));
        assert_eq!(sections[1].title, "Nightlife");
        assert_eq!(sections[1].page_number, 2);
        assert_eq!(sections[1].position, 1);
    }

    #[test]
    fn test_untitled_text_falls_back_per_page() {
        let pages = vec![
            page(1, "plain text without any headings, just prose."),
            page(4, "another page of prose, also lowercase."),
        ];
        let sections = identify_sections(2, "notes.pdf", &pages);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].page_number, 1);
        assert_eq!(sections[1].page_number, 4);
        assert_eq!(sections[1].title, "another page of prose, also lowercase.");
        assert!(sections.iter().all(|s| s.doc_index == 2));
    }

    #[test]
    fn test_empty_headings_are_dropped() {
        let pages = vec![page(1, "CONTENTS\nMethodology\nWe sampled cities at random.")];
        let sections = identify_sections(0, "a.pdf", &pages);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Methodology");
    }
}
