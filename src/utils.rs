use std::path::Path;

use anyhow::Result;

pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Longest prefix of `text` that is at most `max_bytes` long and ends on a
/// char boundary.
pub fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Short excerpt for log lines.
pub fn preview(text: &str, max_bytes: usize) -> String {
    let head = truncate_at_char_boundary(text, max_bytes);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}
