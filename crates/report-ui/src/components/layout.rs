//! Column alignment by display width, so Cyrillic and other wide labels
//! line up in the terminal.

use unicode_width::UnicodeWidthStr;

/// Pad `text` with spaces to `width` display columns. Longer text is
/// returned unchanged.
pub fn pad_right(text: &str, width: usize) -> String {
    let shown = text.width();
    if shown >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - shown))
    }
}

/// Two-column rows with the left column padded to its widest entry.
pub fn aligned_rows(rows: &[(String, String)]) -> Vec<String> {
    let width = rows.iter().map(|(l, _)| l.width()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, right)| format!("{}  {}", pad_right(left, width), right))
        .collect()
}

/// Section title underlined with `-` to its display width.
pub fn section(title: &str) -> Vec<String> {
    vec![title.to_string(), "-".repeat(title.width())]
}
