//! Text hygiene for third-party feed content.
//!
//! Everything rendered comes from remote feeds and scraped pages, so it is
//! plain-text-ified first: tags stripped, whitespace collapsed, control
//! characters removed, and lengths bounded (by characters for summaries, by
//! terminal columns for card lines).

use unicode_width::UnicodeWidthChar;

/// Collapses all whitespace runs to single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes HTML/XML tags and collapses the remaining whitespace.
///
/// Feed descriptions routinely embed markup (`<p>`, `<b>`, tracking pixels);
/// only the text content is displayable.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

/// Flattens a value to one clean line: control characters (including
/// newlines) become spaces, then whitespace collapses.
pub fn sanitize_line(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    collapse_whitespace(&replaced)
}

/// First `max` characters, cut on a character boundary. No ellipsis.
pub fn head_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Last `max` characters, cut on a character boundary. No ellipsis.
pub fn tail_chars(s: &str, max: usize) -> String {
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(max)).collect()
}

/// Bounds a summary to `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = head_chars(s, max);
    out.push('…');
    out
}

/// Bounds a line to `max_cols` terminal columns (Unicode-aware), appending
/// "..." when cut.
pub fn truncate_to_width(s: &str, max_cols: usize) -> String {
    const ELLIPSIS: &str = "...";
    let total: usize = s.chars().filter_map(UnicodeWidthChar::width).sum();
    if total <= max_cols {
        return s.to_string();
    }

    let budget = max_cols.saturating_sub(ELLIPSIS.len());
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ELLIPSIS);
    out
}
