//! Checklist extraction from note text.
//!
//! A checklist line looks like `- [ ] buy milk` or `- [x] call mom`.
//! Leading and trailing whitespace on the line is ignored.

use crate::models::TaskStatus;

/// Parse a single line; returns `None` for non-checklist lines and empty items
pub fn parse_line(line: &str) -> Option<(String, TaskStatus)> {
    let stripped = line.trim();
    let rest = stripped.strip_prefix("- [")?;

    let mut chars = rest.chars();
    let marker = chars.next();
    let status = match marker {
        Some('x') | Some('X') => TaskStatus::Done,
        _ => TaskStatus::Undone,
    };

    // skip the marker and the closing bracket
    chars.next();
    let text = chars.as_str().trim();
    if text.is_empty() {
        None
    } else {
        Some((text.to_string(), status))
    }
}

/// Extract every checklist item from a note, in order of appearance
pub fn parse_checklist(content: &str) -> Vec<(String, TaskStatus)> {
    content.lines().filter_map(parse_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_mixed_note() {
        let note = "Buy milk\n- [ ] task A\n- [x] task B";
        assert_eq!(
            parse_checklist(note),
            vec![
                ("task A".to_string(), TaskStatus::Undone),
                ("task B".to_string(), TaskStatus::Done),
            ]
        );
    }

    #[test]
    fn test_uppercase_marker_and_indentation() {
        assert_eq!(
            parse_line("    - [X]   Report  "),
            Some(("Report".to_string(), TaskStatus::Done))
        );
    }

    #[test]
    fn test_skips_empty_items_and_plain_bullets() {
        assert_eq!(parse_line("- [ ]"), None);
        assert_eq!(parse_line("- [x]    "), None);
        assert_eq!(parse_line("- plain bullet"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_unknown_marker_counts_as_undone() {
        assert_eq!(
            parse_line("- [-] maybe"),
            Some(("maybe".to_string(), TaskStatus::Undone))
        );
    }
}
