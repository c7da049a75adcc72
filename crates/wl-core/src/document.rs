//! Locating and rewriting a day's entry inside a worklog document.
//!
//! # Record boundaries
//!
//! An entry starts at a line beginning with `YYYY-M-D ` followed by a
//! well-formed header. It extends over following lines until one of:
//! - a blank line
//! - a rule line (starting with `*`, or a `---` / `___` thematic break)
//! - a Markdown heading
//! - another entry header
//! - the end of the document
//!
//! The span never includes the terminating newline, so replacing it leaves
//! the document's separators untouched.

use std::ops::Range;

use chrono::NaiveDate;

use crate::entry::{date_prefix, is_entry_header};

/// Finds the byte range of the entry for `date`, if the document has one.
pub fn find_entry_span(document: &str, date: NaiveDate) -> Option<Range<usize>> {
    let prefix = date_prefix(date);
    let mut lines = lines_with_offsets(document);

    while let Some((start, line)) = lines.next() {
        if !line.starts_with(&prefix) || !is_entry_header(line) {
            continue;
        }

        let mut end = start + line.len();
        for (offset, next) in lines.by_ref() {
            if ends_entry(next) {
                break;
            }
            end = offset + next.len();
        }
        return Some(start..end);
    }

    None
}

/// Writes `entry_text` into the document as the entry for `date`.
///
/// An existing entry is replaced in place. Otherwise the entry becomes a new
/// paragraph after a leading `# ` title, or at the very top. Applying the
/// same text twice yields the same document as applying it once.
pub fn apply_entry(document: &str, entry_text: &str, date: NaiveDate) -> String {
    if let Some(span) = find_entry_span(document, date) {
        let mut updated =
            String::with_capacity(document.len() - span.len() + entry_text.len());
        updated.push_str(&document[..span.start]);
        updated.push_str(entry_text);
        updated.push_str(&document[span.end..]);
        return updated;
    }

    if document.starts_with("# ") {
        let (title, rest) = document
            .find('\n')
            .map_or((document, ""), |newline| document.split_at(newline + 1));

        let mut updated = String::with_capacity(document.len() + entry_text.len() + 3);
        updated.push_str(title);
        if !title.ends_with('\n') {
            updated.push('\n');
        }
        updated.push('\n');
        updated.push_str(entry_text);
        updated.push('\n');
        if !rest.is_empty() && !starts_with_blank_line(rest) {
            updated.push('\n');
        }
        updated.push_str(rest);
        return updated;
    }

    if document.is_empty() {
        return format!("{entry_text}\n");
    }
    format!("{entry_text}\n\n{document}")
}

/// Yields `(byte_offset, line)` pairs with line terminators stripped.
fn lines_with_offsets(document: &str) -> impl Iterator<Item = (usize, &str)> {
    document
        .split_inclusive('\n')
        .scan(0, |offset, raw| {
            let start = *offset;
            *offset += raw.len();
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            let line = line.strip_suffix('\r').unwrap_or(line);
            Some((start, line))
        })
}

fn ends_entry(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('*')
        || is_thematic_break(line)
        || is_heading(line)
        || is_entry_header(line)
}

fn is_thematic_break(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for mark in marks {
        if mark != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

fn is_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes) && line[hashes..].chars().next().is_none_or(char::is_whitespace)
}

fn starts_with_blank_line(text: &str) -> bool {
    text.split('\n')
        .next()
        .is_some_and(|first| first.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "2025-4-9 Wed (1.5h): A.\n\n2025-4-8 Tue (2.0h+): B.\n\n* * *\n\n2025-4-7 Mon (3.0h): C.\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn span_covers_exactly_the_first_line() {
        let span = find_entry_span(SCENARIO, date(2025, 4, 9)).unwrap();
        assert_eq!(&SCENARIO[span], "2025-4-9 Wed (1.5h): A.");
    }

    #[test]
    fn span_found_for_later_entries() {
        let span = find_entry_span(SCENARIO, date(2025, 4, 8)).unwrap();
        assert_eq!(&SCENARIO[span], "2025-4-8 Tue (2.0h+): B.");
        let span = find_entry_span(SCENARIO, date(2025, 4, 7)).unwrap();
        assert_eq!(&SCENARIO[span], "2025-4-7 Mon (3.0h): C.");
    }

    #[test]
    fn missing_date_has_no_span() {
        assert!(find_entry_span(SCENARIO, date(2025, 4, 10)).is_none());
        assert!(find_entry_span("", date(2025, 4, 10)).is_none());
    }

    #[test]
    fn date_prefix_must_match_exactly() {
        let doc = "2025-4-10 Thu (1.0h): Ten.\n\n12025-4-1 Sun (1.0h): Odd.\n";
        assert!(find_entry_span(doc, date(2025, 4, 1)).is_none());
    }

    #[test]
    fn malformed_header_is_not_an_entry() {
        let doc = "2025-4-9 notes about today\n\n2025-4-9 Wed 1.5h: A.\n";
        assert!(find_entry_span(doc, date(2025, 4, 9)).is_none());
    }

    #[test]
    fn span_includes_continuation_lines() {
        let doc = "2025-4-9 Wed (1.5h): A.\nMore about A.\n\n2025-4-8 Tue (1.0h): B.\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span], "2025-4-9 Wed (1.5h): A.\nMore about A.");
    }

    #[test]
    fn span_stops_at_adjacent_entry_without_blank_line() {
        let doc = "2025-4-9 Wed (1.5h): A.\n2025-4-8 Tue (1.0h): B.\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span.clone()], "2025-4-9 Wed (1.5h): A.");

        let other = find_entry_span(doc, date(2025, 4, 8)).unwrap();
        assert!(span.end <= other.start);
    }

    #[test]
    fn span_stops_at_rules_and_headings() {
        let doc = "2025-4-9 Wed (1.5h): A.\n---\nfooter\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span], "2025-4-9 Wed (1.5h): A.");

        let doc = "2025-4-9 Wed (1.5h): A.\n* bullet\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span], "2025-4-9 Wed (1.5h): A.");

        let doc = "2025-4-9 Wed (1.5h): A.\n## April\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span], "2025-4-9 Wed (1.5h): A.");
    }

    #[test]
    fn span_excludes_carriage_return() {
        let doc = "2025-4-9 Wed (1.5h): A.\r\n\r\n2025-4-8 Tue (1.0h): B.\r\n";
        let span = find_entry_span(doc, date(2025, 4, 9)).unwrap();
        assert_eq!(&doc[span], "2025-4-9 Wed (1.5h): A.");
    }

    #[test]
    fn replacing_existing_entry_leaves_everything_else() {
        let updated = apply_entry(SCENARIO, "2025-4-9 Wed (2.5h): A. D.", date(2025, 4, 9));
        assert_eq!(
            updated,
            "2025-4-9 Wed (2.5h): A. D.\n\n2025-4-8 Tue (2.0h+): B.\n\n* * *\n\n2025-4-7 Mon (3.0h): C.\n"
        );
    }

    #[test]
    fn new_entry_goes_after_title() {
        let doc = "# Worklog\n\n2025-4-8 Tue (2.0h): B.\n";
        let updated = apply_entry(doc, "2025-4-9 Wed (1.5h): A.", date(2025, 4, 9));
        assert_eq!(
            updated,
            "# Worklog\n\n2025-4-9 Wed (1.5h): A.\n\n2025-4-8 Tue (2.0h): B.\n"
        );
    }

    #[test]
    fn new_entry_after_title_without_blank_line() {
        let doc = "# Worklog\nIntro text.\n";
        let updated = apply_entry(doc, "2025-4-9 Wed (1.5h): A.", date(2025, 4, 9));
        assert_eq!(updated, "# Worklog\n\n2025-4-9 Wed (1.5h): A.\n\nIntro text.\n");
    }

    #[test]
    fn new_entry_after_bare_title() {
        let updated = apply_entry("# Worklog", "2025-4-9 Wed (1.5h): A.", date(2025, 4, 9));
        assert_eq!(updated, "# Worklog\n\n2025-4-9 Wed (1.5h): A.\n");
    }

    #[test]
    fn new_entry_prepended_without_title() {
        let doc = "2025-4-8 Tue (2.0h): B.\n";
        let updated = apply_entry(doc, "2025-4-9 Wed (1.5h): A.", date(2025, 4, 9));
        assert_eq!(updated, "2025-4-9 Wed (1.5h): A.\n\n2025-4-8 Tue (2.0h): B.\n");
    }

    #[test]
    fn new_entry_in_empty_document() {
        let updated = apply_entry("", "2025-4-9 Wed (1.5h): A.", date(2025, 4, 9));
        assert_eq!(updated, "2025-4-9 Wed (1.5h): A.\n");
    }

    #[test]
    fn apply_is_idempotent() {
        let text = "2025-4-9 Wed (1.5h): A.";
        let day = date(2025, 4, 9);
        for doc in [
            "",
            "# Worklog",
            "# Worklog\n",
            "# Worklog\n\n2025-4-8 Tue (2.0h): B.\n",
            "# Worklog\nIntro.\n",
            "Notes.\n",
            SCENARIO,
            "2025-4-9 Wed (0.5h+): Old.\nContinued.\n\nTail.\n",
        ] {
            let once = apply_entry(doc, text, day);
            let twice = apply_entry(&once, text, day);
            assert_eq!(once, twice, "not idempotent for {doc:?}");
        }
    }

    #[test]
    fn spans_for_two_inserted_dates_do_not_overlap() {
        let a = date(2025, 4, 9);
        let b = date(2025, 4, 10);
        let doc = apply_entry("# Worklog\n", "2025-4-9 Wed (1.0h): Alpha.", a);
        let doc = apply_entry(&doc, "2025-4-10 Thu (2.0h): Beta.", b);

        let span_a = find_entry_span(&doc, a).unwrap();
        let span_b = find_entry_span(&doc, b).unwrap();
        assert_eq!(&doc[span_a.clone()], "2025-4-9 Wed (1.0h): Alpha.");
        assert!(span_a.end <= span_b.start || span_b.end <= span_a.start);
    }

    #[test]
    fn thematic_break_detection() {
        assert!(is_thematic_break("---"));
        assert!(is_thematic_break("* * *"));
        assert!(is_thematic_break(" _ _ _ "));
        assert!(!is_thematic_break("--"));
        assert!(!is_thematic_break("-*-"));
        assert!(!is_thematic_break("- item"));
    }
}
