//! The worklog line grammar.
//!
//! A rendered entry looks like:
//!
//! ```text
//! 2025-4-9 Wed (1.5h+): Task 1. Task 2.
//! ```
//!
//! Year is four digits, month and day are not zero-padded, the weekday is a
//! three-letter English abbreviation, hours carry exactly one decimal, and a
//! `+` marks a day with a running timer. This is the on-disk format of the
//! worklog file, so rendering must stay byte-stable.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;

use crate::aggregate::push_label;
use crate::record::Hours;

/// Full entry: header plus a description tail that may span several lines.
static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A(\d{4})-([1-9]\d?)-([1-9]\d?) ([A-Za-z]{3}) \((\d+(?:\.\d*)?)h(\+?)\): (.*)\z")
        .expect("entry pattern is valid")
});

/// Header only, for recognising the first line of an entry.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\d{4}-[1-9]\d?-[1-9]\d? [A-Za-z]{3} \(\d+(?:\.\d*)?h\+?\): ")
        .expect("header pattern is valid")
});

/// One day's line in the worklog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogEntry {
    pub date: NaiveDate,
    pub hours: Hours,
    pub is_open: bool,
    pub descriptions: Vec<String>,
}

impl WorklogEntry {
    pub const fn new(
        date: NaiveDate,
        hours: Hours,
        is_open: bool,
        descriptions: Vec<String>,
    ) -> Self {
        Self {
            date,
            hours,
            is_open,
            descriptions,
        }
    }

    /// Three-letter weekday name, always derived from `date`.
    pub fn weekday_abbrev(&self) -> &'static str {
        match self.date.weekday() {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }

    /// Descriptions joined into sentences with a final period.
    ///
    /// Only the overall terminator is guaranteed; a description that already
    /// ends in a period is joined as-is.
    pub fn description_text(&self) -> String {
        let mut text = self.descriptions.join(". ");
        if !text.is_empty() && !text.ends_with('.') {
            text.push('.');
        }
        text
    }

    /// Renders the entry in the worklog grammar.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Parses an entry, returning `None` for anything outside the grammar.
    ///
    /// The weekday token must be three letters but is not trusted: the parsed
    /// entry recomputes it from the date.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = ENTRY_RE.captures(text)?;

        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let hours: Hours = caps[5].parse().ok()?;
        let is_open = &caps[6] == "+";

        let descriptions = sentences(&caps[7]).map(String::from).collect();

        Some(Self {
            date,
            hours,
            is_open,
            descriptions,
        })
    }

    /// Combines an existing entry with a recomputed one for the same date.
    ///
    /// Hours take the maximum rather than the sum, since the incoming entry
    /// already covers the whole day. The open marker is sticky and
    /// descriptions are unioned, existing first. Dates are not re-checked.
    pub fn merge(&self, incoming: &Self) -> Self {
        let mut descriptions =
            Vec::with_capacity(self.descriptions.len() + incoming.descriptions.len());
        for description in self.descriptions.iter().chain(&incoming.descriptions) {
            push_label(&mut descriptions, description);
        }

        Self {
            date: self.date,
            hours: self.hours.max(incoming.hours),
            is_open: self.is_open || incoming.is_open,
            descriptions,
        }
    }
}

impl fmt::Display for WorklogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}h{}): {}",
            date_prefix(self.date).trim_end(),
            self.weekday_abbrev(),
            self.hours,
            if self.is_open { "+" } else { "" },
            self.description_text()
        )
    }
}

/// The `YYYY-M-D ` prefix (with trailing space) that starts an entry line.
pub fn date_prefix(date: NaiveDate) -> String {
    format!("{:04}-{}-{} ", date.year(), date.month(), date.day())
}

/// Splits description text into sentences.
///
/// A sentence ends at a period followed by whitespace or the end of the
/// text, so `v1.2` stays whole. Pieces are trimmed of whitespace and
/// trailing periods; empty pieces are dropped. Rendering the result and
/// splitting again yields the same pieces.
pub(crate) fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c == '.' && chars.peek().is_none_or(|&(_, next)| next.is_whitespace()) {
            pieces.push(&text[start..index]);
            start = index + 1;
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(|piece| piece.trim().trim_end_matches('.').trim_end())
        .filter(|piece| !piece.is_empty())
}

/// Returns true if the line starts with a well-formed entry header.
pub(crate) fn is_entry_header(line: &str) -> bool {
    HEADER_RE.is_match(line)
}
