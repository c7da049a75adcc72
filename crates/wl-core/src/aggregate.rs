//! Daily aggregation of time records.

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::entry::{WorklogEntry, sentences};
use crate::record::{Hours, TimeRecord};

/// Totals for one civil day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    /// The day, in the timezone of the `as_of` timestamp.
    pub date: NaiveDate,
    /// Total tracked time, rounded to tenths of an hour.
    pub hours: Hours,
    /// True if any contributing record is still running.
    pub is_open: bool,
    /// Distinct task labels in first-seen order, split into sentences.
    pub labels: Vec<String>,
}

impl DaySummary {
    /// Converts the summary into a renderable worklog entry.
    pub fn into_entry(self) -> WorklogEntry {
        WorklogEntry::new(self.date, self.hours, self.is_open, self.labels)
    }
}

impl From<DaySummary> for WorklogEntry {
    fn from(summary: DaySummary) -> Self {
        summary.into_entry()
    }
}

/// Reduces a day's records into a [`DaySummary`] as of the given instant.
///
/// The summary date is `as_of`'s civil date in its own timezone, so callers
/// choose the day boundary by choosing the timezone of `as_of`.
pub fn aggregate<Tz: TimeZone>(records: &[TimeRecord], as_of: &DateTime<Tz>) -> DaySummary {
    let mut total_seconds: u64 = 0;
    let mut is_open = false;
    let mut labels = Vec::new();

    for record in records {
        total_seconds = total_seconds.saturating_add(record.elapsed_seconds(as_of));
        is_open |= record.is_running();
        if let Some(label) = &record.label {
            push_label(&mut labels, label);
        }
    }

    DaySummary {
        date: as_of.date_naive(),
        hours: Hours::from_seconds(total_seconds),
        is_open,
        labels,
    }
}

/// Appends each sentence of `label` unless it is already present.
///
/// Labels are stored in the same sentence form that parsing a rendered entry
/// produces, so a label survives a render and parse unchanged.
pub(crate) fn push_label(labels: &mut Vec<String>, label: &str) {
    for sentence in sentences(label) {
        if !labels.iter().any(|existing| existing == sentence) {
            labels.push(sentence.to_string());
        }
    }
}
