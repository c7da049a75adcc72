//! Core worklog model for the Toggl-to-GitHub worklog sync.
//!
//! This crate contains the pure, synchronous logic for:
//! - Aggregation: reducing a day's time records into a `DaySummary`
//! - Entries: rendering, parsing, and merging worklog lines
//! - Documents: locating and rewriting today's entry inside a worklog file
//!
//! Nothing here performs I/O. The civil timezone arrives through the
//! `TimeZone` of the timestamps callers pass in.

pub mod aggregate;
pub mod day;
pub mod document;
pub mod entry;
pub mod record;

pub use aggregate::{DaySummary, aggregate};
pub use day::DayWindow;
pub use document::{apply_entry, find_entry_span};
pub use entry::{WorklogEntry, date_prefix};
pub use record::{Hours, InvalidHours, TimeRecord};
