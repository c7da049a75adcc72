//! Export command: writes completed time records to CSV.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use wl_api::RecordSource;
use wl_core::{DayWindow, Hours, TimeRecord};

#[derive(Debug, Serialize)]
struct ExportRow {
    #[serde(rename = "Start date")]
    start_date: String,
    #[serde(rename = "Start time")]
    start_time: String,
    #[serde(rename = "End date")]
    end_date: String,
    #[serde(rename = "End time")]
    end_time: String,
    #[serde(rename = "Duration")]
    duration: String,
    #[serde(rename = "Description")]
    description: String,
}

impl ExportRow {
    fn new(record: &TimeRecord, timezone: Tz) -> Self {
        let start = record.start.with_timezone(&timezone);
        let end = (record.start + chrono::Duration::seconds(record.duration_seconds))
            .with_timezone(&timezone);
        Self {
            start_date: start.format("%Y-%m-%d").to_string(),
            start_time: start.format("%H:%M:%S").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
            end_time: end.format("%H:%M:%S").to_string(),
            duration: format_duration(record.duration_seconds.unsigned_abs()),
            description: record
                .label
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Exports completed records from `start` through `end` (inclusive local
/// days) to `output`.
pub async fn run<S: RecordSource>(
    source: &S,
    timezone: Tz,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    output: &Path,
    now: DateTime<Utc>,
) -> Result<()> {
    let today = now.with_timezone(&timezone).date_naive();
    let first = start.unwrap_or(today);
    let last = end.unwrap_or(first);
    if last < first {
        anyhow::bail!("end date {last} is before start date {first}");
    }

    let from = DayWindow::for_date(first, &timezone).start;
    let until = DayWindow::for_date(last, &timezone).end;
    let records = source
        .fetch_records(from, until)
        .await
        .context("failed to fetch time records")?;

    let file = std::fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let summary = write_csv(&records, timezone, file)?;

    tracing::info!(
        path = %output.display(),
        rows = summary.rows,
        skipped_running = summary.skipped,
        total_hours = %summary.total,
        "exported time records"
    );
    println!(
        "Exported {} records ({}h) to {}",
        summary.rows,
        summary.total,
        output.display()
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExportSummary {
    rows: usize,
    skipped: usize,
    total: Hours,
}

/// Writes completed records sorted by start time.
fn write_csv<W: Write>(records: &[TimeRecord], timezone: Tz, writer: W) -> Result<ExportSummary> {
    let mut completed: Vec<&TimeRecord> = records
        .iter()
        .filter(|record| !record.is_running())
        .collect();
    let skipped = records.len() - completed.len();
    completed.sort_by_key(|record| record.start);

    let mut csv = csv::Writer::from_writer(writer);
    let mut total_seconds: u64 = 0;
    for record in &completed {
        csv.serialize(ExportRow::new(record, timezone))
            .context("failed to write CSV row")?;
        total_seconds = total_seconds.saturating_add(record.duration_seconds.unsigned_abs());
    }
    csv.flush().context("failed to flush CSV output")?;

    if skipped > 0 {
        tracing::warn!(skipped, "skipped running time records");
    }

    Ok(ExportSummary {
        rows: completed.len(),
        skipped,
        total: Hours::from_seconds(total_seconds),
    })
}

/// Formats seconds as `HH:MM:SS`; hours are not capped at 24.
fn format_duration(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
