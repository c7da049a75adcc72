//! Sync command: reconciles today's worklog entry with tracked time.
//!
//! One cycle runs strictly in order: fetch records, aggregate, render, read
//! the document, locate and merge today's entry, write it back. A failed
//! cycle never writes and sends at most one notification.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use fs2::FileExt;
use tokio::time::MissedTickBehavior;

use wl_api::{DocumentStore, Notifier, RecordSource};
use wl_core::{DayWindow, TimeRecord, WorklogEntry, aggregate, apply_entry, find_entry_span};

/// Subject line of failure notifications.
const FAILURE_SUBJECT: &str = "Worklog sync failed";

/// What a cycle did (or would do) to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Today's entry was inserted.
    Created,
    /// Today's existing entry was rewritten.
    Updated,
    /// The document already contained the computed entry.
    Unchanged,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub date: NaiveDate,
    /// The entry text now in the document.
    pub entry: String,
    pub action: SyncAction,
    /// False for dry runs and unchanged documents.
    pub written: bool,
}

/// Runs reconciliation cycles against a set of collaborators.
#[derive(Debug)]
pub struct Syncer<S, D, N> {
    source: S,
    store: D,
    notifier: Option<N>,
    timezone: Tz,
}

impl<S, D, N> Syncer<S, D, N>
where
    S: RecordSource,
    D: DocumentStore,
    N: Notifier,
{
    pub const fn new(source: S, store: D, notifier: Option<N>, timezone: Tz) -> Self {
        Self {
            source,
            store,
            notifier,
            timezone,
        }
    }

    /// Performs one cycle as of `now`.
    ///
    /// With `dry_run` the document is read but never written.
    pub async fn sync_once(&self, now: DateTime<Utc>, dry_run: bool) -> Result<SyncReport> {
        let local_now = now.with_timezone(&self.timezone);
        let window = DayWindow::containing(&local_now);
        let date = window.date;

        let records = self
            .source
            .fetch_records(window.start, window.end)
            .await
            .context("failed to fetch time records")?;
        let current = self
            .source
            .fetch_current_record()
            .await
            .context("failed to fetch running time record")?;
        let records = day_records(records, current, &window);
        tracing::debug!(%date, count = records.len(), "aggregating time records");

        let incoming = aggregate(&records, &local_now).into_entry();

        let document = self
            .store
            .read_document()
            .await
            .context("failed to read worklog")?;

        let existing_span = find_entry_span(&document.content, date);
        let entry = match &existing_span {
            Some(span) => reconcile(&document.content[span.clone()], &incoming),
            None => incoming.render(),
        };
        let updated = apply_entry(&document.content, &entry, date);

        let action = if updated == document.content {
            SyncAction::Unchanged
        } else if existing_span.is_some() {
            SyncAction::Updated
        } else {
            SyncAction::Created
        };

        let written = !dry_run && action != SyncAction::Unchanged;
        if written {
            self.store
                .write_document(&updated, &document.version, &commit_message(date))
                .await
                .context("failed to write worklog")?;
        }

        tracing::info!(%date, %action, written, entry = %entry, "sync cycle complete");
        Ok(SyncReport {
            date,
            entry,
            action,
            written,
        })
    }

    /// Runs one cycle, logging and notifying on failure.
    ///
    /// Returns true on success.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> bool {
        match self.sync_once(now, false).await {
            Ok(_) => true,
            Err(err) => {
                let details = format!("{err:#}");
                tracing::error!(error = %details, "sync cycle failed");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(FAILURE_SUBJECT, &details).await;
                }
                false
            }
        }
    }

    /// Runs a cycle under the cross-process lock in `lock_dir`.
    ///
    /// A held lock skips the cycle without notifying.
    pub async fn run_locked_cycle(&self, lock_dir: &Path, now: DateTime<Utc>) -> bool {
        let _lock = match CycleLock::acquire(lock_dir) {
            Ok(lock) => lock,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "skipping sync cycle");
                return false;
            }
        };
        self.run_cycle(now).await
    }

    /// Runs a cycle immediately and then once per `interval` until Ctrl-C.
    pub async fn run_scheduled(&self, interval: Duration, lock_dir: &Path) -> Result<()> {
        self.run_until(interval, lock_dir, tokio::signal::ctrl_c()).await
    }

    /// Runs cycles once per `interval` until `shutdown` completes.
    ///
    /// Cycles never overlap; ticks missed while a cycle runs are skipped. A
    /// shutdown that arrives mid-cycle takes effect once the cycle finishes.
    pub async fn run_until<F>(
        &self,
        interval: Duration,
        lock_dir: &Path,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = io::Result<()>>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!(interval_secs = interval.as_secs(), "starting scheduled sync");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                signal = &mut shutdown => {
                    signal.context("failed to wait for shutdown signal")?;
                    tracing::info!("stopping scheduled sync");
                    return Ok(());
                }
            }
            self.run_locked_cycle(lock_dir, Utc::now()).await;
        }
    }
}

/// Combines the fetched records with the running timer for one day.
///
/// Fetched records starting outside the day are dropped. The running record
/// replaces any fetched copy with the same id, and a timer started before the
/// day begins counts only from local midnight.
fn day_records(
    mut records: Vec<TimeRecord>,
    current: Option<TimeRecord>,
    window: &DayWindow,
) -> Vec<TimeRecord> {
    records.retain(|record| window.contains(record.start));
    if let Some(current) = current.filter(|record| record.is_running()) {
        if current.start < window.end {
            if let Some(id) = current.id {
                records.retain(|record| record.id != Some(id));
            }
            records.push(current);
        }
    }

    for record in &mut records {
        if record.is_running() {
            record.start = window.clamp_start(record.start);
        }
    }
    records
}

/// Produces the entry text for a day that already has an entry.
///
/// The live timer state decides the open marker, so stopping the timer
/// closes the day. Unparseable entries are overwritten.
fn reconcile(existing_text: &str, incoming: &WorklogEntry) -> String {
    match WorklogEntry::parse(existing_text) {
        Some(existing) => {
            let mut merged = existing.merge(incoming);
            merged.is_open = incoming.is_open;
            merged.render()
        }
        None => {
            tracing::warn!(
                existing = existing_text,
                "existing worklog entry does not parse, replacing it"
            );
            incoming.render()
        }
    }
}

fn commit_message(date: NaiveDate) -> String {
    format!("Update worklog for {date}")
}

/// Advisory lock held for the duration of one cycle.
#[derive(Debug)]
pub struct CycleLock {
    _file: File,
    path: PathBuf,
}

impl CycleLock {
    /// Takes the lock in `dir`, failing immediately if another process holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).context("failed to create state directory")?;
        let path = dir.join("sync.lock");
        let file = File::create(&path).context("failed to create lock file")?;
        file.try_lock_exclusive()
            .context("another sync cycle is already running")?;
        tracing::debug!(path = %path.display(), "acquired sync lock");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
