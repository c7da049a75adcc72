//! Toggl Track v9 client.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use wl_core::TimeRecord;

use crate::{ApiError, RecordSource, build_http, read_success_body, validate_credential};

const TOGGL_API_URL: &str = "https://api.track.toggl.com/api/v9";
const SERVICE: &str = "Toggl";

/// Toggl Track API client authenticated with a personal API token.
pub struct TogglClient {
    http: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl fmt::Debug for TogglClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TogglClient")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TogglClient {
    pub fn new(api_token: impl Into<String>) -> Result<Self, ApiError> {
        let api_token = api_token.into();
        validate_credential(SERVICE, &api_token, "API token cannot be empty")?;
        Ok(Self {
            http: build_http()?,
            api_token,
            base_url: TOGGL_API_URL.to_string(),
        })
    }

    /// Points the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, ?query, "toggl request");
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.api_token, Some("api_token"))
            .query(query)
            .send()
            .await?;
        read_success_body(SERVICE, response).await
    }
}

impl RecordSource for TogglClient {
    /// Fetches records page by page.
    ///
    /// Toggl returns the newest records first and caps each response, so the
    /// window's end is moved back to the oldest start seen until a page is
    /// empty, brings nothing new, or reaches before the window.
    async fn fetch_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeRecord>, ApiError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut page_end = end;

        loop {
            let body = self
                .get(
                    "/me/time_entries",
                    &[
                        ("start_date", format_timestamp(start)),
                        ("end_date", format_timestamp(page_end)),
                    ],
                )
                .await?;
            let page = parse_entries(&body)?;
            let (found_new, oldest) = collect_page(page, &mut seen, &mut records);
            match oldest {
                Some(oldest) if found_new && oldest > start => page_end = oldest,
                _ => break,
            }
        }

        tracing::info!(count = records.len(), "fetched toggl time entries");
        Ok(records)
    }

    async fn fetch_current_record(&self) -> Result<Option<TimeRecord>, ApiError> {
        let body = self.get("/me/time_entries/current", &[]).await?;
        let entry: Option<TogglEntry> = serde_json::from_str(&body)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        Ok(entry.and_then(TogglEntry::into_record))
    }
}

/// Time entry as returned by the Toggl API. Only the fields we use.
#[derive(Debug, Deserialize)]
struct TogglEntry {
    id: i64,
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

impl TogglEntry {
    /// Entries without a start contribute nothing and are dropped.
    fn into_record(self) -> Option<TimeRecord> {
        let Some(start) = self.start else {
            tracing::warn!(id = self.id, "skipping toggl entry without start time");
            return None;
        };
        Some(TimeRecord {
            id: Some(self.id),
            start,
            duration_seconds: self.duration.unwrap_or(0),
            label: self.description,
        })
    }
}

/// Adds unseen entries from one page to `records`.
///
/// Returns whether the page held any unseen id, and the oldest start time on
/// it. Entries without a start still count as seen.
fn collect_page(
    page: Vec<TogglEntry>,
    seen: &mut HashSet<i64>,
    records: &mut Vec<TimeRecord>,
) -> (bool, Option<DateTime<Utc>>) {
    let oldest = page.iter().filter_map(|entry| entry.start).min();
    let mut found_new = false;
    for entry in page {
        if seen.insert(entry.id) {
            found_new = true;
            records.extend(entry.into_record());
        }
    }
    (found_new, oldest)
}

fn parse_entries(body: &str) -> Result<Vec<TogglEntry>, ApiError> {
    let entries: Option<Vec<TogglEntry>> =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    Ok(entries.unwrap_or_default())
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}
