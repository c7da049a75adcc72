//! GitHub contents API client for the worklog file.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{ApiError, Document, DocumentStore, build_http, read_success_body, validate_credential};

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const SERVICE: &str = "GitHub";

/// Reads and writes one file in one repository.
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    repo: String,
    path: String,
    branch: Option<String>,
    base_url: String,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("token", &"[REDACTED]")
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client for `path` inside `repo` (`owner/name`).
    pub fn new(
        token: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let token = token.into();
        let repo = repo.into();
        let path = path.into();
        validate_credential(SERVICE, &token, "token cannot be empty")?;
        if repo.split('/').filter(|part| !part.trim().is_empty()).count() != 2 {
            return Err(ApiError::InvalidCredentials {
                service: SERVICE,
                reason: "repository must be in owner/name form",
            });
        }
        validate_credential(SERVICE, &path, "worklog path cannot be empty")?;

        Ok(Self {
            http: build_http()?,
            token,
            repo,
            path: path.trim_start_matches('/').to_string(),
            branch: None,
            base_url: GITHUB_API_URL.to_string(),
        })
    }

    /// Reads from and commits to `branch` instead of the default branch.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.filter(|name| !name.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn contents_url(&self) -> String {
        format!("{}/repos/{}/contents/{}", self.base_url, self.repo, self.path)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.contents_url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }
}

impl DocumentStore for GitHubClient {
    async fn read_document(&self) -> Result<Document, ApiError> {
        tracing::info!(repo = %self.repo, path = %self.path, "fetching worklog");
        let mut request = self.request(reqwest::Method::GET);
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }
        let response = request.send().await?;
        let body = read_success_body(SERVICE, response).await?;
        parse_contents(&body)
    }

    async fn write_document(
        &self,
        content: &str,
        version: &str,
        message: &str,
    ) -> Result<(), ApiError> {
        tracing::info!(repo = %self.repo, path = %self.path, "updating worklog");
        let payload = UpdateRequest {
            message,
            content: STANDARD.encode(content),
            sha: version,
            branch: self.branch.as_deref(),
        };
        let response = self
            .request(reqwest::Method::PUT)
            .json(&payload)
            .send()
            .await?;

        if is_conflict(response.status()) {
            return Err(ApiError::Conflict {
                version: version.to_string(),
            });
        }
        read_success_body(SERVICE, response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

/// A stale `sha` is reported as 409, or 422 when the branch moved.
fn is_conflict(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn parse_contents(body: &str) -> Result<Document, ApiError> {
    // A directory listing comes back as a JSON array.
    if body.trim_start().starts_with('[') {
        return Err(ApiError::InvalidResponse(
            "worklog path is a directory, expected a file".to_string(),
        ));
    }
    let payload: ContentsResponse =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    if payload.kind != "file" {
        return Err(ApiError::InvalidResponse(format!(
            "worklog path is a {}, expected a file",
            payload.kind
        )));
    }
    match payload.encoding.as_deref() {
        None | Some("base64") => {}
        Some(encoding) => {
            return Err(ApiError::InvalidResponse(format!(
                "unsupported content encoding: {encoding}"
            )));
        }
    }

    // GitHub wraps the base64 payload at 60 columns.
    let packed: String = payload
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(packed)
        .map_err(|err| ApiError::InvalidResponse(format!("invalid base64 content: {err}")))?;
    let content = String::from_utf8(bytes)
        .map_err(|err| ApiError::InvalidResponse(format!("worklog is not UTF-8: {err}")))?;

    Ok(Document {
        content,
        version: payload.sha,
    })
}
