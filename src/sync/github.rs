//! GitHub repository file as a versioned remote state store
//!
//! Writes go through the contents API (needs a token). Reads go through the
//! public Pages URL with cache busting, and only records whose `version` is
//! strictly greater than the last one seen are accepted. Concurrent writers
//! racing on the same version are not reconciled: whichever PUT lands last
//! wins.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{RemoteState, StatePublisher, StateSource};
use crate::{
    error::{TimerError, TimerResult},
    state::TimerRecord,
};

const USER_AGENT: &str = "session-timer";

/// Location of the state file and the credentials to write it.
#[derive(Clone)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    /// Required for writes only.
    pub token: Option<String>,
    /// Defaults to `https://<owner>.github.io/<repo>`.
    pub pages_url: Option<String>,
    pub api_base: String,
}

impl GithubConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: "timer-state.json".to_string(),
            branch: "main".to_string(),
            token: None,
            pages_url: None,
            api_base: "https://api.github.com".to_string(),
        }
    }

    pub fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, self.path
        )
    }

    pub fn pages_file_url(&self) -> String {
        let base = self
            .pages_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.github.io/{}", self.owner, self.repo));
        format!("{}/{}", base.trim_end_matches('/'), self.path)
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

/// Reads and writes the timer record as a file in a GitHub repository.
#[derive(Debug)]
pub struct GithubStore {
    http_client: reqwest::Client,
    config: GithubConfig,
    /// Highest version written or accepted so far.
    last_version: AtomicU64,
}

impl GithubStore {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
            last_version: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    pub fn last_version(&self) -> u64 {
        self.last_version.load(Ordering::SeqCst)
    }

    fn token(&self) -> TimerResult<&str> {
        self.config
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| TimerError::Authorization("a GitHub token is required to write state".to_string()))
    }

    /// Keep `record` only if it is newer than anything seen so far.
    fn accept(&self, record: TimerRecord) -> Option<RemoteState> {
        let previous = self.last_version.fetch_max(record.version, Ordering::SeqCst);
        if record.version > previous {
            Some(RemoteState {
                record,
                server_time: None,
            })
        } else {
            debug!("Ignoring remote v{} (have v{})", record.version, previous);
            None
        }
    }

    /// Version to store next: never behind the record, always ahead of the
    /// last version seen.
    fn next_version(&self, record: &TimerRecord) -> u64 {
        record.version.max(self.last_version() + 1)
    }

    /// SHA of the current blob, `None` when the file does not exist yet.
    async fn current_sha(&self, token: &str) -> TimerResult<Option<String>> {
        let response = self
            .http_client
            .get(self.config.contents_url())
            .header(header::AUTHORIZATION, format!("token {}", token))
            .header(header::USER_AGENT, USER_AGENT)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                Ok(body["sha"].as_str().map(str::to_string))
            }
            status => Err(api_error(status, response).await),
        }
    }

    fn update_body(&self, record: &TimerRecord, action: &str, sha: Option<String>) -> TimerResult<Value> {
        let content = serde_json::to_vec_pretty(record)?;
        let mut body = json!({
            "message": format!("Timer {} (v{})", action, record.version),
            "content": STANDARD.encode(content),
            "branch": self.config.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        Ok(body)
    }
}

impl StatePublisher for GithubStore {
    async fn publish(&self, record: &TimerRecord, action: &str) -> TimerResult<TimerRecord> {
        // Checked before any request so credential-less writes never hit the network.
        let token = self.token()?;

        let mut stored = record.clone();
        stored.version = self.next_version(record);
        stored.last_update = Some(Utc::now());

        let sha = self.current_sha(token).await?;
        let body = self.update_body(&stored, action, sha)?;

        let response = self
            .http_client
            .put(self.config.contents_url())
            .header(header::AUTHORIZATION, format!("token {}", token))
            .header(header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response.status(), response).await);
        }

        self.last_version.fetch_max(stored.version, Ordering::SeqCst);
        info!("Published timer state v{} to {}", stored.version, self.config.contents_url());
        Ok(stored)
    }
}

impl StateSource for GithubStore {
    async fn fetch(&self) -> TimerResult<Option<RemoteState>> {
        let cache_buster = Utc::now().timestamp_millis().to_string();
        let response = self
            .http_client
            .get(self.config.pages_file_url())
            .query(&[("_t", cache_buster.as_str())])
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("No state file at {} yet", self.config.pages_file_url());
                Ok(None)
            }
            status if status.is_success() => {
                let record: TimerRecord = response.json().await?;
                Ok(self.accept(record))
            }
            status => Err(TimerError::RemoteSync(format!(
                "GET {} returned {}",
                self.config.pages_file_url(),
                status
            ))),
        }
    }

    fn describe(&self) -> String {
        self.config.pages_file_url()
    }
}

/// Credential problems are fatal for the write; everything else may be retried.
async fn api_error(status: StatusCode, response: reqwest::Response) -> TimerError {
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body["message"].as_str().unwrap_or("no message").to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TimerError::Authorization(format!("GitHub rejected credentials: {}", message))
        }
        _ => TimerError::RemoteSync(format!("GitHub API error {}: {}", status, message)),
    }
}
