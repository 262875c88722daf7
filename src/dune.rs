//! Minimal client for the Dune Analytics query API.
//!
//! Only what the pipeline needs: reuse a recent result when there is one, otherwise run the
//! query, wait for it, and download the result as CSV.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info};
use url::Url;

pub const DUNE_API_URL: &str = "https://api.dune.com/api/v1/";
const API_KEY_HEADER: &str = "X-Dune-API-Key";
const NEXT_OFFSET_HEADER: &str = "x-dune-next-offset";
const STATE_COMPLETED: &str = "QUERY_STATE_COMPLETED";

#[derive(Debug, thiserror::Error)]
pub enum DuneError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Dune returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Execution {execution_id} finished in state {state}")]
    ExecutionFailed { execution_id: String, state: String },
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Client-side knobs for waiting on a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Rows per CSV page.
    pub batch_size: usize,
    /// Delay between execution status checks.
    pub ping_frequency: Duration,
    /// A stored result older than this is refreshed by executing the query.
    pub max_age: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            ping_frequency: Duration::from_secs(10),
            max_age: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResult {
    execution_ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    state: String,
    #[serde(default)]
    is_execution_finished: bool,
}

#[derive(Debug, Clone)]
pub struct DuneClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl DuneClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DuneError> {
        Self::with_base_url(DUNE_API_URL, api_key)
    }

    /// `base_url` is the API root, e.g. `https://api.dune.com/api/v1/`.
    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self, DuneError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
        })
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, DuneError> {
        Ok(self
            .http
            .get(self.base_url.join(path)?)
            .header(API_KEY_HEADER, &self.api_key))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, DuneError> {
        Ok(self
            .http
            .post(self.base_url.join(path)?)
            .header(API_KEY_HEADER, &self.api_key))
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, DuneError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DuneError::Status { status, body });
        }
        Ok(response)
    }

    /// When the latest stored result finished, or `None` if the query has never run.
    pub async fn latest_result_time(&self, query_id: u64) -> Result<Option<DateTime<Utc>>, DuneError> {
        let request = self
            .get(&format!("query/{}/results", query_id))?
            .query(&[("limit", "1")]);
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DuneError::Status { status, body });
        }
        let latest: LatestResult = response.json().await?;
        Ok(latest.execution_ended_at)
    }

    /// Start a fresh execution and return its id.
    pub async fn execute(&self, query_id: u64) -> Result<String, DuneError> {
        let response = Self::send(self.post(&format!("query/{}/execute", query_id))?).await?;
        let execute: ExecuteResponse = response.json().await?;
        info!("Started Dune execution {} for query {}", execute.execution_id, query_id);
        Ok(execute.execution_id)
    }

    /// Poll an execution every `ping_frequency` until it finishes.
    pub async fn wait_for_execution(
        &self,
        execution_id: &str,
        ping_frequency: Duration,
    ) -> Result<(), DuneError> {
        loop {
            let response =
                Self::send(self.get(&format!("execution/{}/status", execution_id))?).await?;
            let status: ExecutionStatus = response.json().await?;
            debug!("Execution {} is {}", execution_id, status.state);

            if status.is_execution_finished {
                if status.state == STATE_COMPLETED {
                    return Ok(());
                }
                return Err(DuneError::ExecutionFailed {
                    execution_id: execution_id.to_string(),
                    state: status.state,
                });
            }
            tokio::time::sleep(ping_frequency).await;
        }
    }

    /// Download the latest result of a query as CSV text, `batch_size` rows per request.
    pub async fn fetch_csv(&self, query_id: u64, batch_size: usize) -> Result<String, DuneError> {
        let mut csv = String::new();
        let mut offset = 0usize;

        loop {
            let request = self
                .get(&format!("query/{}/results/csv", query_id))?
                .query(&[("limit", batch_size), ("offset", offset)]);
            let response = Self::send(request).await?;
            let next_offset = response
                .headers()
                .get(NEXT_OFFSET_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            let page = response.text().await?;

            // every page repeats the header
            let body = if offset == 0 {
                page.as_str()
            } else {
                page.split_once('\n').map(|(_, rows)| rows).unwrap_or_default()
            };
            csv.push_str(body);
            if !csv.is_empty() && !csv.ends_with('\n') {
                csv.push('\n');
            }

            match next_offset {
                Some(next) if next > offset => offset = next,
                _ => break,
            }
        }

        Ok(csv)
    }

    /// Download a query result to `target`, executing the query first when the stored result
    /// is missing or older than `opts.max_age`.
    pub async fn download_csv(
        &self,
        query_id: u64,
        target: &Path,
        opts: &QueryOptions,
    ) -> Result<(), DuneError> {
        let fresh = match self.latest_result_time(query_id).await? {
            Some(ended_at) => {
                let age = Utc::now().signed_duration_since(ended_at);
                age.to_std().map(|age| age <= opts.max_age).unwrap_or(true)
            }
            None => false,
        };

        if fresh {
            info!("Reusing stored result for Dune query {}", query_id);
        } else {
            let execution_id = self.execute(query_id).await?;
            self.wait_for_execution(&execution_id, opts.ping_frequency)
                .await?;
        }

        let csv = self.fetch_csv(query_id, opts.batch_size).await?;

        let io_err = |source| DuneError::Io {
            path: target.display().to_string(),
            source,
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(target, csv).await.map_err(io_err)?;

        info!("File written to {}", target.display());
        Ok(())
    }
}
