//! Where page snapshots come from.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use postpulse_core::AppConfig;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::error::AnalyzerError;
use crate::rate_limit::retry_with_backoff;

/// Produces the current markup of the page under analysis.
///
/// Each call returns a fresh snapshot; a source backed by a live page may
/// return different markup on consecutive calls.
pub trait DocumentSource {
    /// Short human label (path, URL, `"inline"`) used in logs and records.
    fn describe(&self) -> String;

    /// # Errors
    ///
    /// Returns an [`AnalyzerError`] when no snapshot can be obtained.
    fn snapshot(&self) -> impl Future<Output = Result<String, AnalyzerError>> + Send;
}

/// Hex SHA-256 of a snapshot, stored alongside results so identical
/// snapshots can be recognized.
#[must_use]
pub fn document_fingerprint(markup: &str) -> String {
    format!("{:x}", Sha256::digest(markup.as_bytes()))
}

/// Markup held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    markup: String,
}

impl StaticSource {
    #[must_use]
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }
}

impl DocumentSource for StaticSource {
    fn describe(&self) -> String {
        "inline".to_owned()
    }

    async fn snapshot(&self) -> Result<String, AnalyzerError> {
        Ok(self.markup.clone())
    }
}

/// A saved page on disk, re-read on every snapshot.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn snapshot(&self) -> Result<String, AnalyzerError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AnalyzerError::Io {
                path: self.path.display().to_string(),
                source: e,
            })
    }
}

/// A page fetched over HTTP(S).
///
/// Transient errors (429, network failures) are retried with exponential
/// backoff up to `max_retries` additional attempts.
pub struct HttpSource {
    client: Client,
    url: String,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpSource {
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        url: impl Into<String>,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            max_retries,
            backoff_base_secs,
        })
    }

    /// Builds a source using the request settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Http`] if the client cannot be constructed.
    pub fn from_config(url: impl Into<String>, config: &AppConfig) -> Result<Self, AnalyzerError> {
        Self::new(
            url,
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_secs,
        )
    }
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("url", &self.url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl DocumentSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn snapshot(&self) -> Result<String, AnalyzerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = self.url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(AnalyzerError::RateLimited {
                        url,
                        retry_after_secs,
                    });
                }

                if !status.is_success() {
                    return Err(AnalyzerError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                tracing::debug!(url = %url, bytes = body.len(), "fetched page snapshot");
                Ok(body)
            }
        })
        .await
    }
}
