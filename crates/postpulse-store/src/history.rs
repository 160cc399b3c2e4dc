use std::path::{Path, PathBuf};

use postpulse_analyzer::FixedWindowLimiter;
use postpulse_core::AnalysisResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

/// Maximum entries kept in [`HistoryFile::history`].
pub const HISTORY_CAP: usize = 10;

/// `source` label for markup that did not come from a file or URL.
pub const INLINE_SOURCE: &str = "inline";

/// One persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    /// File path, URL, or [`INLINE_SOURCE`].
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_sha256: Option<String>,
    pub result: AnalysisResult,
}

impl AnalysisRecord {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        document_sha256: Option<String>,
        result: AnalysisResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            document_sha256,
            result,
        }
    }
}

/// On-disk layout of the history file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryFile {
    /// Most recent record; replaced on every write.
    pub last: Option<AnalysisRecord>,
    /// Newest first, at most [`HISTORY_CAP`] entries.
    pub history: Vec<AnalysisRecord>,
    pub rate_limit: Option<FixedWindowLimiter>,
}

impl HistoryFile {
    /// Makes `record` the latest entry, trimming history to the cap.
    pub fn push(&mut self, record: AnalysisRecord) {
        self.history.insert(0, record.clone());
        self.history.truncate(HISTORY_CAP);
        self.last = Some(record);
    }
}

/// A single JSON file, written through a temporary sibling and renamed into
/// place. Callers serialize access; there is no cross-process locking.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, and
    /// [`StoreError::Serialize`] if it is not a valid history file.
    pub async fn load(&self) -> Result<HistoryFile, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no history file yet");
                return Ok(HistoryFile::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&raw).map_err(|e| self.serialize_error(e))
    }

    /// Replaces the file with `file`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory, temporary file, or rename
    /// fails, and [`StoreError::Serialize`] if encoding fails.
    pub async fn save(&self, file: &HistoryFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_string_pretty(file).map_err(|e| self.serialize_error(e))?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        tracing::debug!(
            path = %self.path.display(),
            entries = file.history.len(),
            "history saved"
        );
        Ok(())
    }

    /// Appends `record` as the newest entry and writes the file.
    ///
    /// # Errors
    ///
    /// Propagates [`HistoryStore::load`] and [`HistoryStore::save`] errors.
    pub async fn record(&self, record: AnalysisRecord) -> Result<HistoryFile, StoreError> {
        let mut file = self.load().await?;
        file.push(record);
        self.save(&file).await?;
        Ok(file)
    }

    /// Persists the limiter window without touching results.
    ///
    /// # Errors
    ///
    /// Propagates [`HistoryStore::load`] and [`HistoryStore::save`] errors.
    pub async fn save_rate_limit(&self, limiter: &FixedWindowLimiter) -> Result<(), StoreError> {
        let mut file = self.load().await?;
        file.rate_limit = Some(limiter.clone());
        self.save(&file).await
    }

    /// Drops `last` and `history`. The limiter window is kept so clearing
    /// results does not reset rate limiting.
    ///
    /// # Errors
    ///
    /// Propagates [`HistoryStore::load`] and [`HistoryStore::save`] errors.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let file = self.load().await?;
        let cleared = HistoryFile {
            rate_limit: file.rate_limit,
            ..HistoryFile::default()
        };
        self.save(&cleared).await?;
        tracing::info!(path = %self.path.display(), "history cleared");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn serialize_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Serialize {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use postpulse_core::AnalysisMethod;

    use super::*;

    fn record(post_count: usize) -> AnalysisRecord {
        let mut result =
            AnalysisResult::failed("placeholder", Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap());
        result.post_count = post_count;
        result.method = AnalysisMethod::Scan;
        result.error = None;
        AnalysisRecord::new(INLINE_SOURCE, None, result)
    }

    #[test]
    fn push_caps_history_newest_first() {
        let mut file = HistoryFile::default();
        for n in 0..15 {
            file.push(record(n));
        }
        assert_eq!(file.history.len(), HISTORY_CAP);
        assert_eq!(file.history[0].result.post_count, 14);
        assert_eq!(file.history[HISTORY_CAP - 1].result.post_count, 5);
        assert_eq!(file.last.as_ref().unwrap().result.post_count, 14);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let store = HistoryStore::new("/var/lib/postpulse/history.json");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/var/lib/postpulse/history.json.tmp")
        );
    }

    #[test]
    fn history_file_serializes_camel_case() {
        let mut file = HistoryFile::default();
        file.push(record(2));
        file.rate_limit = Some(FixedWindowLimiter::new(10, 60));
        let json = serde_json::to_value(&file).unwrap();
        assert!(json.get("last").is_some());
        assert!(json.get("rateLimit").is_some());
        assert_eq!(json["history"][0]["result"]["postCount"], 2);
        assert!(json["history"][0].get("documentSha256").is_none());
    }
}
