//! Write-through JSON persistence for analysis results and limiter state.

mod history;

use thiserror::Error;

pub use history::{AnalysisRecord, HistoryFile, HistoryStore, HISTORY_CAP, INLINE_SOURCE};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {path} could not be (de)serialized: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
