use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid selector \"{pattern}\": {reason}")]
    Selector { pattern: String, reason: String },

    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("document is {size} bytes, over the {limit}-byte limit")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("failed to read heuristics profile {path}: {source}")]
    ProfileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse heuristics profile {path}: {source}")]
    ProfileParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid heuristics profile: {0}")]
    InvalidProfile(String),
}
