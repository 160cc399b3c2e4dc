use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Site name used by name validation and the "X is on <site>" pattern.
    pub site_name: String,
    /// Recency window length; the cutoff is `now - window_hours`.
    pub window_hours: u32,
    /// Artificial wait before each scan so dynamic content can settle.
    pub settle_delay_ms: u64,
    pub max_document_bytes: usize,
    pub history_path: PathBuf,
    /// Optional YAML heuristics profile overriding selectors and tuning.
    pub profile_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub rate_limit_max_attempts: u32,
    pub rate_limit_window_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("site_name", &self.site_name)
            .field("window_hours", &self.window_hours)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("history_path", &self.history_path)
            .field("profile_path", &self.profile_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_secs", &self.retry_backoff_base_secs)
            .field("rate_limit_max_attempts", &self.rate_limit_max_attempts)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .finish()
    }
}
