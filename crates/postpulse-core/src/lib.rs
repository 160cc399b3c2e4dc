//! Shared types and configuration for the postpulse workspace.

pub mod analysis;
pub mod app_config;
pub mod clock;
pub mod config;

use thiserror::Error;

pub use analysis::{
    truncate_post_text, AnalysisDebug, AnalysisMethod, AnalysisResult, FallbackDetails,
    PostRecord, PostType, ERROR_PROFILE_NAME, MAX_DISPLAYED_POSTS, MAX_POST_TEXT_CHARS,
    UNKNOWN_PROFILE_NAME,
};
pub use app_config::{AppConfig, Environment};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_app_config, load_app_config_from_env, MAX_WINDOW_HOURS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
