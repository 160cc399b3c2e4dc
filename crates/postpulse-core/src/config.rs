use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Longest accepted recency window: one year.
pub const MAX_WINDOW_HOURS: u32 = 8760;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so an empty environment yields a usable
/// config. Tests drive this with a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>().map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("POSTPULSE_ENV", "development"))?;
    let log_level = or_default("POSTPULSE_LOG_LEVEL", "info");

    let site_name = or_default("POSTPULSE_SITE_NAME", "LinkedIn").trim().to_string();
    if site_name.is_empty() {
        return Err(invalid("POSTPULSE_SITE_NAME", "must not be empty".to_string()));
    }

    let window_hours = parse_u32("POSTPULSE_WINDOW_HOURS", "24")?;
    if window_hours == 0 {
        return Err(invalid("POSTPULSE_WINDOW_HOURS", "must be at least 1".to_string()));
    }
    if window_hours > MAX_WINDOW_HOURS {
        return Err(invalid(
            "POSTPULSE_WINDOW_HOURS",
            format!("must be at most {MAX_WINDOW_HOURS}"),
        ));
    }

    let settle_delay_ms = parse_u64("POSTPULSE_SETTLE_DELAY_MS", "1500")?;
    let max_document_bytes = parse_usize("POSTPULSE_MAX_DOCUMENT_BYTES", "10485760")?;
    let history_path = PathBuf::from(or_default(
        "POSTPULSE_HISTORY_PATH",
        "./data/postpulse-history.json",
    ));
    let profile_path = lookup("POSTPULSE_PROFILE_PATH")
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(PathBuf::from);

    let request_timeout_secs = parse_u64("POSTPULSE_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("POSTPULSE_USER_AGENT", "postpulse/0.1 (activity-estimator)");
    let max_retries = parse_u32("POSTPULSE_MAX_RETRIES", "3")?;
    let retry_backoff_base_secs = parse_u64("POSTPULSE_RETRY_BACKOFF_BASE_SECS", "2")?;

    let rate_limit_max_attempts = parse_u32("POSTPULSE_RATE_LIMIT_MAX_ATTEMPTS", "10")?;
    if rate_limit_max_attempts == 0 {
        return Err(invalid(
            "POSTPULSE_RATE_LIMIT_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let rate_limit_window_secs = parse_u64("POSTPULSE_RATE_LIMIT_WINDOW_SECS", "60")?;

    Ok(AppConfig {
        env,
        log_level,
        site_name,
        window_hours,
        settle_delay_ms,
        max_document_bytes,
        history_path,
        profile_path,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_secs,
        rate_limit_max_attempts,
        rate_limit_window_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "POSTPULSE_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
