//! Result records produced by one analysis of a profile page snapshot.
//!
//! Field names serialize in camelCase so the JSON matches what display
//! layers and the history store expect (`postCount`, `profileName`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel profile name when no extraction strategy produced a valid name.
pub const UNKNOWN_PROFILE_NAME: &str = "Unknown";

/// Profile name reported when the whole pipeline failed.
pub const ERROR_PROFILE_NAME: &str = "Error";

/// Maximum number of [`PostRecord`]s carried in an [`AnalysisResult`].
pub const MAX_DISPLAYED_POSTS: usize = 10;

/// Post text longer than this many characters is cut and suffixed with
/// [`TRUNCATION_MARKER`].
pub const MAX_POST_TEXT_CHARS: usize = 150;

pub const TRUNCATION_MARKER: &str = "...";

/// Media classification of a detected post, or the tier that synthesized it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostType {
    Text,
    Image,
    Video,
    Article,
    Poll,
    FallbackDetection,
    EmergencyDetection,
}

impl PostType {
    /// `true` for records synthesized by an estimating tier rather than found
    /// on the page.
    #[must_use]
    pub fn is_estimated(self) -> bool {
        matches!(self, PostType::FallbackDetection | PostType::EmergencyDetection)
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PostType::Text => "text",
            PostType::Image => "image",
            PostType::Video => "video",
            PostType::Article => "article",
            PostType::Poll => "poll",
            PostType::FallbackDetection => "fallback-detection",
            PostType::EmergencyDetection => "emergency-detection",
        };
        f.write_str(label)
    }
}

/// One detected (or estimated) post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Post text, at most [`MAX_POST_TEXT_CHARS`] characters plus the marker.
    pub text: String,
    /// Machine timestamp, `"Text: <phrase>"`, or a placeholder for estimates.
    pub time: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
}

impl PostRecord {
    /// Builds a record, truncating `text` to the display limit.
    #[must_use]
    pub fn new(text: &str, time: impl Into<String>, post_type: PostType) -> Self {
        Self {
            text: truncate_post_text(text),
            time: time.into(),
            post_type,
        }
    }
}

/// Truncates to [`MAX_POST_TEXT_CHARS`] characters, appending
/// [`TRUNCATION_MARKER`] when anything was cut. Counts chars, not bytes.
#[must_use]
pub fn truncate_post_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_POST_TEXT_CHARS {
        return trimmed.to_owned();
    }
    let mut out: String = trimmed.chars().take(MAX_POST_TEXT_CHARS).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Which tier of the pipeline produced `postCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Structural scan found qualifying fragments; the count is measured.
    Scan,
    /// Whole-document estimate.
    Fallback,
    /// Degraded keyword-density pass.
    Emergency,
    /// Every tier came up empty.
    None,
    /// The pipeline failed before producing anything.
    Error,
}

impl std::fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMethod::Scan => write!(f, "scan"),
            AnalysisMethod::Fallback => write!(f, "fallback"),
            AnalysisMethod::Emergency => write!(f, "emergency"),
            AnalysisMethod::None => write!(f, "none"),
            AnalysisMethod::Error => write!(f, "error"),
        }
    }
}

/// Score breakdown from the fallback estimator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackDetails {
    pub time_matches: usize,
    pub time_score: f64,
    pub contextual_matches: usize,
    pub contextual_score: f64,
    pub structural_matches: usize,
    pub structural_score: f64,
    pub total_score: f64,
    pub estimate: u32,
}

/// Diagnostics accumulated during one analysis.
///
/// Informational only: nothing in here feeds back into `postCount` or
/// `profileName`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDebug {
    pub selectors_tried: usize,
    pub selectors_matched: usize,
    pub elements_scanned: usize,
    pub duplicates_skipped: usize,
    pub short_skipped: usize,
    pub not_recent: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackDetails>,
    pub emergency_used: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AnalysisDebug {
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Outcome of one analysis. Built fresh per invocation and never mutated
/// after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Qualifying fragments found, or the estimate from a degraded tier.
    /// When `posts` was truncated this still holds the full total.
    pub post_count: usize,
    pub profile_name: String,
    pub analyzed_at: DateTime<Utc>,
    pub posts: Vec<PostRecord>,
    pub method: AnalysisMethod,
    #[serde(default)]
    pub debug: AnalysisDebug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// The degraded result returned when the pipeline cannot run at all.
    #[must_use]
    pub fn failed(message: impl Into<String>, analyzed_at: DateTime<Utc>) -> Self {
        let message = message.into();
        let mut debug = AnalysisDebug::default();
        debug.record_error(message.clone());
        Self {
            post_count: 0,
            profile_name: ERROR_PROFILE_NAME.to_owned(),
            analyzed_at,
            posts: Vec::new(),
            method: AnalysisMethod::Error,
            debug,
            error: Some(message),
        }
    }

    /// `true` when `post_count` is an estimate rather than a measured count.
    #[must_use]
    pub fn is_estimate(&self) -> bool {
        matches!(
            self.method,
            AnalysisMethod::Fallback | AnalysisMethod::Emergency
        )
    }

    #[must_use]
    pub fn has_known_profile(&self) -> bool {
        self.profile_name != UNKNOWN_PROFILE_NAME && self.profile_name != ERROR_PROFILE_NAME
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn short_text_is_kept_as_is() {
        assert_eq!(truncate_post_text("  hello world  "), "hello world");
    }

    #[test]
    fn long_text_is_cut_at_150_chars_with_marker() {
        let text = "a".repeat(200);
        let out = truncate_post_text(&text);
        assert_eq!(out.chars().count(), MAX_POST_TEXT_CHARS + TRUNCATION_MARKER.len());
        assert!(out.ends_with("..."));
    }

    #[test]
    fn text_of_exactly_150_chars_is_not_marked() {
        let text = "b".repeat(150);
        assert_eq!(truncate_post_text(&text), text);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let text = "é".repeat(160);
        let out = truncate_post_text(&text);
        assert!(out.starts_with(&"é".repeat(150)));
        assert!(out.ends_with("..."));
    }

    #[test]
    fn post_type_serializes_kebab_case() {
        let json = serde_json::to_string(&PostType::FallbackDetection).unwrap();
        assert_eq!(json, "\"fallback-detection\"");
        assert_eq!(PostType::EmergencyDetection.to_string(), "emergency-detection");
    }

    #[test]
    fn post_record_uses_type_key() {
        let record = PostRecord::new("Shipped a thing today", "Text: 2 hours ago", PostType::Image);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["time"], "Text: 2 hours ago");
    }

    #[test]
    fn result_serializes_camel_case_fields() {
        let result = AnalysisResult {
            post_count: 1,
            profile_name: "Jane Doe".to_owned(),
            analyzed_at: fixed_time(),
            posts: vec![],
            method: AnalysisMethod::Scan,
            debug: AnalysisDebug::default(),
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["postCount"], 1);
        assert_eq!(value["profileName"], "Jane Doe");
        assert_eq!(value["method"], "scan");
        assert!(value.get("error").is_none());
        assert!(value["debug"].get("selectorsTried").is_some());
    }

    #[test]
    fn failed_result_is_well_formed() {
        let result = AnalysisResult::failed("snapshot unavailable", fixed_time());
        assert_eq!(result.post_count, 0);
        assert_eq!(result.profile_name, ERROR_PROFILE_NAME);
        assert_eq!(result.error.as_deref(), Some("snapshot unavailable"));
        assert_eq!(result.debug.errors, vec!["snapshot unavailable".to_owned()]);
        assert!(!result.has_known_profile());
    }

    #[test]
    fn estimate_methods_are_flagged() {
        let mut result = AnalysisResult::failed("x", fixed_time());
        result.method = AnalysisMethod::Fallback;
        assert!(result.is_estimate());
        result.method = AnalysisMethod::Scan;
        assert!(!result.is_estimate());
    }
}
