//! Heuristics profile: the selector table and scoring constants.
//!
//! Selector lists are data, not code. The built-in defaults target the
//! profile and activity pages of the default site; a YAML profile can
//! replace any section without touching the rest:
//!
//! ```yaml
//! selectors:
//!   posts:
//!     - ".feed-shared-update-v2"
//! fallback:
//!   divisor: 3.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::parse_selector;
use crate::error::AnalyzerError;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// Ordered CSS selector lists consulted by the extractor, classifier and
/// scanner. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    /// Display-name elements, most semantically specific first.
    pub names: Vec<String>,
    /// Candidate post fragments, broad to narrow. Overlap is expected.
    pub posts: Vec<String>,
    /// Elements that carry an explicit timestamp or a relative-time label.
    pub timestamp_markers: Vec<String>,
    /// Ancestors searched for a marker when the fragment itself has none.
    pub timestamp_containers: Vec<String>,
    pub video_indicators: Vec<String>,
    pub poll_indicators: Vec<String>,
    pub article_indicators: Vec<String>,
    pub image_indicators: Vec<String>,
    /// Heading-like elements scanned by the emergency pass.
    pub emergency_headings: Vec<String>,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            names: strings(&[
                "h1.text-heading-xlarge",
                ".pv-text-details__left-panel h1",
                ".pv-top-card h1",
                ".top-card-layout__title",
                ".profile-topcard-person-entity__name",
                ".artdeco-entity-lockup__title",
                ".update-components-actor__name span[aria-hidden=\"true\"]",
                "main section h1",
                "h1",
            ]),
            posts: strings(&[
                "[data-urn*=\"urn:li:activity\"]",
                ".feed-shared-update-v2",
                ".occludable-update",
                ".profile-creator-shared-feed-update__container",
                "li.profile-creator-shared-feed-update__container",
                ".feed-shared-update-v2__description-wrapper",
                ".update-components-text",
                "[data-id*=\"urn:li:activity\"]",
                "article",
                ".pvs-list__paged-list-item",
            ]),
            timestamp_markers: strings(&[
                "time[datetime]",
                "[datetime]",
                "[data-time]",
                "[data-timestamp]",
                "time",
                ".update-components-actor__sub-description [aria-label]",
                "[aria-label*=\"ago\"]",
                "[title*=\"ago\"]",
            ]),
            timestamp_containers: strings(&[
                ".feed-shared-update-v2",
                ".occludable-update",
                "[data-urn]",
                "article",
                "li",
            ]),
            video_indicators: strings(&[
                "video",
                ".update-components-linkedin-video",
                ".feed-shared-linkedin-video",
                "[data-test-id*=\"video\"]",
            ]),
            poll_indicators: strings(&[
                ".update-components-poll",
                ".feed-shared-poll",
                "[class*=\"poll\"]",
            ]),
            article_indicators: strings(&[
                ".update-components-article",
                ".feed-shared-article",
                "[data-test-id*=\"article\"]",
            ]),
            image_indicators: strings(&[
                ".update-components-image",
                ".feed-shared-image",
                "img[src*=\"feedshare\"]",
                "img:not([class*=\"avatar\"]):not([class*=\"actor\"]):not([class*=\"presence\"])",
            ]),
            emergency_headings: strings(&[
                "h1",
                "h2",
                "h3",
                "[role=\"heading\"]",
                ".text-heading-xlarge",
                "header strong",
            ]),
        }
    }
}

impl SelectorTable {
    /// Every selector in the table, for validation.
    fn all_patterns(&self) -> impl Iterator<Item = &String> {
        self.names
            .iter()
            .chain(&self.posts)
            .chain(&self.timestamp_markers)
            .chain(&self.timestamp_containers)
            .chain(&self.video_indicators)
            .chain(&self.poll_indicators)
            .chain(&self.article_indicators)
            .chain(&self.image_indicators)
            .chain(&self.emergency_headings)
    }
}

/// Scoring constants for the whole-document estimate.
///
/// Empirical values; override them through the heuristics profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTuning {
    /// `estimate = floor(total / divisor)`.
    pub divisor: f64,
    pub max_estimate: u32,
    /// Per verb/time-phrase pair.
    pub contextual_weight: f64,
    /// Per structural marker occurrence.
    pub structural_weight: f64,
    /// Max characters between a verb and a time phrase.
    pub context_window_chars: usize,
    pub action_verbs: Vec<String>,
    /// Class/attribute fragments counted in the raw markup.
    pub structural_markers: Vec<String>,
}

impl Default for FallbackTuning {
    fn default() -> Self {
        Self {
            divisor: 2.5,
            max_estimate: 12,
            contextual_weight: 0.8,
            structural_weight: 0.3,
            context_window_chars: 80,
            action_verbs: strings(&[
                "posted",
                "shared",
                "commented",
                "liked",
                "reposted",
                "reacted",
                "published",
                "wrote",
                "celebrated",
                "replied",
            ]),
            structural_markers: strings(&[
                "feed-shared-update",
                "occludable-update",
                "urn:li:activity",
                "update-components-actor",
                "social-details-social-counts",
                "feed-shared-social-action-bar",
            ]),
        }
    }
}

/// Constants for the degraded last-resort pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyTuning {
    pub keywords: Vec<String>,
    /// Keyword hits that count as one post.
    pub hits_per_post: u32,
    pub max_estimate: u32,
}

impl Default for EmergencyTuning {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "ago",
                "posted",
                "shared",
                "commented",
                "liked",
                "reposted",
                "reacted",
                "yesterday",
                "hour",
                "minute",
            ]),
            hits_per_post: 20,
            max_estimate: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsProfile {
    pub selectors: SelectorTable,
    pub fallback: FallbackTuning,
    pub emergency: EmergencyTuning,
}

impl HeuristicsProfile {
    /// Checks that every selector parses and the constants are usable.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidProfile`] naming the first problem.
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        if self.selectors.posts.is_empty() {
            return Err(AnalyzerError::InvalidProfile(
                "selectors.posts must not be empty".to_owned(),
            ));
        }
        for pattern in self.selectors.all_patterns() {
            parse_selector(pattern).map_err(|e| AnalyzerError::InvalidProfile(e.to_string()))?;
        }
        if !(self.fallback.divisor.is_finite() && self.fallback.divisor > 0.0) {
            return Err(AnalyzerError::InvalidProfile(format!(
                "fallback.divisor must be a positive number, got {}",
                self.fallback.divisor
            )));
        }
        if self.emergency.hits_per_post == 0 {
            return Err(AnalyzerError::InvalidProfile(
                "emergency.hits_per_post must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Loads and validates a YAML heuristics profile. Sections missing from
/// the file keep their defaults.
///
/// # Errors
///
/// Returns [`AnalyzerError::ProfileIo`] / [`AnalyzerError::ProfileParse`] if
/// the file cannot be read or parsed, and [`AnalyzerError::InvalidProfile`]
/// if it fails validation.
pub fn load_profile(path: &Path) -> Result<HeuristicsProfile, AnalyzerError> {
    let content = std::fs::read_to_string(path).map_err(|e| AnalyzerError::ProfileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let profile: HeuristicsProfile =
        serde_yaml::from_str(&content).map_err(|e| AnalyzerError::ProfileParse {
            path: path.display().to_string(),
            source: e,
        })?;
    profile.validate()?;
    tracing::debug!(path = %path.display(), "loaded heuristics profile");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_profile_is_valid() {
        HeuristicsProfile::default().validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "selectors:\n  posts:\n    - \".my-post\"\nfallback:\n  divisor: 3.0\n";
        let profile: HeuristicsProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.selectors.posts, vec![".my-post".to_owned()]);
        assert_eq!(profile.selectors.names, SelectorTable::default().names);
        assert!((profile.fallback.divisor - 3.0).abs() < f64::EPSILON);
        assert_eq!(profile.fallback.max_estimate, 12);
        assert_eq!(profile.emergency, EmergencyTuning::default());
    }

    #[test]
    fn empty_yaml_is_the_default_profile() {
        let profile: HeuristicsProfile = serde_yaml::from_str("{}").unwrap();
        assert_eq!(profile, HeuristicsProfile::default());
    }

    #[test]
    fn broken_selector_fails_validation() {
        let mut profile = HeuristicsProfile::default();
        profile.selectors.posts.push("div[".to_owned());
        let err = profile.validate().unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidProfile(ref msg) if msg.contains("div[")));
    }

    #[test]
    fn empty_post_selectors_fail_validation() {
        let mut profile = HeuristicsProfile::default();
        profile.selectors.posts.clear();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn zero_divisor_fails_validation() {
        let mut profile = HeuristicsProfile::default();
        profile.fallback.divisor = 0.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn load_profile_reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "emergency:\n  max_estimate: 5").unwrap();
        let profile = load_profile(file.path()).unwrap();
        assert_eq!(profile.emergency.max_estimate, 5);
        assert_eq!(profile.emergency.hits_per_post, 20);
    }

    #[test]
    fn load_profile_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "selectors: [not, a, map]").unwrap();
        let err = load_profile(file.path()).unwrap_err();
        assert!(matches!(err, AnalyzerError::ProfileParse { .. }));
    }

    #[test]
    fn load_profile_rejects_invalid_constants() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "emergency:\n  hits_per_post: 0").unwrap();
        let err = load_profile(file.path()).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidProfile(_)));
    }

    #[test]
    fn load_profile_reports_missing_file() {
        let err = load_profile(Path::new("/nonexistent/postpulse-profile.yaml")).unwrap_err();
        assert!(matches!(err, AnalyzerError::ProfileIo { .. }));
    }
}
