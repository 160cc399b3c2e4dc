//! Whole-document activity estimate for pages where the structural scan
//! finds nothing.
//!
//! Three signals are scored and summed: relative-time phrases in the
//! visible text, action verbs near those phrases, and activity markers in
//! the raw markup. The estimate is always labelled as such.

use postpulse_core::{FallbackDetails, PostRecord, PostType};
use regex::Regex;

use crate::profile::FallbackTuning;
use crate::recency::{all_time_phrases, TimePhrase};

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackEstimate {
    pub estimate: u32,
    pub details: FallbackDetails,
}

impl FallbackEstimate {
    /// The single synthetic record reported for a positive estimate.
    #[must_use]
    pub fn to_post_record(&self, window_hours: u32) -> PostRecord {
        PostRecord::new(
            &format!(
                "Estimated {} recent post(s) from page activity signals",
                self.estimate
            ),
            format!("Within the last {window_hours} hours (estimated)"),
            PostType::FallbackDetection,
        )
    }
}

pub struct FallbackEstimator<'t> {
    tuning: &'t FallbackTuning,
    window_hours: u32,
    verbs: Vec<Regex>,
}

impl<'t> FallbackEstimator<'t> {
    #[must_use]
    pub fn new(tuning: &'t FallbackTuning, window_hours: u32) -> Self {
        let verbs = tuning
            .action_verbs
            .iter()
            .filter(|verb| !verb.trim().is_empty())
            .filter_map(|verb| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(verb.trim()))).ok()
            })
            .collect();
        Self {
            tuning,
            window_hours,
            verbs,
        }
    }

    /// Scores `text` (visible text) and `markup` (raw HTML).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&self, text: &str, markup: &str) -> FallbackEstimate {
        let phrases: Vec<TimePhrase<'_>> = all_time_phrases(text, self.window_hours)
            .into_iter()
            .filter(|p| p.within_window)
            .collect();
        let time_matches = phrases.len();
        let time_score: f64 = phrases.iter().map(|p| p.weight).sum();

        let contextual_matches = self.contextual_pairs(text, &phrases);
        let contextual_score = contextual_matches as f64 * self.tuning.contextual_weight;

        let structural_matches = self.structural_markers(markup);
        let structural_score = structural_matches as f64 * self.tuning.structural_weight;

        let total_score = time_score + contextual_score + structural_score;
        let estimate = scale_estimate(total_score, self.tuning.divisor, self.tuning.max_estimate);

        tracing::debug!(
            time_matches,
            contextual_matches,
            structural_matches,
            total_score,
            estimate,
            "fallback estimate computed"
        );

        FallbackEstimate {
            estimate,
            details: FallbackDetails {
                time_matches,
                time_score,
                contextual_matches,
                contextual_score,
                structural_matches,
                structural_score,
                total_score,
                estimate,
            },
        }
    }

    /// Verb/phrase pairs with at most `context_window_chars` characters
    /// between them, in either order.
    fn contextual_pairs(&self, text: &str, phrases: &[TimePhrase<'_>]) -> usize {
        let limit = self.tuning.context_window_chars;
        let mut pairs = 0;
        for verb in &self.verbs {
            for found in verb.find_iter(text) {
                pairs += phrases
                    .iter()
                    .filter(|phrase| {
                        let gap = if found.end() <= phrase.start {
                            text[found.end()..phrase.start].chars().count()
                        } else if phrase.end <= found.start() {
                            text[phrase.end..found.start()].chars().count()
                        } else {
                            0
                        };
                        gap <= limit
                    })
                    .count();
            }
        }
        pairs
    }

    fn structural_markers(&self, markup: &str) -> usize {
        let markup = markup.to_lowercase();
        self.tuning
            .structural_markers
            .iter()
            .map(|marker| marker.trim().to_lowercase())
            .filter(|marker| !marker.is_empty())
            .map(|marker| markup.matches(marker.as_str()).count())
            .sum()
    }
}

/// `clamp(floor(total / divisor), 0, max)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_estimate(total: f64, divisor: f64, max: u32) -> u32 {
    if !(total.is_finite() && divisor.is_finite() && divisor > 0.0) || total <= 0.0 {
        return 0;
    }
    let raw = (total / divisor).floor();
    if raw >= f64::from(max) {
        max
    } else {
        raw as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(tuning: &FallbackTuning) -> FallbackEstimator<'_> {
        FallbackEstimator::new(tuning, 24)
    }

    #[test]
    fn empty_input_scores_zero() {
        let tuning = FallbackTuning::default();
        let result = estimator(&tuning).estimate("", "");
        assert_eq!(result.estimate, 0);
        assert_eq!(result.details, FallbackDetails::default());
    }

    #[test]
    fn time_phrases_are_weighted_by_pattern() {
        let tuning = FallbackTuning::default();
        // hours 2.0 + minutes 1.0 + yesterday 2.0 + short hours 1.5
        let text = "3 hours ago. 10 minutes ago. yesterday. 5h ago.";
        let result = estimator(&tuning).estimate(text, "");
        assert_eq!(result.details.time_matches, 4);
        assert!((result.details.time_score - 6.5).abs() < 1e-9);
        assert_eq!(result.estimate, 2);
    }

    #[test]
    fn out_of_window_phrases_do_not_count() {
        let tuning = FallbackTuning::default();
        let result = estimator(&tuning).estimate("30 hours ago and 2000 minutes ago", "");
        assert_eq!(result.details.time_matches, 0);
        assert_eq!(result.estimate, 0);
    }

    #[test]
    fn verbs_near_phrases_add_context_in_either_order() {
        let tuning = FallbackTuning::default();
        let text = "Jane posted this 2 hours ago. 3 hours ago she commented.";
        let result = estimator(&tuning).estimate(text, "");
        // Both verbs are within 80 chars of both phrases.
        assert_eq!(result.details.contextual_matches, 4);
        assert!((result.details.contextual_score - 3.2).abs() < 1e-9);
    }

    #[test]
    fn distant_verbs_are_ignored() {
        let tuning = FallbackTuning::default();
        let text = format!("posted {} 2 hours ago", "filler ".repeat(20));
        let result = estimator(&tuning).estimate(&text, "");
        assert_eq!(result.details.contextual_matches, 0);
    }

    #[test]
    fn structural_markers_are_counted_case_insensitively() {
        let tuning = FallbackTuning::default();
        let markup = r#"<div class="Feed-Shared-Update-v2" data-urn="urn:li:activity:1"></div>
            <div class="feed-shared-update-v2" data-urn="urn:li:activity:2"></div>"#;
        let result = estimator(&tuning).estimate("", markup);
        assert_eq!(result.details.structural_matches, 4);
        assert!((result.details.structural_score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn estimate_is_capped() {
        let tuning = FallbackTuning::default();
        let text = "posted 1 hour ago. ".repeat(50);
        let result = estimator(&tuning).estimate(&text, "");
        assert_eq!(result.estimate, tuning.max_estimate);
    }

    #[test]
    fn estimate_is_monotonic_in_time_phrases() {
        let tuning = FallbackTuning::default();
        let est = estimator(&tuning);
        let mut previous = 0;
        for n in 0..30 {
            let text = "Update from 4 hours ago. ".repeat(n);
            let current = est.estimate(&text, "").estimate;
            assert!(current >= previous, "estimate dropped at {n} phrases");
            previous = current;
        }
    }

    #[test]
    fn custom_tuning_changes_the_scale() {
        let tuning = FallbackTuning {
            divisor: 1.0,
            ..FallbackTuning::default()
        };
        let result = estimator(&tuning).estimate("2 hours ago", "");
        assert_eq!(result.estimate, 2);
    }

    #[test]
    fn record_is_labelled_as_an_estimate() {
        let estimate = FallbackEstimate {
            estimate: 3,
            details: FallbackDetails::default(),
        };
        let record = estimate.to_post_record(24);
        assert_eq!(record.post_type, PostType::FallbackDetection);
        assert!(record.text.contains('3'));
        assert!(record.time.contains("24 hours"));
    }

    #[test]
    fn scale_estimate_handles_degenerate_inputs() {
        assert_eq!(scale_estimate(f64::NAN, 2.5, 12), 0);
        assert_eq!(scale_estimate(10.0, 0.0, 12), 0);
        assert_eq!(scale_estimate(-1.0, 2.5, 12), 0);
        assert_eq!(scale_estimate(4.99, 2.5, 12), 1);
        assert_eq!(scale_estimate(5.0, 2.5, 12), 2);
    }
}
