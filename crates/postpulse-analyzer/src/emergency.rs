//! Last-resort pass for pages where no name and no activity was found.
//!
//! Names are taken from heading-like elements under the loose validator;
//! activity is a capped keyword-density guess.

use postpulse_core::{AnalysisDebug, PostRecord, PostType};

use crate::document::{DocumentQuery, FragmentQuery};
use crate::name::is_loosely_valid_profile_name;
use crate::profile::{EmergencyTuning, SelectorTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyOutcome {
    pub profile_name: Option<String>,
    pub activity_estimate: u32,
    pub keyword_hits: usize,
}

impl EmergencyOutcome {
    #[must_use]
    pub fn found_anything(&self) -> bool {
        self.profile_name.is_some() || self.activity_estimate > 0
    }

    /// The synthetic record for a positive estimate.
    #[must_use]
    pub fn to_post_record(&self, window_hours: u32) -> Option<PostRecord> {
        (self.activity_estimate > 0).then(|| {
            PostRecord::new(
                &format!(
                    "Possible recent activity ({} keyword hits)",
                    self.keyword_hits
                ),
                format!("Within the last {window_hours} hours (low confidence)"),
                PostType::EmergencyDetection,
            )
        })
    }
}

pub struct EmergencyPass<'t> {
    table: &'t SelectorTable,
    tuning: &'t EmergencyTuning,
    site_name: &'t str,
}

impl<'t> EmergencyPass<'t> {
    #[must_use]
    pub fn new(table: &'t SelectorTable, tuning: &'t EmergencyTuning, site_name: &'t str) -> Self {
        Self {
            table,
            tuning,
            site_name,
        }
    }

    pub fn run<D: DocumentQuery>(&self, doc: &D, debug: &mut AnalysisDebug) -> EmergencyOutcome {
        debug.emergency_used = true;
        let profile_name = self.heading_name(doc, debug);
        let keyword_hits = self.keyword_hits(&doc.visible_text());
        let activity_estimate = self.scale(keyword_hits);
        tracing::info!(
            name_found = profile_name.is_some(),
            keyword_hits,
            activity_estimate,
            "emergency pass finished"
        );
        EmergencyOutcome {
            profile_name,
            activity_estimate,
            keyword_hits,
        }
    }

    fn heading_name<D: DocumentQuery>(&self, doc: &D, debug: &mut AnalysisDebug) -> Option<String> {
        for pattern in &self.table.emergency_headings {
            match doc.query(pattern) {
                Ok(headings) => {
                    let found = headings
                        .iter()
                        .map(FragmentQuery::text)
                        .find(|text| is_loosely_valid_profile_name(text, self.site_name));
                    if found.is_some() {
                        return found;
                    }
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "heading selector failed");
                    debug.record_error(e.to_string());
                }
            }
        }
        None
    }

    /// Case-insensitive, non-overlapping occurrences of every keyword.
    fn keyword_hits(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.tuning
            .keywords
            .iter()
            .map(|kw| kw.trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .map(|kw| text.matches(kw.as_str()).count())
            .sum()
    }

    fn scale(&self, hits: usize) -> u32 {
        let per_post = usize::try_from(self.tuning.hits_per_post.max(1)).unwrap_or(usize::MAX);
        u32::try_from(hits / per_post)
            .unwrap_or(u32::MAX)
            .min(self.tuning.max_estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageDocument;

    fn run(html: &str) -> (EmergencyOutcome, AnalysisDebug) {
        let table = SelectorTable::default();
        let tuning = EmergencyTuning::default();
        let doc = PageDocument::parse(html);
        let mut debug = AnalysisDebug::default();
        let outcome = EmergencyPass::new(&table, &tuning, "LinkedIn").run(&doc, &mut debug);
        (outcome, debug)
    }

    #[test]
    fn heading_passes_loose_validation() {
        let (outcome, debug) = run("<html><body><h2>Recent Updates Team</h2></body></html>");
        assert_eq!(outcome.profile_name.as_deref(), Some("Recent Updates Team"));
        assert!(debug.emergency_used);
        assert!(outcome.found_anything());
    }

    #[test]
    fn site_heading_is_skipped() {
        let (outcome, _) =
            run("<html><body><h1>LinkedIn</h1><h3>Jordan Lee</h3></body></html>");
        assert_eq!(outcome.profile_name.as_deref(), Some("Jordan Lee"));
    }

    #[test]
    fn keyword_density_is_divided_and_capped() {
        let text = "posted ".repeat(45);
        let (outcome, _) = run(&format!("<html><body><p>{text}</p></body></html>"));
        assert_eq!(outcome.keyword_hits, 45);
        assert_eq!(outcome.activity_estimate, 2);

        let text = "ago ".repeat(500);
        let (outcome, _) = run(&format!("<html><body><p>{text}</p></body></html>"));
        assert_eq!(outcome.activity_estimate, 3);
    }

    #[test]
    fn nothing_found() {
        let (outcome, _) = run("<html><body><p>Sign in to continue</p></body></html>");
        assert!(!outcome.found_anything());
        assert!(outcome.to_post_record(24).is_none());
    }

    #[test]
    fn positive_estimate_makes_one_record() {
        let outcome = EmergencyOutcome {
            profile_name: None,
            activity_estimate: 1,
            keyword_hits: 21,
        };
        let record = outcome.to_post_record(24).unwrap();
        assert_eq!(record.post_type, PostType::EmergencyDetection);
        assert!(record.text.contains("21"));
    }
}
