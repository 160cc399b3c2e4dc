//! Analysis orchestration: one pass over a snapshot, tier by tier.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use postpulse_core::{
    AnalysisDebug, AnalysisMethod, AnalysisResult, AppConfig, Clock, PostRecord, SystemClock,
    MAX_DISPLAYED_POSTS, UNKNOWN_PROFILE_NAME,
};

use crate::document::{DocumentQuery, PageDocument};
use crate::emergency::EmergencyPass;
use crate::error::AnalyzerError;
use crate::fallback::FallbackEstimator;
use crate::name::NameExtractor;
use crate::profile::HeuristicsProfile;
use crate::recency::RecencyWindow;
use crate::scanner::ContentScanner;
use crate::source::{document_fingerprint, DocumentSource};

/// Runtime knobs for one [`Analyzer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerSettings {
    pub site_name: String,
    pub window_hours: u32,
    /// Wait before each snapshot in [`Analyzer::analyze_source`].
    pub settle_delay: Duration,
    /// Snapshots larger than this fail the whole analysis.
    pub max_document_bytes: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            site_name: "LinkedIn".to_owned(),
            window_hours: 24,
            settle_delay: Duration::from_millis(1500),
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AnalyzerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            site_name: config.site_name.clone(),
            window_hours: config.window_hours,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            max_document_bytes: config.max_document_bytes,
        }
    }
}

/// Result of [`Analyzer::analyze_source`]: the analysis plus the
/// fingerprint of the snapshot that was scanned (absent on total failure).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAnalysis {
    pub result: AnalysisResult,
    pub document_sha256: Option<String>,
}

/// Sequences name extraction, the structural scan, the fallback estimate,
/// and the emergency pass. Every entry point returns a well-formed
/// [`AnalysisResult`]; failures surface as an `"Error"` result.
pub struct Analyzer<C: Clock = SystemClock> {
    settings: AnalyzerSettings,
    profile: HeuristicsProfile,
    clock: C,
}

impl Analyzer<SystemClock> {
    #[must_use]
    pub fn new(settings: AnalyzerSettings, profile: HeuristicsProfile) -> Self {
        Self::with_clock(settings, profile, SystemClock)
    }
}

impl<C: Clock> Analyzer<C> {
    #[must_use]
    pub fn with_clock(settings: AnalyzerSettings, profile: HeuristicsProfile, clock: C) -> Self {
        Self {
            settings,
            profile,
            clock,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    #[must_use]
    pub fn profile(&self) -> &HeuristicsProfile {
        &self.profile
    }

    /// Runs every tier against one snapshot, synchronously.
    #[must_use]
    pub fn analyze_html(&self, html: &str) -> AnalysisResult {
        let window = self.window();
        if let Err(e) = self.check_size(html) {
            return self.failure(&e);
        }

        let doc = PageDocument::parse(html);
        let mut debug = AnalysisDebug::default();
        let name = self.extract_name(&doc, &mut debug);
        self.run_tiers(&doc, &window, name, debug)
    }

    /// Waits the settle delay, snapshots, extracts the name, waits again,
    /// re-snapshots (keeping the first snapshot if that fails), then scans.
    pub async fn analyze_source<S: DocumentSource>(&self, source: &S) -> SourceAnalysis {
        let window = self.window();
        let label = source.describe();

        // Step 1: first snapshot, for the name.
        self.settle().await;
        let first = match source.snapshot().await {
            Ok(markup) => markup,
            Err(e) => {
                tracing::error!(source = %label, error = %e, "snapshot failed");
                return SourceAnalysis {
                    result: self.failure(&e),
                    document_sha256: None,
                };
            }
        };
        if let Err(e) = self.check_size(&first) {
            tracing::error!(source = %label, error = %e, "snapshot rejected");
            return SourceAnalysis {
                result: self.failure(&e),
                document_sha256: None,
            };
        }

        let mut debug = AnalysisDebug::default();
        let name = {
            let doc = PageDocument::parse(&first);
            self.extract_name(&doc, &mut debug)
        };

        // Step 2: refreshed snapshot, for the scan.
        self.settle().await;
        let markup = match source.snapshot().await {
            Ok(refreshed) => match self.check_size(&refreshed) {
                Ok(()) => refreshed,
                Err(e) => {
                    tracing::warn!(source = %label, error = %e, "refreshed snapshot rejected, keeping first");
                    debug.record_error(e.to_string());
                    first
                }
            },
            Err(e) => {
                tracing::warn!(source = %label, error = %e, "refresh failed, keeping first snapshot");
                debug.record_error(e.to_string());
                first
            }
        };

        // Step 3: tiers.
        let document_sha256 = Some(document_fingerprint(&markup));
        let doc = PageDocument::parse(&markup);
        let result = self.run_tiers(&doc, &window, name, debug);
        tracing::info!(
            source = %label,
            post_count = result.post_count,
            method = %result.method,
            "analysis complete"
        );
        SourceAnalysis {
            result,
            document_sha256,
        }
    }

    fn window(&self) -> RecencyWindow {
        RecencyWindow::ending_at(self.clock.now(), self.settings.window_hours)
    }

    async fn settle(&self) {
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
    }

    fn check_size(&self, markup: &str) -> Result<(), AnalyzerError> {
        let limit = self.settings.max_document_bytes;
        if markup.len() > limit {
            return Err(AnalyzerError::DocumentTooLarge {
                size: markup.len(),
                limit,
            });
        }
        Ok(())
    }

    fn failure(&self, err: &AnalyzerError) -> AnalysisResult {
        AnalysisResult::failed(err.to_string(), self.clock.now())
    }

    fn extract_name<D: DocumentQuery>(&self, doc: &D, debug: &mut AnalysisDebug) -> String {
        NameExtractor::new(&self.profile.selectors, &self.settings.site_name).extract(doc, debug)
    }

    fn run_tiers<D: DocumentQuery>(
        &self,
        doc: &D,
        window: &RecencyWindow,
        mut profile_name: String,
        mut debug: AnalysisDebug,
    ) -> AnalysisResult {
        // Tier 1: structural scan.
        let mut seen = HashSet::new();
        let mut posts = ContentScanner::new(&self.profile.selectors).scan(
            doc,
            window,
            &mut seen,
            &mut debug,
        );
        if !posts.is_empty() {
            let post_count = posts.len();
            posts.truncate(MAX_DISPLAYED_POSTS);
            return self.finish(post_count, profile_name, posts, AnalysisMethod::Scan, debug);
        }

        // Tier 2: whole-document estimate.
        let estimate = FallbackEstimator::new(&self.profile.fallback, window.hours)
            .estimate(&doc.visible_text(), doc.markup());
        debug.fallback = Some(estimate.details.clone());
        if estimate.estimate > 0 {
            let record = estimate.to_post_record(window.hours);
            return self.finish(
                to_count(estimate.estimate),
                profile_name,
                vec![record],
                AnalysisMethod::Fallback,
                debug,
            );
        }

        if profile_name != UNKNOWN_PROFILE_NAME {
            return self.finish(0, profile_name, Vec::new(), AnalysisMethod::None, debug);
        }

        // Tier 3: emergency pass.
        let outcome = EmergencyPass::new(
            &self.profile.selectors,
            &self.profile.emergency,
            &self.settings.site_name,
        )
        .run(doc, &mut debug);
        let method = if outcome.found_anything() {
            AnalysisMethod::Emergency
        } else {
            AnalysisMethod::None
        };
        let posts: Vec<_> = outcome.to_post_record(window.hours).into_iter().collect();
        if let Some(name) = outcome.profile_name {
            profile_name = name;
        }
        self.finish(
            to_count(outcome.activity_estimate),
            profile_name,
            posts,
            method,
            debug,
        )
    }

    fn finish(
        &self,
        post_count: usize,
        profile_name: String,
        posts: Vec<PostRecord>,
        method: AnalysisMethod,
        debug: AnalysisDebug,
    ) -> AnalysisResult {
        let analyzed_at: DateTime<Utc> = self.clock.now();
        let error_count = debug.errors.len();
        tracing::debug!(
            post_count,
            profile_name = %profile_name,
            method = %method,
            errors = error_count,
            "tiers finished"
        );
        AnalysisResult {
            post_count,
            profile_name,
            analyzed_at,
            posts,
            method,
            debug,
            error: None,
        }
    }
}

fn to_count(estimate: u32) -> usize {
    usize::try_from(estimate).unwrap_or(usize::MAX)
}
