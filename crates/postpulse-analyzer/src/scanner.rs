//! Structural scan: walk the post selectors, keep recent fragments once.

use std::collections::HashSet;

use postpulse_core::{AnalysisDebug, PostRecord, PostType};

use crate::document::{DocumentQuery, FragmentQuery};
use crate::profile::SelectorTable;
use crate::recency::{RecencyClassifier, RecencyWindow};

/// Fragments with less trimmed text than this are chrome, not posts.
pub const MIN_FRAGMENT_CHARS: usize = 15;

/// Length of the de-duplication key, in characters.
pub const DEDUP_KEY_CHARS: usize = 100;

/// First [`DEDUP_KEY_CHARS`] characters of the trimmed text.
#[must_use]
pub fn dedup_key(text: &str) -> String {
    text.trim().chars().take(DEDUP_KEY_CHARS).collect()
}

pub struct ContentScanner<'t> {
    table: &'t SelectorTable,
    classifier: RecencyClassifier<'t>,
}

impl<'t> ContentScanner<'t> {
    #[must_use]
    pub fn new(table: &'t SelectorTable) -> Self {
        Self {
            table,
            classifier: RecencyClassifier::new(table),
        }
    }

    /// Recent fragments in selector-list order, then document order.
    ///
    /// `seen` is shared across every selector so overlapping matches (an
    /// outer card and its inner text block) yield one record.
    pub fn scan<D: DocumentQuery>(
        &self,
        doc: &D,
        window: &RecencyWindow,
        seen: &mut HashSet<String>,
        debug: &mut AnalysisDebug,
    ) -> Vec<PostRecord> {
        let mut records = Vec::new();

        for pattern in &self.table.posts {
            debug.selectors_tried += 1;
            let fragments = match doc.query(pattern) {
                Ok(fragments) => fragments,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "post selector failed");
                    debug.record_error(e.to_string());
                    continue;
                }
            };
            if fragments.is_empty() {
                continue;
            }
            debug.selectors_matched += 1;
            tracing::debug!(pattern = %pattern, matches = fragments.len(), "post selector matched");

            for fragment in &fragments {
                debug.elements_scanned += 1;
                let text = fragment.text();
                let key = dedup_key(&text);
                if seen.contains(&key) {
                    debug.duplicates_skipped += 1;
                    continue;
                }
                if text.trim().chars().count() < MIN_FRAGMENT_CHARS {
                    debug.short_skipped += 1;
                    continue;
                }

                let verdict = self.classifier.classify(fragment, &text, window, debug);
                if !verdict.is_recent {
                    debug.not_recent += 1;
                    continue;
                }

                seen.insert(key);
                let post_type = self.media_type(fragment, debug);
                let time = verdict.time_label.unwrap_or_default();
                records.push(PostRecord::new(&text, time, post_type));
            }
        }

        records
    }

    /// Media classification: video, poll, article, image, else text.
    pub fn media_type<F: FragmentQuery>(&self, fragment: &F, debug: &mut AnalysisDebug) -> PostType {
        let ordered: [(&[String], PostType); 4] = [
            (&self.table.video_indicators, PostType::Video),
            (&self.table.poll_indicators, PostType::Poll),
            (&self.table.article_indicators, PostType::Article),
            (&self.table.image_indicators, PostType::Image),
        ];
        for (indicators, post_type) in ordered {
            for pattern in indicators {
                match fragment.has(pattern) {
                    Ok(true) => return post_type,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "media selector failed");
                        debug.record_error(e.to_string());
                    }
                }
            }
        }
        PostType::Text
    }
}
