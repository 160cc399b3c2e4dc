//! Display-name extraction.
//!
//! Strategies run in a fixed priority order and the first candidate that
//! passes [`is_valid_profile_name`] wins. Exhausting every strategy yields
//! [`UNKNOWN_PROFILE_NAME`]; nothing here returns an error.

use std::sync::LazyLock;

use postpulse_core::{AnalysisDebug, UNKNOWN_PROFILE_NAME};
use regex::Regex;
use serde_json::Value;

use crate::document::{collapse_whitespace, DocumentQuery, FragmentQuery};
use crate::profile::SelectorTable;

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 100;

/// Separators between the name and the rest of a page title, tried in order.
pub const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " · ", " — ", " • ", " – ", " on X"];

const FORBIDDEN_SUBSTRINGS: &[&str] = &[
    "profile",
    "activity",
    "recent",
    "connection",
    "view",
    "show",
    "edit",
    "update",
    "see all",
    "see more",
    "follow",
    "connect",
    "message",
];

const FORBIDDEN_MARKERS: &[&str] = &["(", ")", "[", "]", "@", "www.", "http"];

/// Interface words that are never a name on their own.
const UI_WORDS: &[&str] = &[
    "show", "view", "see", "all", "more", "less", "edit", "update", "follow", "connect",
    "message", "home", "about", "contact",
];

/// Metadata keys whose values look like `"<name> | <site>"`.
const SPLIT_META_KEYS: &[&str] = &["og:title", "twitter:title", "profile:username"];

/// Metadata keys whose values are the name itself.
const WHOLE_META_KEYS: &[&str] = &["author", "name"];

static NOTIFICATION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d+\)\s*").expect("valid notification regex"));

static VIEW_PROFILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:view)\s+(.{2,100}?)['’]s\s+(?i:profile)").expect("valid view-profile regex")
});

/// Capitalized words, up to five, immediately before `is on <site>`.
const IS_ON_NAME: &str = r"([\p{Lu}][\p{L}\p{M}.'’-]*(?:\s+[\p{Lu}][\p{L}\p{M}.'’-]*){0,4})";

fn char_len_in_bounds(candidate: &str) -> bool {
    (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&candidate.chars().count())
}

fn is_ui_word(candidate: &str) -> bool {
    UI_WORDS.iter().any(|w| candidate.eq_ignore_ascii_case(w))
}

fn mentions_site(lower: &str, site_name: &str) -> bool {
    let site = site_name.trim().to_lowercase();
    !site.is_empty() && lower.contains(&site)
}

/// Strict validation applied to every strategy's candidates.
#[must_use]
pub fn is_valid_profile_name(candidate: &str, site_name: &str) -> bool {
    let candidate = candidate.trim();
    if !char_len_in_bounds(candidate) {
        return false;
    }
    let lower = candidate.to_lowercase();
    if mentions_site(&lower, site_name) {
        return false;
    }
    if FORBIDDEN_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }
    if FORBIDDEN_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    if is_ui_word(candidate) {
        return false;
    }
    candidate.chars().any(char::is_alphabetic)
}

/// Looser validation used only by the emergency pass.
#[must_use]
pub fn is_loosely_valid_profile_name(candidate: &str, site_name: &str) -> bool {
    let candidate = candidate.trim();
    if !char_len_in_bounds(candidate) || !candidate.chars().any(char::is_alphabetic) {
        return false;
    }
    let lower = candidate.to_lowercase();
    !mentions_site(&lower, site_name)
        && !is_ui_word(candidate)
        && !lower.contains("http")
        && !lower.contains("www.")
}

/// The part of a page title before its first separator (separators tried in
/// [`TITLE_SEPARATORS`] order), with any leading `(N)` notification count
/// removed. A title without a separator is returned whole.
#[must_use]
pub fn split_title(title: &str) -> &str {
    let title = NOTIFICATION_PREFIX
        .find(title)
        .map_or(title, |m| &title[m.end()..]);
    TITLE_SEPARATORS
        .iter()
        .find_map(|sep| title.find(sep).map(|idx| &title[..idx]))
        .unwrap_or(title)
        .trim()
}

/// One way of finding the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStrategy {
    Selectors,
    Title,
    Metadata,
    StructuredData,
    TextPattern,
}

impl NameStrategy {
    pub const ORDERED: [NameStrategy; 5] = [
        NameStrategy::Selectors,
        NameStrategy::Title,
        NameStrategy::Metadata,
        NameStrategy::StructuredData,
        NameStrategy::TextPattern,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            NameStrategy::Selectors => "selectors",
            NameStrategy::Title => "title",
            NameStrategy::Metadata => "metadata",
            NameStrategy::StructuredData => "structured-data",
            NameStrategy::TextPattern => "text-pattern",
        }
    }

    /// First valid candidate this strategy can find, if any.
    pub fn attempt<D: DocumentQuery>(
        self,
        extractor: &NameExtractor<'_>,
        doc: &D,
        debug: &mut AnalysisDebug,
    ) -> Option<String> {
        let valid = |candidate: &str| extractor.accept(candidate);
        match self {
            NameStrategy::Selectors => extractor.find_in_selectors(doc, debug),
            NameStrategy::Title => doc.title().and_then(|t| valid(split_title(&t))),
            NameStrategy::Metadata => {
                let split = SPLIT_META_KEYS
                    .iter()
                    .filter_map(|key| doc.meta_content(key))
                    .find_map(|content| valid(split_title(&content)));
                split.or_else(|| {
                    WHOLE_META_KEYS
                        .iter()
                        .filter_map(|key| doc.meta_content(key))
                        .find_map(|content| valid(&content))
                })
            }
            NameStrategy::StructuredData => doc
                .structured_data_blocks()
                .iter()
                .flat_map(|raw| structured_data_names(raw, debug))
                .find_map(|name| valid(&name)),
            NameStrategy::TextPattern => extractor.find_in_text(&doc.visible_text()),
        }
    }
}

/// Runs the name strategies against one document.
pub struct NameExtractor<'t> {
    table: &'t SelectorTable,
    site_name: &'t str,
    is_on_site: Option<Regex>,
}

impl<'t> NameExtractor<'t> {
    #[must_use]
    pub fn new(table: &'t SelectorTable, site_name: &'t str) -> Self {
        let is_on_site = Regex::new(&format!(
            r"{IS_ON_NAME}\s+is\s+on\s+(?i:{})",
            regex::escape(site_name.trim())
        ))
        .ok();
        Self {
            table,
            site_name,
            is_on_site,
        }
    }

    /// The display name, or [`UNKNOWN_PROFILE_NAME`]. The winning strategy
    /// is recorded in `debug.name_strategy`.
    pub fn extract<D: DocumentQuery>(&self, doc: &D, debug: &mut AnalysisDebug) -> String {
        for strategy in NameStrategy::ORDERED {
            if let Some(name) = strategy.attempt(self, doc, debug) {
                tracing::debug!(strategy = strategy.label(), name = %name, "profile name found");
                debug.name_strategy = Some(strategy.label().to_owned());
                return name;
            }
        }
        tracing::debug!("no name strategy produced a valid name");
        UNKNOWN_PROFILE_NAME.to_owned()
    }

    fn accept(&self, candidate: &str) -> Option<String> {
        let candidate = collapse_whitespace(candidate);
        is_valid_profile_name(&candidate, self.site_name).then_some(candidate)
    }

    fn find_in_selectors<D: DocumentQuery>(
        &self,
        doc: &D,
        debug: &mut AnalysisDebug,
    ) -> Option<String> {
        for pattern in &self.table.names {
            let fragments = match doc.query(pattern) {
                Ok(fragments) => fragments,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "name selector failed");
                    debug.record_error(e.to_string());
                    continue;
                }
            };
            if let Some(name) = fragments.iter().find_map(|f| self.accept(&f.text())) {
                return Some(name);
            }
        }
        None
    }

    fn find_in_text(&self, text: &str) -> Option<String> {
        let view = VIEW_PROFILE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| self.accept(m.as_str()));
        view.or_else(|| {
            self.is_on_site.as_ref().and_then(|re| {
                re.captures_iter(text)
                    .filter_map(|caps| caps.get(1))
                    .find_map(|m| self.accept(m.as_str()))
            })
        })
    }
}

/// `name` values from a JSON-LD block: top-level object(s), then `Person`
/// entities one level down in `@graph`.
fn structured_data_names(raw: &str, debug: &mut AnalysisDebug) -> Vec<String> {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable structured data block");
            debug.record_error(format!("structured data: {e}"));
            return Vec::new();
        }
    };

    let top_level: Vec<&Value> = match &value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut names: Vec<String> = top_level
        .iter()
        .filter_map(|item| item.get("name")?.as_str().map(str::to_owned))
        .collect();

    for item in &top_level {
        let Some(Value::Array(graph)) = item.get("@graph") else {
            continue;
        };
        names.extend(
            graph
                .iter()
                .filter(|entity| is_person(entity))
                .filter_map(|entity| entity.get("name")?.as_str().map(str::to_owned)),
        );
    }
    names
}

fn is_person(entity: &Value) -> bool {
    match entity.get("@type") {
        Some(Value::String(t)) => t == "Person",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Person")),
        _ => false,
    }
}
