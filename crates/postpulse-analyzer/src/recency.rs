//! Recency classification: is a fragment's activity inside the window?
//!
//! Evidence is tried in order:
//! 1. an explicit timestamp marker (in the fragment, then in known
//!    containers around it),
//! 2. a relative-time label on that marker (`aria-label` / `title`),
//! 3. relative-time phrases in the fragment text.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use postpulse_core::AnalysisDebug;
use regex::Regex;

use crate::document::FragmentQuery;
use crate::profile::SelectorTable;

/// Attributes that may hold a machine-readable instant.
const TIMESTAMP_ATTRS: &[&str] = &["datetime", "data-time", "data-timestamp"];

/// Attributes that may hold a human relative-time label.
const LABEL_ATTRS: &[&str] = &["aria-label", "title"];

/// Prefix on `time_label` when the verdict came from a text phrase.
pub const TEXT_LABEL_PREFIX: &str = "Text: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
    /// Only "1 day ago" / "yesterday"; inside any window of 24h or more.
    Day,
}

/// One entry of the ordered relative-time pattern table.
#[derive(Debug)]
pub struct RelativeTimePattern {
    pub name: &'static str,
    regex: Regex,
    pub unit: TimeUnit,
    /// Weight of one match in the fallback time score.
    pub fallback_weight: f64,
}

impl RelativeTimePattern {
    fn new(name: &'static str, pattern: &str, unit: TimeUnit, fallback_weight: f64) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("valid relative-time regex"),
            unit,
            fallback_weight,
        }
    }
}

/// First match wins, so more specific phrasings come before looser ones.
pub static TIME_PATTERNS: LazyLock<Vec<RelativeTimePattern>> = LazyLock::new(|| {
    vec![
        RelativeTimePattern::new(
            "minutes",
            r"(?i)\b([0-9]+)\s*(?:minutes?|mins?)\s+ago\b",
            TimeUnit::Minute,
            1.0,
        ),
        RelativeTimePattern::new(
            "hours",
            r"(?i)\b([0-9]+)\s*(?:hours?|hrs?)\s+ago\b",
            TimeUnit::Hour,
            2.0,
        ),
        RelativeTimePattern::new("one_day", r"(?i)\b1\s+day\s+ago\b", TimeUnit::Day, 2.0),
        RelativeTimePattern::new("yesterday", r"(?i)\byesterday\b", TimeUnit::Day, 2.0),
        RelativeTimePattern::new(
            "short_hours",
            r"(?i)\b([0-9]+)h\s+ago\b",
            TimeUnit::Hour,
            1.5,
        ),
        RelativeTimePattern::new(
            "short_minutes",
            r"(?i)\b([0-9]+)m\s+ago\b",
            TimeUnit::Minute,
            1.0,
        ),
        RelativeTimePattern::new(
            "about_hours",
            r"(?i)\babout\s+(?:an?|([0-9]+))\s+hours?\s+ago\b",
            TimeUnit::Hour,
            2.0,
        ),
        RelativeTimePattern::new(
            "about_minutes",
            r"(?i)\babout\s+(?:an?|([0-9]+))\s+minutes?\s+ago\b",
            TimeUnit::Minute,
            1.0,
        ),
    ]
});

/// A relative-time phrase found in some text.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePhrase<'t> {
    pub pattern: &'static str,
    pub phrase: &'t str,
    /// Parsed N; `None` when the number does not fit a `u32`.
    pub value: Option<u32>,
    pub within_window: bool,
    pub weight: f64,
    pub start: usize,
    pub end: usize,
}

fn phrase_from_match<'t>(
    pattern: &RelativeTimePattern,
    caps: &regex::Captures<'t>,
    window_hours: u32,
) -> Option<TimePhrase<'t>> {
    let whole = caps.get(0)?;
    // No capture group, or the optional group did not participate ("an hour").
    let value = match caps.get(1) {
        Some(m) => m.as_str().parse::<u32>().ok(),
        None => Some(1),
    };
    let within_window = value.is_some_and(|n| within_bound(pattern.unit, n, window_hours));
    Some(TimePhrase {
        pattern: pattern.name,
        phrase: whole.as_str(),
        value,
        within_window,
        weight: pattern.fallback_weight,
        start: whole.start(),
        end: whole.end(),
    })
}

fn within_bound(unit: TimeUnit, value: u32, window_hours: u32) -> bool {
    match unit {
        TimeUnit::Minute => u64::from(value) <= u64::from(window_hours) * 60,
        TimeUnit::Hour => value <= window_hours,
        // A one-day phrase sits a full day back.
        TimeUnit::Day => window_hours >= 24,
    }
}

/// The phrase chosen by the first pattern (in table order) that matches
/// anywhere in `text`. Its bound decides; later patterns are not consulted.
#[must_use]
pub fn first_time_phrase(text: &str, window_hours: u32) -> Option<TimePhrase<'_>> {
    TIME_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.regex.captures(text)?;
        phrase_from_match(pattern, &caps, window_hours)
    })
}

/// Every non-overlapping relative-time phrase in `text`, in text order.
/// Where two patterns cover the same span, the earlier pattern claims it.
#[must_use]
pub fn all_time_phrases(text: &str, window_hours: u32) -> Vec<TimePhrase<'_>> {
    let mut accepted: Vec<TimePhrase<'_>> = Vec::new();
    for pattern in TIME_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(found) = phrase_from_match(pattern, &caps, window_hours) else {
                continue;
            };
            let overlaps = accepted
                .iter()
                .any(|seen| found.start < seen.end && seen.start < found.end);
            if !overlaps {
                accepted.push(found);
            }
        }
    }
    accepted.sort_by_key(|p| p.start);
    accepted
}

/// Parses a machine timestamp: RFC 3339, naive ISO date-time (as UTC),
/// `YYYY-MM-DD` (midnight UTC), or epoch seconds / milliseconds.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = raw.parse().ok()?;
        // 12+ digits is past the year 5138 in seconds; treat as millis.
        return if raw.len() >= 12 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `[cutoff, now]`, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    pub now: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub hours: u32,
}

impl RecencyWindow {
    /// The window of `hours` ending at `now`. A window reaching past the
    /// representable range starts at [`DateTime::<Utc>::MIN_UTC`].
    #[must_use]
    pub fn ending_at(now: DateTime<Utc>, hours: u32) -> Self {
        let cutoff = TimeDelta::try_hours(i64::from(hours))
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { now, cutoff, hours }
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.cutoff <= instant && instant <= self.now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyEvidence {
    Timestamp,
    MarkerLabel,
    TextPhrase,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyVerdict {
    pub is_recent: bool,
    /// Raw timestamp value or `"Text: <phrase>"`; `None` without evidence.
    pub time_label: Option<String>,
    pub evidence: RecencyEvidence,
}

impl RecencyVerdict {
    fn from_phrase(phrase: &TimePhrase<'_>, evidence: RecencyEvidence) -> Self {
        Self {
            is_recent: phrase.within_window,
            time_label: Some(format!("{TEXT_LABEL_PREFIX}{}", phrase.phrase)),
            evidence,
        }
    }

    fn no_evidence() -> Self {
        Self {
            is_recent: false,
            time_label: None,
            evidence: RecencyEvidence::Nothing,
        }
    }
}

pub struct RecencyClassifier<'t> {
    table: &'t SelectorTable,
}

impl<'t> RecencyClassifier<'t> {
    #[must_use]
    pub fn new(table: &'t SelectorTable) -> Self {
        Self { table }
    }

    /// Decides whether `fragment` (whose rendered text is `text`) shows
    /// activity inside `window`. Selector failures are recorded in `debug`
    /// and skipped.
    pub fn classify<F: FragmentQuery>(
        &self,
        fragment: &F,
        text: &str,
        window: &RecencyWindow,
        debug: &mut AnalysisDebug,
    ) -> RecencyVerdict {
        for marker in self.marker_candidates(fragment, debug) {
            if let Some(verdict) = resolve_marker(&marker, window) {
                return verdict;
            }
        }

        match first_time_phrase(text, window.hours) {
            Some(phrase) => RecencyVerdict::from_phrase(&phrase, RecencyEvidence::TextPhrase),
            None => RecencyVerdict::no_evidence(),
        }
    }

    /// Markers inside the fragment; failing that, markers inside the first
    /// known container around it that has any.
    fn marker_candidates<F: FragmentQuery>(
        &self,
        fragment: &F,
        debug: &mut AnalysisDebug,
    ) -> Vec<F> {
        let mut markers = self.markers_within(fragment, debug);
        if !markers.is_empty() {
            return markers;
        }

        for container_pattern in &self.table.timestamp_containers {
            match fragment.closest(container_pattern) {
                Ok(Some(container)) => {
                    markers = self.markers_within(&container, debug);
                    if !markers.is_empty() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(pattern = %container_pattern, error = %e, "container selector failed");
                    debug.record_error(e.to_string());
                }
            }
        }
        markers
    }

    fn markers_within<F: FragmentQuery>(&self, scope: &F, debug: &mut AnalysisDebug) -> Vec<F> {
        let mut markers = Vec::new();
        for pattern in &self.table.timestamp_markers {
            match scope.select(pattern) {
                Ok(found) => markers.extend(found),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "marker selector failed");
                    debug.record_error(e.to_string());
                }
            }
        }
        markers
    }
}

fn resolve_marker<F: FragmentQuery>(marker: &F, window: &RecencyWindow) -> Option<RecencyVerdict> {
    for attr in TIMESTAMP_ATTRS {
        let Some(raw) = marker.attr(attr) else {
            continue;
        };
        if let Some(instant) = parse_timestamp(&raw) {
            return Some(RecencyVerdict {
                is_recent: window.contains(instant),
                time_label: Some(raw.trim().to_owned()),
                evidence: RecencyEvidence::Timestamp,
            });
        }
    }

    for attr in LABEL_ATTRS {
        let Some(label) = marker.attr(attr) else {
            continue;
        };
        if !label.to_lowercase().contains("ago") {
            continue;
        }
        if let Some(phrase) = first_time_phrase(&label, window.hours) {
            return Some(RecencyVerdict::from_phrase(
                &phrase,
                RecencyEvidence::MarkerLabel,
            ));
        }
    }

    None
}

#[cfg(test)]
#[path = "recency_test.rs"]
mod tests;
