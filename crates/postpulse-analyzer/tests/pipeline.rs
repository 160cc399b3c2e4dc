//! End-to-end tests for `Analyzer::analyze_html` over small page fixtures.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use postpulse_analyzer::{Analyzer, AnalyzerSettings, HeuristicsProfile};
use postpulse_core::{AnalysisMethod, FixedClock, PostType, UNKNOWN_PROFILE_NAME};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

fn analyzer_with(profile: HeuristicsProfile) -> Analyzer<FixedClock> {
    let settings = AnalyzerSettings {
        settle_delay: Duration::ZERO,
        ..AnalyzerSettings::default()
    };
    Analyzer::with_clock(settings, profile, FixedClock(now()))
}

fn analyzer() -> Analyzer<FixedClock> {
    analyzer_with(HeuristicsProfile::default())
}

const IMAGE_POST_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Jane Doe | LinkedIn</title></head>
<body>
  <main>
    <div class="feed-shared-update-v2" data-urn="urn:li:activity:7001">
      <div class="update-components-text">Great offsite with the team this week! posted 2 hours ago</div>
      <div class="update-components-image"><img src="https://media.example.com/feedshare-1.jpg" alt=""></div>
    </div>
  </main>
</body>
</html>"#;

const ACTIVITY_TEXT_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Jane Doe | LinkedIn</title></head>
<body>
  <div class="stream">
    <span>Jane posted 2 hours ago</span>
    <span>Jane shared 5 hours ago</span>
    <span>Jane commented 1 hour ago</span>
  </div>
</body>
</html>"#;

const MIXED_FEED_PAGE: &str = r#"<!doctype html>
<html>
<head><title>(4) Jordan Lee | LinkedIn</title></head>
<body>
  <div class="feed-shared-update-v2">
    <time datetime="2026-03-14T09:15:00Z">3h</time>
    <p>New case study on onboarding flows is live</p>
    <div class="update-components-article"><a href="https://blog.example.com">Read more</a></div>
  </div>
  <div class="feed-shared-update-v2">
    <time datetime="2026-03-10T09:15:00Z">4d</time>
    <p>Throwback to the design systems meetup</p>
  </div>
  <div class="feed-shared-update-v2">
    <span aria-label="45 minutes ago">45m</span>
    <p>Which prototyping tool do you use most?</p>
    <div class="update-components-poll"></div>
  </div>
</body>
</html>"#;

#[test]
fn image_post_with_relative_time() {
    let result = analyzer().analyze_html(IMAGE_POST_PAGE);

    assert_eq!(result.post_count, 1);
    assert_eq!(result.profile_name, "Jane Doe");
    assert_eq!(result.method, AnalysisMethod::Scan);
    assert_eq!(result.posts[0].post_type, PostType::Image);
    assert_eq!(result.posts[0].time, "Text: 2 hours ago");
    assert!(result.debug.duplicates_skipped >= 1, "inner selectors overlap the card");
}

#[test]
fn activity_text_without_structure_falls_back() {
    let result = analyzer().analyze_html(ACTIVITY_TEXT_PAGE);

    assert!(result.post_count > 0);
    assert_eq!(result.method, AnalysisMethod::Fallback);
    assert_eq!(result.posts.len(), 1);
    assert_eq!(result.posts[0].post_type, PostType::FallbackDetection);
    assert_eq!(result.profile_name, "Jane Doe");
    let details = result.debug.fallback.expect("fallback details recorded");
    assert_eq!(details.time_matches, 3);
    assert!(details.contextual_matches >= 3);
}

#[test]
fn mixed_feed_keeps_only_recent_posts_in_document_order() {
    let result = analyzer().analyze_html(MIXED_FEED_PAGE);

    assert_eq!(result.profile_name, "Jordan Lee");
    assert_eq!(result.post_count, 2);
    assert_eq!(result.posts[0].post_type, PostType::Article);
    assert_eq!(result.posts[0].time, "2026-03-14T09:15:00Z");
    assert_eq!(result.posts[1].post_type, PostType::Poll);
    assert_eq!(result.posts[1].time, "Text: 45 minutes ago");
    assert!(result.debug.not_recent >= 1);
}

#[test]
fn repeated_analysis_is_idempotent() {
    let analyzer = analyzer();
    for page in [IMAGE_POST_PAGE, ACTIVITY_TEXT_PAGE, MIXED_FEED_PAGE] {
        let first = analyzer.analyze_html(page);
        let second = analyzer.analyze_html(page);
        assert_eq!(first.post_count, second.post_count);
        assert_eq!(first.profile_name, second.profile_name);
        assert_eq!(first.posts, second.posts);
    }
}

#[test]
fn login_wall_yields_unknown_and_none() {
    let html = "<html><head><title>LinkedIn Login</title></head><body><p>Sign in</p></body></html>";
    let result = analyzer().analyze_html(html);

    assert_eq!(result.profile_name, UNKNOWN_PROFILE_NAME);
    assert_eq!(result.post_count, 0);
    assert_eq!(result.method, AnalysisMethod::None);
    assert!(result.debug.emergency_used);
}

#[test]
fn profile_override_changes_post_selectors() {
    let profile: HeuristicsProfile =
        serde_yaml::from_str("selectors:\n  posts:\n    - \".stream span\"\n").unwrap();
    profile.validate().unwrap();
    let result = analyzer_with(profile).analyze_html(ACTIVITY_TEXT_PAGE);

    assert_eq!(result.method, AnalysisMethod::Scan);
    assert_eq!(result.post_count, 3);
    assert!(result.posts.iter().all(|p| p.post_type == PostType::Text));
}

#[test]
fn result_json_uses_public_field_names() {
    let result = analyzer().analyze_html(IMAGE_POST_PAGE);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["postCount"], 1);
    assert_eq!(json["profileName"], "Jane Doe");
    assert_eq!(json["posts"][0]["type"], "image");
    assert_eq!(json["method"], "scan");
    assert!(json["analyzedAt"].is_string());
}
