//! `last`, `history`, `clear`, and human-readable rendering.

use postpulse_core::{AnalysisMethod, AnalysisResult};
use postpulse_store::{AnalysisRecord, HistoryStore};

fn count_label(result: &AnalysisResult) -> String {
    match result.method {
        AnalysisMethod::Fallback | AnalysisMethod::Emergency => {
            format!("~{} (estimated, {})", result.post_count, result.method)
        }
        _ => result.post_count.to_string(),
    }
}

/// Multi-line summary printed by `analyze` and `last`.
pub(crate) fn render_summary(result: &AnalysisResult, window_hours: u32) -> String {
    let mut out = format!(
        "Profile:  {}\nPosts in the last {window_hours}h: {}\nAnalyzed: {}",
        result.profile_name,
        count_label(result),
        result.analyzed_at.to_rfc3339()
    );

    if let Some(error) = &result.error {
        out.push_str(&format!("\nError:    {error}"));
    }
    for (i, post) in result.posts.iter().enumerate() {
        out.push_str(&format!(
            "\n  {}. [{}] {} | {}",
            i + 1,
            post.post_type,
            post.time,
            post.text
        ));
    }
    if result.posts.len() < result.post_count && result.method == AnalysisMethod::Scan {
        out.push_str(&format!(
            "\n  ... and {} more",
            result.post_count - result.posts.len()
        ));
    }
    out
}

/// One line per iteration for `watch`.
pub(crate) fn render_watch_line(result: &AnalysisResult) -> String {
    format!(
        "{}  {}  posts={}  method={}",
        result.analyzed_at.to_rfc3339(),
        result.profile_name,
        count_label(result),
        result.method
    )
}

fn render_history_line(record: &AnalysisRecord) -> String {
    format!(
        "{}  {:<24}  {:>14}  {}",
        record.result.analyzed_at.format("%Y-%m-%d %H:%M:%S"),
        record.result.profile_name,
        count_label(&record.result),
        record.source
    )
}

pub(crate) async fn run_last(
    store: &HistoryStore,
    window_hours: u32,
    json: bool,
) -> anyhow::Result<()> {
    let file = store.load().await?;
    let Some(last) = file.last else {
        println!("No analyses recorded yet.");
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&last)?);
    } else {
        println!("Source:   {}", last.source);
        println!("{}", render_summary(&last.result, window_hours));
    }
    Ok(())
}

pub(crate) async fn run_history(store: &HistoryStore, limit: usize, json: bool) -> anyhow::Result<()> {
    let file = store.load().await?;
    let records: Vec<&AnalysisRecord> = file.history.iter().take(limit).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No analyses recorded yet.");
        return Ok(());
    }
    for record in records {
        println!("{}", render_history_line(record));
    }
    Ok(())
}

pub(crate) async fn run_clear(store: &HistoryStore) -> anyhow::Result<()> {
    store.clear().await?;
    println!("History cleared ({}).", store.path().display());
    Ok(())
}
