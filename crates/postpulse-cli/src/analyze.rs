//! `analyze` and `watch` handlers.
//!
//! Every analysis passes the persisted fixed-window limiter first; the
//! limiter state is written back before the page is touched so an
//! interrupted run still counts.

use std::time::Duration;

use chrono::Utc;
use postpulse_analyzer::{
    load_profile, Analyzer, AnalyzerSettings, FileSource, FixedWindowLimiter, HeuristicsProfile,
    HttpSource, SourceAnalysis,
};
use postpulse_core::{AnalysisMethod, AppConfig};
use postpulse_store::{AnalysisRecord, HistoryStore};

use crate::report::{render_summary, render_watch_line};
use crate::SourceArgs;

pub(crate) fn build_analyzer(config: &AppConfig) -> anyhow::Result<Analyzer> {
    let profile = match &config.profile_path {
        Some(path) => load_profile(path)?,
        None => HeuristicsProfile::default(),
    };
    Ok(Analyzer::new(AnalyzerSettings::from_app_config(config), profile))
}

async fn analyze_once(
    analyzer: &Analyzer,
    config: &AppConfig,
    source: &SourceArgs,
) -> anyhow::Result<(String, SourceAnalysis)> {
    if let Some(path) = &source.file {
        let file = FileSource::new(path);
        let analysis = analyzer.analyze_source(&file).await;
        return Ok((path.display().to_string(), analysis));
    }
    if let Some(url) = &source.url {
        let http = HttpSource::from_config(url.clone(), config)?;
        let analysis = analyzer.analyze_source(&http).await;
        return Ok((url.clone(), analysis));
    }
    anyhow::bail!("either --file or --url is required")
}

/// Loads the limiter, applies the configured limits, and either records
/// an attempt or reports how long to wait.
async fn acquire_slot(config: &AppConfig, store: &HistoryStore) -> anyhow::Result<Option<Duration>> {
    let file = store.load().await?;
    let mut limiter = file.rate_limit.unwrap_or_else(|| {
        FixedWindowLimiter::new(config.rate_limit_max_attempts, config.rate_limit_window_secs)
    });
    limiter.reconfigure(config.rate_limit_max_attempts, config.rate_limit_window_secs);

    let now = Utc::now();
    if let Some(wait) = limiter.retry_after(now) {
        let wait = wait.to_std().unwrap_or(Duration::ZERO);
        tracing::warn!(
            wait_secs = wait.as_secs(),
            max_attempts = limiter.max_attempts(),
            "analysis rate limit reached"
        );
        return Ok(Some(wait));
    }

    limiter.record_attempt(now);
    store.save_rate_limit(&limiter).await?;
    Ok(None)
}

pub(crate) async fn run_analyze(
    config: &AppConfig,
    store: &HistoryStore,
    source: &SourceArgs,
    json: bool,
    no_save: bool,
) -> anyhow::Result<()> {
    if let Some(wait) = acquire_slot(config, store).await? {
        anyhow::bail!(
            "rate limit reached; try again in {}s",
            wait.as_secs().max(1)
        );
    }

    let analyzer = build_analyzer(config)?;
    let (label, analysis) = analyze_once(&analyzer, config, source).await?;
    let result = analysis.result.clone();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_summary(&result, config.window_hours));
    }

    if no_save {
        tracing::debug!("--no-save given; result not recorded");
    } else {
        store
            .record(AnalysisRecord::new(
                label,
                analysis.document_sha256,
                analysis.result,
            ))
            .await?;
    }

    if result.method == AnalysisMethod::Error {
        anyhow::bail!(
            "analysis failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub(crate) async fn run_watch(
    config: &AppConfig,
    store: &HistoryStore,
    source: &SourceArgs,
    interval_secs: u64,
    iterations: Option<u32>,
) -> anyhow::Result<()> {
    let analyzer = build_analyzer(config)?;
    let interval = Duration::from_secs(interval_secs);
    let mut completed: u32 = 0;

    tracing::info!(interval_secs, ?iterations, "watch started");

    while iterations.is_none_or(|limit| completed < limit) {
        if let Some(wait) = acquire_slot(config, store).await? {
            tokio::time::sleep(wait.max(Duration::from_secs(1))).await;
            continue;
        }

        let (label, analysis) = analyze_once(&analyzer, config, source).await?;
        println!("{}", render_watch_line(&analysis.result));
        if let Err(e) = store
            .record(AnalysisRecord::new(
                label,
                analysis.document_sha256,
                analysis.result,
            ))
            .await
        {
            tracing::warn!(error = %e, "failed to record watch result");
        }

        completed += 1;
        if iterations.is_none_or(|limit| completed < limit) {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::info!(completed, "watch finished");
    Ok(())
}
