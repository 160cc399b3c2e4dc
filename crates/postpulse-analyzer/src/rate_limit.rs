//! Rate limiting and retry utilities for snapshot acquisition.
//!
//! [`FixedWindowLimiter`] gates how often analyses may start; it is plain
//! data so callers can persist it between runs. [`retry_with_backoff`]
//! retries transient HTTP failures with exponential backoff.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// At most `max_attempts` attempts per `window_secs` window. A window starts
/// at the first attempt after the previous one elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedWindowLimiter {
    max_attempts: u32,
    window_secs: u64,
    #[serde(default)]
    window_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    attempts: u32,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
            window_started_at: None,
            attempts: 0,
        }
    }

    /// Applies new limits while keeping the current window's count.
    pub fn reconfigure(&mut self, max_attempts: u32, window_secs: u64) {
        self.max_attempts = max_attempts;
        self.window_secs = window_secs;
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts counted in the window that is current at `now`.
    #[must_use]
    pub fn attempts_in_window(&self, now: DateTime<Utc>) -> u32 {
        match self.active_window_end(now) {
            Some(_) => self.attempts,
            None => 0,
        }
    }

    #[must_use]
    pub fn can_proceed(&self, now: DateTime<Utc>) -> bool {
        self.attempts_in_window(now) < self.max_attempts
    }

    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        if self.active_window_end(now).is_none() {
            self.window_started_at = Some(now);
            self.attempts = 0;
        }
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Time until the next attempt is allowed; `None` if allowed now.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if self.can_proceed(now) {
            return None;
        }
        self.active_window_end(now).map(|end| end - now)
    }

    /// End of the window containing `now`, if one is open.
    fn active_window_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let started = self.window_started_at?;
        let length = TimeDelta::try_seconds(i64::try_from(self.window_secs).ok()?)?;
        let end = started.checked_add_signed(length)?;
        (now < end).then_some(end)
    }
}

/// Returns `true` if `err` is transient and worth another attempt.
///
/// Retriable: [`AnalyzerError::RateLimited`] (HTTP 429) and
/// [`AnalyzerError::Http`] (connection reset, timeout). Everything else is
/// returned immediately.
fn is_retriable(err: &AnalyzerError) -> bool {
    matches!(
        err,
        AnalyzerError::RateLimited { .. } | AnalyzerError::Http(_)
    )
}

/// Runs `operation`, retrying transient errors up to `max_retries` extra
/// times with a `backoff_base_secs * 2^attempt` second sleep between tries.
/// A 429 that names a longer `Retry-After` waits that long instead.
///
/// With `max_retries = 3` the operation runs at most 4 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalyzerError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable(&err) || attempt >= max_retries => return Err(err),
            Err(err) => err,
        };

        let mut delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        if let AnalyzerError::RateLimited {
            retry_after_secs, ..
        } = &err
        {
            delay_secs = delay_secs.max(*retry_after_secs);
        }
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn rate_limited(retry_after_secs: u64) -> AnalyzerError {
        AnalyzerError::RateLimited {
            url: "https://www.example.com/in/jane".to_owned(),
            retry_after_secs,
        }
    }

    // --- FixedWindowLimiter ---

    #[test]
    fn fresh_limiter_allows() {
        let limiter = FixedWindowLimiter::new(2, 60);
        assert!(limiter.can_proceed(at(0)));
        assert!(limiter.retry_after(at(0)).is_none());
    }

    #[test]
    fn blocks_once_window_is_full() {
        let mut limiter = FixedWindowLimiter::new(2, 60);
        limiter.record_attempt(at(0));
        assert!(limiter.can_proceed(at(1)));
        limiter.record_attempt(at(1));
        assert!(!limiter.can_proceed(at(2)));
        assert_eq!(limiter.retry_after(at(20)), Some(TimeDelta::seconds(40)));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let mut limiter = FixedWindowLimiter::new(1, 60);
        limiter.record_attempt(at(0));
        assert!(!limiter.can_proceed(at(59)));
        assert!(limiter.can_proceed(at(60)));
        limiter.record_attempt(at(61));
        assert_eq!(limiter.attempts_in_window(at(62)), 1);
        assert!(!limiter.can_proceed(at(62)));
    }

    #[test]
    fn zero_window_never_blocks() {
        let mut limiter = FixedWindowLimiter::new(1, 0);
        limiter.record_attempt(at(0));
        assert!(limiter.can_proceed(at(0)));
    }

    #[test]
    fn reconfigure_keeps_count() {
        let mut limiter = FixedWindowLimiter::new(1, 60);
        limiter.record_attempt(at(0));
        limiter.reconfigure(3, 60);
        assert!(limiter.can_proceed(at(1)));
        assert_eq!(limiter.max_attempts(), 3);
    }

    #[test]
    fn limiter_round_trips_through_json() {
        let mut limiter = FixedWindowLimiter::new(5, 30);
        limiter.record_attempt(at(0));
        let json = serde_json::to_value(&limiter).unwrap();
        assert_eq!(json["maxAttempts"], 5);
        assert_eq!(json["attempts"], 1);
        let back: FixedWindowLimiter = serde_json::from_value(json).unwrap();
        assert_eq!(back, limiter);
    }

    // --- retry_with_backoff ---

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, AnalyzerError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_rate_limited_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(rate_limited(0))
                } else {
                    Ok::<u32, AnalyzerError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AnalyzerError>(rate_limited(0))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(AnalyzerError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_unexpected_status() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AnalyzerError>(AnalyzerError::UnexpectedStatus {
                    status: 404,
                    url: "https://www.example.com/in/missing".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(AnalyzerError::UnexpectedStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_oversized_document() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, AnalyzerError>(AnalyzerError::DocumentTooLarge { size: 11, limit: 10 })
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AnalyzerError::DocumentTooLarge { .. })));
    }
}
