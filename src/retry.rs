use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 8_000,
        }
    }
}

/// Result of a call that is allowed to fail without failing its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, error: String },
}

impl<T> Outcome<T> {
    pub fn into_value(self) -> T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Errors that know whether another attempt can help.
pub trait Retryable: std::fmt::Display {
    fn is_transient(&self) -> bool;

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for crate::error::FetchError {
    fn is_transient(&self) -> bool {
        crate::error::FetchError::is_transient(self)
    }
}

impl Retryable for crate::error::ScoreError {
    fn is_transient(&self) -> bool {
        crate::error::ScoreError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        crate::error::ScoreError::retry_after(self)
    }
}

impl RetryPolicy {
    /// Delay slept after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(31) as i32);
        let millis = (self.base_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = err
                        .retry_after()
                        .map(|hint| hint.min(Duration::from_millis(self.max_delay_ms)))
                        .unwrap_or_else(|| self.delay_for(attempt));
                    tracing::warn!(
                        call = label,
                        attempt = attempt + 1,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Like [`RetryPolicy::run`], but exhaustion degrades to `fallback`.
    pub async fn run_or_degrade<T, E, F, Fut>(&self, label: &str, fallback: T, op: F) -> Outcome<T>
    where
        E: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.run(label, op).await {
            Ok(value) => Outcome::Ok(value),
            Err(err) => {
                tracing::warn!(call = label, error = %err, "giving up; degrading to fallback");
                Outcome::Degraded {
                    value: fallback,
                    error: err.to_string(),
                }
            }
        }
    }
}
