/*!
 * Retry classification and backoff.
 *
 * Every oracle attempt ends in one of three outcomes: success, a retryable
 * failure or a fatal one. Backoff delays are plain values computed from the
 * attempt number and a jitter sample, so the schedule is testable without
 * sleeping.
 */

use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::errors::{ProviderError, SyncError};

/// Result of a single attempt
#[derive(Debug, Clone)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Worth retrying after a backoff delay
    Retryable(SyncError),
    /// Retrying cannot help
    Fatal(SyncError),
}

impl<T> AttemptOutcome<T> {
    /// Classify a provider failure; timeouts count as rate limiting
    pub fn from_provider_error(error: ProviderError) -> Self {
        match error {
            ProviderError::RateLimitExceeded(message) => Self::Retryable(SyncError::RateLimit(message)),
            ProviderError::Timeout(ms) => Self::Retryable(SyncError::RateLimit(format!("request timed out after {} ms", ms))),
            other if other.is_retryable() => Self::Retryable(SyncError::Provider(other)),
            other => Self::Fatal(SyncError::Provider(other)),
        }
    }
}

/// Exponential backoff with proportional jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    /// Maximum relative deviation, 0.2 means plus or minus 20%
    pub jitter_ratio: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl BackoffPolicy {
    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self {
            base_ms: common.retry_backoff_ms,
            max_ms: common.max_backoff_ms,
            jitter_ratio: common.jitter_ratio,
            max_retries: common.retry_count,
        }
    }

    /// Policy without waiting, for tests and dry runs
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            base_ms: 0,
            max_ms: 0,
            jitter_ratio: 0.0,
            max_retries,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `sample` is a uniform value in `[0, 1)`; 0.5 yields the undisturbed delay.
    pub fn delay(&self, retry: u32, sample: f64) -> Duration {
        let exponent = retry.saturating_sub(1).min(32);
        let nominal = self.base_ms.saturating_mul(1u64 << exponent).min(self.max_ms);
        let jitter = 1.0 + self.jitter_ratio * (2.0 * sample.clamp(0.0, 1.0) - 1.0);
        let jittered = (nominal as f64 * jitter).round().max(0.0) as u64;
        Duration::from_millis(jittered.min(self.max_ms.max(nominal)))
    }

    /// Delay with a random jitter sample
    pub fn random_delay(&self, retry: u32) -> Duration {
        self.delay(retry, rand::random::<f64>())
    }

    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }
}
