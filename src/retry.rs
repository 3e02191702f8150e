//! Retry policy and signature-based classification of provider errors.
//!
//! The provider does not reliably expose structured error codes, so errors are
//! classified by matching lower-cased substrings of their rendered text against
//! [`CLASSIFICATION_TABLE`]. The first matching row wins.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::StudioError;
use crate::gemini::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    InvalidCredential,
    Fatal,
}

/// Ordered `{substring -> class}` rules. Transient rows come first so that an
/// overload message mentioning e.g. "invalid" is still retried.
pub const CLASSIFICATION_TABLE: &[(&str, ErrorClass)] = &[
    ("503", ErrorClass::Transient),
    ("overloaded", ErrorClass::Transient),
    ("unavailable", ErrorClass::Transient),
    ("timeout", ErrorClass::Transient),
    ("timed out", ErrorClass::Transient),
    ("deadline", ErrorClass::Transient),
    ("resource_exhausted", ErrorClass::Transient),
    ("resource exhausted", ErrorClass::Transient),
    ("429", ErrorClass::Transient),
    ("empty response", ErrorClass::Transient),
    ("malformed response", ErrorClass::Transient),
    ("404", ErrorClass::InvalidCredential),
    ("not found", ErrorClass::InvalidCredential),
    ("401", ErrorClass::InvalidCredential),
    ("403", ErrorClass::InvalidCredential),
    ("api key", ErrorClass::InvalidCredential),
    ("api_key", ErrorClass::InvalidCredential),
    ("unauthenticated", ErrorClass::InvalidCredential),
    ("permission_denied", ErrorClass::InvalidCredential),
    ("permission denied", ErrorClass::InvalidCredential),
    ("invalid", ErrorClass::InvalidCredential),
];

pub fn classify(error: &impl std::fmt::Display) -> ErrorClass {
    let text = error.to_string().to_lowercase();
    CLASSIFICATION_TABLE
        .iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, class)| *class)
        .unwrap_or(ErrorClass::Fatal)
}

/// Bounded exponential back-off.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_jitter: Duration::from_millis(250),
        }
    }

    /// Same attempt budget with no waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO, max_jitter: Duration::ZERO }
    }

    /// Delay before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            base
        } else {
            base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        }
    }

    /// Runs `op` until it succeeds, a non-transient error occurs, or the attempt
    /// budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, cancel: &CancellationToken, mut op: F) -> Result<T, StudioError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(StudioError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let class = classify(&err);
            match class {
                ErrorClass::InvalidCredential => {
                    warn!(%label, attempt, "🔑 Credential rejected by provider: {}", err);
                    return Err(StudioError::InvalidCredential(err.to_string()));
                }
                ErrorClass::Fatal => {
                    warn!(%label, attempt, "❌ Unrecoverable provider error: {}", err);
                    return Err(StudioError::Fatal(err.to_string()));
                }
                ErrorClass::Transient if attempt >= max_attempts => {
                    warn!(%label, attempt, "❌ Retry budget spent: {}", err);
                    return Err(StudioError::RetriesExhausted { attempts: attempt, last: err.to_string() });
                }
                ErrorClass::Transient => {
                    let delay = self.delay_after(attempt);
                    info!(%label, attempt, delay_ms = delay.as_millis() as u64, "🔄 Transient provider error, retrying: {}", err);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(StudioError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
