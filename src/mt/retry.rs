//! Exponential backoff around a single batch call

use crate::mt::error::MtResult;
use crate::mt::translator::{MachineTranslator, TranslationRequest};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often, and how patiently, a failed batch is sent again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Call the translator until it succeeds, a non-retryable error occurs, the
/// policy is exhausted or `cancel` fires
///
/// The last error is returned when giving up.
pub async fn translate_with_retry(
    translator: &dyn MachineTranslator,
    request: &TranslationRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> MtResult<Vec<String>> {
    let mut attempt = 0u32;
    loop {
        match translator.translate_batch(request).await {
            Ok(outputs) => return Ok(outputs),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    provider = translator.provider_name(),
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "translator call failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
