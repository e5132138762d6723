//! Retry of transient provider failures with exponential backoff

use crate::config::RetryConfig;
use crate::error::EngineError;
use rand::Rng;
use scorecard_domain::{Completion, CompletionParams, Message, ModelProvider, ProviderFailure};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay before retry number `retry` (0-based): `base * 2^retry`, capped, optionally jittered
pub fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    let millis = config.base_delay_ms.saturating_mul(factor).min(config.max_delay_ms);

    if config.jitter && millis > 1 {
        Duration::from_millis(rand::thread_rng().gen_range(millis / 2..=millis))
    } else {
        Duration::from_millis(millis)
    }
}

/// Issue one completion, retrying transient failures
///
/// Blocks the calling thread while backing off; run it on a worker thread.
/// Non-transient failures are returned immediately.
pub fn call_with_retry<P>(
    provider: &P,
    conversation: &[Message],
    params: &CompletionParams,
    config: &RetryConfig,
) -> Result<Completion, EngineError>
where
    P: ModelProvider + ?Sized,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match provider.complete(conversation, params) {
            Ok(completion) => return Ok(completion),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt - 1);
                warn!(
                    "Transient provider failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt, max_attempts, delay, e
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(EngineError::TransientProvider {
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
            Err(e) => {
                debug!("Non-transient provider failure: {}", e);
                return Err(EngineError::Provider(e.to_string()));
            }
        }
    }
}
