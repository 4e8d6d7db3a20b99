//! Bounded retry with jittered exponential backoff, shared by the
//! service clients. Only transient failures are retried.

use crate::error::{Result, ServiceError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

const BASE_DELAY_MS: u64 = 200;
const MAX_DELAY_MS: u64 = 5_000;

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(MAX_DELAY_MS);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped + jitter)
}

/// Run `operation` up to `1 + max_retries` times, sleeping with jittered
/// exponential backoff between attempts. Non-retryable errors return
/// immediately.
pub async fn with_retries<T, F, Fut>(name: &str, max_retries: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    operation = name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient service failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
