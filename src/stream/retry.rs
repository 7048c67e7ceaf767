//! Exponential-backoff retry ladder for transient downstream errors
//! (spec.md §4.7, §7 category 5).
//!
//! Not ambient infrastructure pulled from a crate: the retrieval pack has no
//! dedicated retry crate, and the policy itself is a handful of lines, so
//! this is a small hand-rolled loop over [`crate::config::RetryConfig`]
//! using `tokio::time::sleep`.

use std::{future::Future, time::Duration};

use crate::{config::RetryConfig, error::AppResult};

/// Run `operation` up to `config.max_retries` times (minimum one attempt),
/// sleeping with exponential backoff between failures. `operation` receives
/// the 1-indexed attempt number, for logging. Returns the last error once
/// attempts are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>
{
    let attempts = config.max_retries.max(1);
    let mut delay_ms = config.initial_delay_ms;
    let mut last_err = None;

    for attempt in 1..=attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < attempts {
                    tracing::warn!(attempt, max_attempts = attempts, error = %err, "transient failure, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = ((delay_ms as f64) * config.backoff_factor).min(config.max_delay_ms as f64) as u64;
                }
                last_err = Some(err);
            }
        }
    }

    Err(last_err.expect("loop body runs at least once, so last_err is always set on this path"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::persistence_transient_error;

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retrying_on_first_try() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_factor: 2.0
        };
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, masterror::AppError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_up_to_max_attempts_then_fails() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_factor: 2.0
        };
        let calls = AtomicU32::new(0);
        let result: AppResult<i32> = retry_with_backoff(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(persistence_transient_error("still down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_a_later_attempt() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_factor: 2.0
        };
        let result = retry_with_backoff(&config, |attempt| async move {
            if attempt < 3 {
                Err(persistence_transient_error("not yet"))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }
}
