//! Exponential backoff retry for transient failures (§4.B): base 1s,
//! factor 2, cap 3 attempts. 4xx errors are non-retryable and propagate
//! immediately.

use std::fmt;
use std::time::Duration;

use tokio::time::sleep;

pub const BASE_DELAY_MS: u64 = 1000;
pub const BACKOFF_FACTOR: u64 = 2;
pub const MAX_ATTEMPTS: u32 = 3;

/// Whether a failure is worth retrying. Callers classify their own error
/// type (HTTP status, transport error) into this before calling `retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryable {
    Yes,
    No,
}

pub fn backoff_delay_ms(attempt: u32) -> u64 {
    BASE_DELAY_MS * BACKOFF_FACTOR.pow(attempt.saturating_sub(1))
}

/// Retries `op` up to [`MAX_ATTEMPTS`] times. `classify` decides, from the
/// error `op` returned, whether another attempt is warranted.
pub async fn retry<T, E, F, Fut, C>(mut op: F, classify: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: Fn(&E) -> Retryable,
    E: fmt::Debug,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= MAX_ATTEMPTS || classify(&err) == Retryable::No {
                    return Err(err);
                }
                let delay = backoff_delay_ms(attempt);
                tracing::warn!(attempt, delay_ms = delay, error = ?err, "retrying after transient failure");
                sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay_doubles_each_attempt() {
        assert_eq!(backoff_delay_ms(1), 1000);
        assert_eq!(backoff_delay_ms(2), 2000);
        assert_eq!(backoff_delay_ms(3), 4000);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("timeout") } else { Ok(42) } }
            },
            |_| Retryable::Yes,
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("400 bad request") }
            },
            |_| Retryable::No,
        )
        .await;
        assert_eq!(result, Err("400 bad request"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("timeout") }
            },
            |_| Retryable::Yes,
        )
        .await;
        assert_eq!(result, Err("timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
