//! Lock-contention retry for SQLite writes

use cadenza_common::{Error, Result};
use std::time::{Duration, Instant};

/// Default upper bound on total retry time for a single write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// Run `operation` again while SQLite reports lock contention
///
/// Pauses start at 10ms and double up to 1s; the last pause is cut short at
/// `max_wait_ms`. Any other error is returned as is.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(operation = operation_name, attempts, "Write went through after lock retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_contention() => err,
            Err(err) => return Err(err),
        };

        let now = Instant::now();
        if now >= deadline {
            tracing::error!(operation = operation_name, attempts, max_wait_ms, error = %err, "Giving up on locked database");
            return Err(Error::Internal(format!(
                "Database locked: {} gave up after {} attempts within {} ms",
                operation_name, attempts, max_wait_ms
            )));
        }

        let pause = backoff.min(deadline - now);
        tracing::warn!(
            operation = operation_name,
            attempts,
            pause_ms = pause.as_millis() as u64,
            "Database locked, backing off"
        );
        tokio::time::sleep(pause).await;
        backoff = (backoff * 2).min(Duration::from_millis(MAX_BACKOFF_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked() -> Error {
        Error::Database(sqlx::Error::Protocol("database is locked".to_string()))
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 5000, || async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_lock_errors() {
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(locked())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_wait() {
        let result = retry_on_lock("test_op", 30, || async { Err::<i32, Error>(locked()) }).await;

        match result {
            Err(Error::Internal(msg)) => assert!(msg.contains("Database locked")),
            other => panic!("expected Internal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_lock_error_fails_immediately() {
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            async move { Err::<i32, Error>(Error::Internal("other error".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
