//! Deadlock retry combinator (§5, §9 "session-scoped writes with
//! retries"): a pure retry loop around a fallible unit of work, no
//! global state beyond the connection the caller already holds.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// True when a Postgres error is a serialisation/deadlock failure
/// worth retrying (SQLSTATE `40001` serialization_failure, `40P01`
/// deadlock_detected).
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(db_err.code().as_deref(), Some("40001" | "40P01")),
        _ => false,
    }
}

/// Run `op` up to `max_attempts` times, retrying only on deadlock/
/// serialization failures with exponential backoff and jitter
/// (100ms × 2^attempt, ± uniform jitter, §5). Returns the last error
/// once the budget is exhausted.
pub async fn with_deadlock_retry<T, F, Fut>(
    max_attempts: u32,
    mut op: F,
) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && attempt + 1 < max_attempts => {
                let backoff = backoff_for_attempt(attempt);
                tracing::warn!(attempt, ?backoff, "retrying after deadlock/serialization failure");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let base_ms = 100u64.saturating_mul(1u64 << attempt.min(16));
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2);
    let signed_jitter = if rand::thread_rng().gen_bool(0.5) {
        base_ms.saturating_add(jitter_ms)
    } else {
        base_ms.saturating_sub(jitter_ms)
    };
    Duration::from_millis(signed_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn deadlock_error() -> sqlx::Error {
        // sqlx has no public constructor for DatabaseError, so the
        // retryability test below exercises `with_deadlock_retry`
        // against a non-database error path and the attempt counter
        // directly, rather than trying to fabricate one.
        sqlx::Error::RowNotFound
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_op_succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, sqlx::Error> = with_deadlock_retry(3, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, sqlx::Error> = with_deadlock_retry(3, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(deadlock_error())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_exponentially_around_the_base() {
        let b0 = backoff_for_attempt(0).as_millis();
        let b1 = backoff_for_attempt(1).as_millis();
        let b2 = backoff_for_attempt(2).as_millis();
        assert!(b0 >= 50 && b0 <= 150, "attempt 0 backoff was {b0}");
        assert!(b1 >= 100 && b1 <= 300, "attempt 1 backoff was {b1}");
        assert!(b2 >= 200 && b2 <= 600, "attempt 2 backoff was {b2}");
    }
}
