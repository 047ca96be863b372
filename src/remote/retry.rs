//! Retry-with-backoff for transient remote failures (spec §4.5, §7):
//! exponential backoff with capped attempts on 429/5xx-class errors.
//! Grounded on the retry-wrapper shape used for remote-storage RPCs
//! elsewhere in the corpus (an operation closure plus a predicate that
//! distinguishes a permanent failure from one worth retrying), adapted here
//! as a hand-rolled loop driving the `backoff` crate's `next_backoff()`
//! directly rather than its `future::retry` entry point, since the
//! permanent/transient distinction is expressed through `EngineError`
//! variants and didn't map cleanly onto that helper's closure signature.

use crate::error::EngineError;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_ELAPSED: Duration = Duration::from_secs(30);
const INITIAL_INTERVAL: Duration = Duration::from_millis(200);

/// Run `op` under exponential backoff. `op` returns `Result<T, EngineError>`;
/// [`EngineError::RemoteTransient`] is retried, everything else is given up
/// on immediately. Backoff exhaustion promotes the last transient error to
/// [`EngineError::RemoteFatal`] (spec §7: "exhaustion promotes to
/// `RemoteFatal`").
pub async fn retry_remote_call<T, F, Fut>(
    description: &str,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_INTERVAL)
        .with_max_elapsed_time(Some(MAX_ELAPSED))
        .build();

    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(EngineError::RemoteTransient(msg)) => {
                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(%description, %msg, delay_ms = delay.as_millis() as u64, "retrying transient remote failure");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(%description, %msg, "backoff exhausted, promoting to fatal");
                        return Err(EngineError::RemoteFatal(msg));
                    }
                }
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry_remote_call("test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::RemoteTransient("not yet".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), EngineError> = retry_remote_call("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::RemoteFatal("nope".into())) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::RemoteFatal(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
