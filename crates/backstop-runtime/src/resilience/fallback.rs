//! Timeout and fallback composition helpers.
//!
//! Neither helper retries. Combine with [`CircuitBreaker`](super::CircuitBreaker)
//! when retries are wanted.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Default primary-operation timeout for [`with_fallback`].
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of a timed operation.
#[derive(Error, Debug)]
pub enum TimeoutError<E> {
    #[error("{message} (timed out after {after:?})")]
    Elapsed { message: String, after: Duration },

    /// The operation finished in time but failed on its own
    #[error("{0}")]
    Operation(E),
}

impl<E> TimeoutError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed { .. })
    }
}

/// Value produced by [`with_fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome<T> {
    pub result: T,

    /// True when the primary failed or timed out
    pub used_fallback: bool,
}

/// Race `operation` against a timer.
///
/// On timeout the operation is dropped, which stops it at its next
/// await point; anything it spawned elsewhere is the caller's to clean up.
/// The operation's own error is passed through unchanged.
pub async fn with_timeout<T, E, Fut>(
    operation: Fut,
    timeout: Duration,
    message: impl Into<String>,
) -> Result<T, TimeoutError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TimeoutError::Operation(err)),
        Err(_) => Err(TimeoutError::Elapsed {
            message: message.into(),
            after: timeout,
        }),
    }
}

/// Run `primary` under a timeout, switching to `fallback` on any failure.
///
/// The fallback's own error is returned to the caller.
pub async fn with_fallback<T, PE, FE, P, PFut, F, FFut>(
    primary: P,
    fallback: F,
    timeout: Duration,
) -> Result<FallbackOutcome<T>, FE>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T, PE>>,
    PE: fmt::Display,
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<T, FE>>,
{
    match with_timeout(primary(), timeout, "Primary operation timed out").await {
        Ok(result) => Ok(FallbackOutcome {
            result,
            used_fallback: false,
        }),
        Err(err) => {
            tracing::debug!(error = %err, "Primary failed, running fallback");
            let result = fallback().await?;
            Ok(FallbackOutcome {
                result,
                used_fallback: true,
            })
        }
    }
}
