//! Timeout enforcement for upstream calls.
//!
//! A timed-out call is reported as a failure like any other; callers that
//! only care about "did it work" match on [`CallError`] as a whole.

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Why a bounded call produced no value.
#[derive(Debug)]
pub enum CallError<E> {
    /// The call completed with an error.
    Failed(E),
    /// The call did not complete within the limit and was dropped.
    TimedOut(Duration),
}

impl<E> CallError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::TimedOut(_))
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Failed(e) => write!(f, "{}", e),
            CallError::TimedOut(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
        }
    }
}

/// Run `call` with a deadline.
pub async fn call_with_timeout<T, E, Fut>(limit: Duration, call: Fut) -> Result<T, CallError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(_) => Err(CallError::TimedOut(limit)),
    }
}
