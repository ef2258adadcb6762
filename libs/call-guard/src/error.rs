/// Error type shared by every decorator in the stack
use std::sync::Arc;

/// Errors produced by a guarded call.
///
/// `Unavailable` and `TooManyCalls` are injected by decorators that short-circuit
/// before the downstream operation runs. `Cancelled` and `DeadlineExceeded` come
/// from the [`CallContext`](crate::CallContext). Anything the wrapped operation
/// itself returned travels through unchanged as `Downstream`.
///
/// The type is `Clone` because debouncers hand one cached result to many callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    /// Circuit breaker is open - the downstream operation was not attempted
    #[error("service unavailable: circuit breaker is open")]
    Unavailable,
    /// Token bucket is empty - the downstream operation was not attempted
    #[error("too many calls")]
    TooManyCalls,
    #[error("call cancelled")]
    Cancelled,
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    /// A blocking operation ended without handing back a result (it panicked)
    #[error("operation aborted before producing a result")]
    Aborted,
    #[error("downstream call failed: {0}")]
    Downstream(Arc<dyn std::error::Error + Send + Sync>),
}

impl GuardError {
    /// Wrap any error returned by the downstream operation.
    pub fn downstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Downstream(Arc::new(err))
    }

    /// Downstream failure described only by a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Downstream(Arc::new(Message(message.into())))
    }

    /// True for errors that originate from the call context.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True when a decorator refused the call without touching downstream.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Unavailable | Self::TooManyCalls)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);
