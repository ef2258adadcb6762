/// Cancellable call context carried through every decorator
use crate::error::GuardError;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Cloning is cheap and clones observe the same cancellation. Use [`child`]
/// to derive a context that can be cancelled on its own without affecting
/// the parent.
///
/// [`child`]: CallContext::child
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context cancelled together with `self`. The child keeps the
    /// earlier of the two deadlines.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let deadline = match (self.deadline, timeout.map(|t| Instant::now() + t)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context currently reports, if it is done.
    pub fn err(&self) -> Option<GuardError> {
        if self.token.is_cancelled() {
            return Some(GuardError::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GuardError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> GuardError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => GuardError::Cancelled,
                _ = sleep_until(deadline) => GuardError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                GuardError::Cancelled
            }
        }
    }
}
