/// Timeout wrapper turning a blocking function into a cancellable operation
use crate::context::CallContext;
use crate::error::GuardError;
use crate::operation::Operation;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Races a blocking function against the call context.
///
/// The function runs on tokio's blocking pool. If it finishes first its result is
/// returned; if the context is cancelled or its deadline passes first the context's
/// error is returned immediately.
///
/// The blocking function cannot be interrupted. After an early return it keeps
/// running to completion and its result is dropped. Such orphaned runs are counted
/// by [`in_flight`](Self::in_flight) until they finish, and the blocking pool's
/// thread limit caps how many can exist at once.
pub struct Timeout<F> {
    slow: Arc<F>,
    in_flight: Arc<AtomicUsize>,
}

impl<F> Timeout<F>
where
    F: Fn() -> Result<String, GuardError> + Send + Sync + 'static,
{
    pub fn new(slow: F) -> Self {
        Self {
            slow: Arc::new(slow),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Blocking runs started by this wrapper that have not finished yet,
    /// including ones whose caller already gave up
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Keeps the in-flight gauge accurate even if the blocking function panics
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<F> Operation for Timeout<F>
where
    F: Fn() -> Result<String, GuardError> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let (tx, rx) = oneshot::channel();
        let slow = Arc::clone(&self.slow);
        let guard = InFlightGuard::enter(&self.in_flight);

        tokio::task::spawn_blocking(move || {
            let result = {
                let _guard = guard;
                slow()
            };
            // The receiver is gone if the caller already returned
            let _ = tx.send(result);
        });

        tokio::select! {
            result = rx => result.unwrap_or_else(|_| Err(GuardError::Aborted)),
            err = ctx.done() => {
                debug!(error = %err, "timeout: returning early, blocking call left running");
                Err(err)
            }
        }
    }
}
