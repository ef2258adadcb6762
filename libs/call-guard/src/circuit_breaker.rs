/// Circuit breaker with consecutive-failure threshold and exponential backoff
///
/// Once `failure_threshold` consecutive calls have failed, calls are rejected with
/// `GuardError::Unavailable` until the backoff window since the last attempt has
/// elapsed. The window is `2 * 2^(consecutive_failures - failure_threshold)` seconds,
/// so every failed probe doubles it. A single success resets the failure count.
///
/// There is no explicit half-open state: the health check and the downstream call
/// are not atomic, so when a window elapses every caller that checks before the
/// first probe completes is let through. Under load several probes may run at once.
use crate::context::CallContext;
use crate::error::GuardError;
use crate::operation::Operation;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Base backoff once the threshold is reached; doubles with each further failure
const BASE_BACKOFF_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failure count at which calls start being rejected
    pub failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
        }
    }
}

/// Circuit breaker around an operation.
///
/// Backoff is measured from the last downstream attempt, and a fresh breaker has
/// none. The first call is therefore always admitted, even with
/// `failure_threshold = 0`; with a zero threshold every later call must wait out
/// the 2s base window since the previous attempt.
pub struct Breaker<O> {
    inner: O,
    config: BreakerConfig,
    state: RwLock<BreakerState>,
}

struct BreakerState {
    consecutive_failures: u32,
    /// None until the first downstream attempt completes
    last_attempt: Option<Instant>,
}

impl<O: Operation> Breaker<O> {
    pub fn new(inner: O, config: BreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: RwLock::new(BreakerState {
                consecutive_failures: 0,
                last_attempt: None,
            }),
        }
    }

    fn should_reject_call(&self) -> bool {
        match self.retry_at() {
            Some(retry_at) => Instant::now() <= retry_at,
            None => false,
        }
    }

    fn record_success(&self) {
        let mut state = self.state.write();

        if state.consecutive_failures >= self.config.failure_threshold
            && state.consecutive_failures > 0
        {
            info!(
                "Circuit breaker: probe succeeded after {} failures, closing",
                state.consecutive_failures
            );
        }

        state.last_attempt = Some(Instant::now());
        state.consecutive_failures = 0;
    }

    fn record_failure(&self) {
        let mut state = self.state.write();

        state.last_attempt = Some(Instant::now());
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if let Some(excess) = state
            .consecutive_failures
            .checked_sub(self.config.failure_threshold)
        {
            warn!(
                "Circuit breaker: open after {} consecutive failures, backing off {:?}",
                state.consecutive_failures,
                backoff_window(excess)
            );
        }
    }

    /// Current consecutive failure count (for monitoring)
    pub fn consecutive_failures(&self) -> u32 {
        self.state.read().consecutive_failures
    }

    /// Instant until which calls are rejected, if the threshold has been reached
    pub fn retry_at(&self) -> Option<Instant> {
        let state = self.state.read();

        let excess = state
            .consecutive_failures
            .checked_sub(self.config.failure_threshold)?;
        let last_attempt = state.last_attempt?;

        // An unrepresentable instant means the window never ends in practice
        Some(
            last_attempt
                .checked_add(backoff_window(excess))
                .unwrap_or_else(far_future),
        )
    }

    /// Whether a call made now would be rejected
    pub fn is_open(&self) -> bool {
        self.should_reject_call()
    }
}

#[async_trait]
impl<O: Operation> Operation for Breaker<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        if self.should_reject_call() {
            debug!("Circuit breaker: rejecting call while open");
            return Err(GuardError::Unavailable);
        }

        match self.inner.call(ctx).await {
            Ok(response) => {
                self.record_success();
                Ok(response)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

/// `2 * 2^excess` seconds, saturating
pub(crate) fn backoff_window(excess: u32) -> Duration {
    let secs = 1u64
        .checked_shl(excess)
        .and_then(|factor| factor.checked_mul(BASE_BACKOFF_SECS))
        .unwrap_or(u64::MAX);
    Duration::from_secs(secs)
}

fn far_future() -> Instant {
    // About thirty years, comfortably representable on every platform
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}
