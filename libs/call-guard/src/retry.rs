/// Retry decorator with a fixed delay between attempts
use crate::context::CallContext;
use crate::error::GuardError;
use crate::operation::Operation;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Wait between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// Re-invokes the wrapped operation on failure, at most `max_retries` times.
///
/// Intermediate failures are logged, not returned. The last failure is returned once
/// retries are exhausted. The delay between attempts is cut short by cancellation,
/// in which case the context's error is returned instead.
pub struct Retry<O> {
    inner: O,
    config: RetryConfig,
}

impl<O: Operation> Retry<O> {
    pub fn new(inner: O, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<O: Operation> Operation for Retry<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        let mut attempt = 0;

        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let err = match self.inner.call(ctx).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt >= self.config.max_retries => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            warn!(
                error = %err,
                "Attempt {} failed; retrying in {:?}",
                attempt, self.config.delay
            );

            tokio::select! {
                _ = tokio::time::sleep(self.config.delay) => {}
                err = ctx.done() => return Err(err),
            }
        }
    }
}
