/// Token-bucket throttle with reject-on-exhaustion policy
///
/// The bucket starts full. The first call spawns a refiller on the current tokio
/// runtime that adds `refill_amount` tokens every `refill_interval`, capped at
/// `max_tokens`. A call that finds the bucket empty fails with
/// `GuardError::TooManyCalls` straight away; nothing ever waits for a token.
///
/// The refiller runs under the context of the call that started it and stops for
/// good when that context is cancelled or its deadline passes. The instance never
/// starts another refiller, so once it has stopped the bucket drains and stays
/// empty. Create a throttle's first call with a long-lived context. The refiller
/// also exits on its next tick after the throttle is dropped.
use crate::context::CallContext;
use crate::error::GuardError;
use crate::operation::Operation;
use crate::worker::{RestartPolicy, WorkerLatch, WorkerState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Bucket capacity, also the initial token count
    pub max_tokens: u32,
    /// Tokens added per refill tick
    pub refill_amount: u32,
    pub refill_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            refill_amount: 10,
            refill_interval: Duration::from_secs(1),
        }
    }
}

pub struct Throttle<O> {
    inner: O,
    config: ThrottleConfig,
    bucket: Arc<Mutex<Bucket>>,
}

struct Bucket {
    tokens: u32,
    refiller: WorkerLatch,
}

impl Bucket {
    fn take(&mut self) -> bool {
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self, amount: u32, max: u32) {
        self.tokens = self.tokens.saturating_add(amount).min(max);
    }
}

impl<O: Operation> Throttle<O> {
    pub fn new(inner: O, config: ThrottleConfig) -> Self {
        Self {
            inner,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: config.max_tokens,
                refiller: WorkerLatch::new("throttle-refill", RestartPolicy::Never),
            })),
            config,
        }
    }

    pub fn available_tokens(&self) -> u32 {
        self.bucket.lock().tokens
    }

    pub fn refiller_state(&self) -> WorkerState {
        self.bucket.lock().refiller.state()
    }

    fn try_acquire(&self, ctx: &CallContext) -> bool {
        let mut bucket = self.bucket.lock();

        if bucket.refiller.try_start() {
            tokio::spawn(refill(
                Arc::downgrade(&self.bucket),
                self.config.clone(),
                ctx.clone(),
            ));
        }

        bucket.take()
    }
}

async fn refill(bucket: Weak<Mutex<Bucket>>, config: ThrottleConfig, ctx: CallContext) {
    let period = config.refill_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(bucket) = bucket.upgrade() else {
                    debug!("throttle dropped, refiller exiting");
                    return;
                };
                bucket.lock().refill(config.refill_amount, config.max_tokens);
            }
            err = ctx.done() => {
                debug!(error = %err, "throttle refiller stopped by its context");
                if let Some(bucket) = bucket.upgrade() {
                    bucket.lock().refiller.finish();
                }
                return;
            }
        }
    }
}

#[async_trait]
impl<O: Operation> Operation for Throttle<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        if !self.try_acquire(ctx) {
            debug!("throttle: no tokens left, rejecting call");
            return Err(GuardError::TooManyCalls);
        }

        self.inner.call(ctx).await
    }
}
