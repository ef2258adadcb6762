/// Debounce decorators: coalesce a burst of calls into one downstream invocation
///
/// - [`DebounceFirst`] runs the first call of a burst and hands its result to the
///   rest of the burst.
/// - [`DebounceLast`] waits until the burst has gone quiet and then runs once, on a
///   background poller.
use crate::context::CallContext;
use crate::error::GuardError;
use crate::operation::Operation;
use crate::worker::{RestartPolicy, WorkerLatch, WorkerState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// First-wins debouncer.
///
/// Every call, whether it reached downstream or not, pushes the end of the window
/// to `now + window`. Calls made before the window ends get the cached result of the
/// call that opened it.
pub struct DebounceFirst<O> {
    inner: O,
    window: Duration,
    // Held across the downstream call so the rest of a burst waits for its result
    state: tokio::sync::Mutex<FirstState>,
}

struct FirstState {
    threshold: Option<Instant>,
    cached: Result<String, GuardError>,
}

impl<O: Operation> DebounceFirst<O> {
    pub fn new(inner: O, window: Duration) -> Self {
        Self {
            inner,
            window,
            state: tokio::sync::Mutex::new(FirstState {
                threshold: None,
                cached: Ok(String::new()),
            }),
        }
    }
}

#[async_trait]
impl<O: Operation> Operation for DebounceFirst<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let mut state = tokio::select! {
            guard = self.state.lock() => guard,
            err = ctx.done() => return Err(err),
        };

        let result = match state.threshold {
            Some(threshold) if Instant::now() < threshold => state.cached.clone(),
            _ => {
                let result = self.inner.call(ctx).await;
                state.cached = result.clone();
                result
            }
        };

        state.threshold = Some(Instant::now() + self.window);
        result
    }
}

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Quiet period that must follow the last call before downstream runs
    pub window: Duration,
    /// How often the background poller checks for quiescence. Firing happens at most
    /// one interval after the window has ended.
    pub poll_interval: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Last-wins debouncer.
///
/// Each call pushes the end of the window to `now + window` and returns whatever
/// result the poller stored last (an empty string before the first fire); it does
/// not wait for the deferred invocation. The first call of a burst spawns a poller
/// on the current tokio runtime. The poller checks every `poll_interval` and, once
/// the window has passed, invokes downstream with that first call's context,
/// stores the result and exits. The next burst spawns a fresh poller.
///
/// If the poller's context is cancelled before it fires, it stores the cancellation
/// error and exits without invoking downstream.
pub struct DebounceLast<O> {
    shared: Arc<LastShared<O>>,
}

struct LastShared<O> {
    inner: O,
    config: DebounceConfig,
    state: Mutex<LastState>,
}

struct LastState {
    threshold: Instant,
    result: Result<String, GuardError>,
    poller: WorkerLatch,
}

impl<O: Operation + 'static> DebounceLast<O> {
    pub fn new(inner: O, config: DebounceConfig) -> Self {
        Self {
            shared: Arc::new(LastShared {
                inner,
                config,
                state: Mutex::new(LastState {
                    threshold: Instant::now(),
                    result: Ok(String::new()),
                    poller: WorkerLatch::new("debounce-last", RestartPolicy::Rearm),
                }),
            }),
        }
    }

    pub fn poller_state(&self) -> WorkerState {
        self.shared.state.lock().poller.state()
    }

    /// Result stored by the most recent poller run
    pub fn last_result(&self) -> Result<String, GuardError> {
        self.shared.state.lock().result.clone()
    }
}

impl<O: Operation> LastShared<O> {
    /// Threshold that has been passed, or None while the burst is still active
    fn quiet_threshold(&self) -> Option<Instant> {
        let state = self.state.lock();
        (Instant::now() > state.threshold).then_some(state.threshold)
    }

    /// Store a fired result. Returns true if the poller should keep running
    /// because new calls arrived while downstream was in flight.
    fn store(&self, result: Result<String, GuardError>, fired_for: Instant) -> bool {
        let mut state = self.state.lock();
        state.result = result;

        if state.threshold > fired_for {
            return true;
        }

        state.poller.finish();
        false
    }

    fn abandon(&self, err: GuardError) {
        let mut state = self.state.lock();
        state.result = Err(err);
        state.poller.finish();
    }

    async fn poll(self: Arc<Self>, ctx: CallContext) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(fired_for) = self.quiet_threshold() else {
                        continue;
                    };

                    let result = self.inner.call(&ctx).await;
                    if !self.store(result, fired_for) {
                        return;
                    }
                    debug!("debounce-last: calls arrived while firing, polling again");
                }
                err = ctx.done() => {
                    debug!(error = %err, "debounce-last: context ended before firing");
                    self.abandon(err);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl<O: Operation + 'static> Operation for DebounceLast<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let mut state = self.shared.state.lock();
        state.threshold = Instant::now() + self.shared.config.window;

        if state.poller.try_start() {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(shared.poll(ctx.clone()));
        }

        state.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{operation_fn, MockOperation};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting() -> (Arc<AtomicU32>, impl Operation + 'static) {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let op = operation_fn(move |_ctx: CallContext| {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, GuardError>(format!("call-{n}")) }
        });
        (counter, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wins_within_window() {
        let (counter, op) = counting();
        let debounce = DebounceFirst::new(op, Duration::from_millis(100));
        let ctx = CallContext::new();

        for _ in 0..5 {
            assert_eq!(debounce.call(&ctx).await.unwrap(), "call-1");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(debounce.call(&ctx).await.unwrap(), "call-2");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wins_window_extends_on_every_call() {
        let (counter, op) = counting();
        let debounce = DebounceFirst::new(op, Duration::from_millis(100));
        let ctx = CallContext::new();

        // Each call lands inside the window opened by the previous one
        for _ in 0..10 {
            let _ = debounce.call(&ctx).await;
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wins_caches_errors() {
        let mut mock = MockOperation::new();
        mock.expect_call()
            .times(1)
            .returning(|_| Err(GuardError::msg("down")));

        let debounce = DebounceFirst::new(mock, Duration::from_millis(100));
        let ctx = CallContext::new();

        assert!(debounce.call(&ctx).await.is_err());
        assert!(matches!(
            debounce.call(&ctx).await,
            Err(GuardError::Downstream(_))
        ));
    }

    #[tokio::test]
    async fn test_first_wins_cancelled_context() {
        let debounce = DebounceFirst::new(MockOperation::new(), Duration::from_millis(100));
        let ctx = CallContext::new();
        ctx.cancel();

        assert!(matches!(debounce.call(&ctx).await, Err(GuardError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_wins_fires_once_after_quiescence() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = fired.clone();
        let op = operation_fn(move |_ctx: CallContext| {
            fired_clone.lock().push(Instant::now());
            async { Ok::<_, GuardError>("done".to_string()) }
        });

        let config = DebounceConfig {
            window: Duration::from_millis(50),
            poll_interval: Duration::from_millis(100),
        };
        let debounce = DebounceLast::new(op, config.clone());
        let ctx = CallContext::new();

        for _ in 0..20 {
            assert_eq!(debounce.call(&ctx).await.unwrap(), "");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let last_call = Instant::now() - Duration::from_millis(10);
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;

        let fired = fired.lock().clone();
        assert_eq!(fired.len(), 1);
        let latency = fired[0] - last_call;
        assert!(latency > config.window);
        assert!(latency <= config.window + config.poll_interval);

        assert_eq!(debounce.last_result().unwrap(), "done");
        assert_eq!(debounce.poller_state(), WorkerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_wins_rearms_for_next_burst() {
        let (counter, op) = counting();
        let debounce = DebounceLast::new(
            op,
            DebounceConfig {
                window: Duration::from_millis(20),
                poll_interval: Duration::from_millis(10),
            },
        );
        let ctx = CallContext::new();

        let _ = debounce.call(&ctx).await;
        assert_eq!(debounce.poller_state(), WorkerState::Running);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // The next call sees the first burst's result and starts a new poller
        assert_eq!(debounce.call(&ctx).await.unwrap(), "call-1");
        assert_eq!(debounce.poller_state(), WorkerState::Running);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(debounce.last_result().unwrap(), "call-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_wins_keeps_polling_for_calls_made_while_firing() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let slow = operation_fn(move |_ctx: CallContext| {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, GuardError>(format!("r{n}"))
            }
        });
        let debounce = DebounceLast::new(
            slow,
            DebounceConfig {
                window: Duration::from_millis(20),
                poll_interval: Duration::from_millis(10),
            },
        );
        let ctx = CallContext::new();

        let _ = debounce.call(&ctx).await;

        // First fire starts at 30ms and is still in flight here
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(debounce.call(&ctx).await.unwrap(), "");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(debounce.last_result().unwrap(), "r2");
        assert_eq!(debounce.poller_state(), WorkerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_wins_cancelled_before_firing() {
        let debounce = DebounceLast::new(
            MockOperation::new(),
            DebounceConfig {
                window: Duration::from_millis(200),
                poll_interval: Duration::from_millis(50),
            },
        );
        let ctx = CallContext::new();

        let _ = debounce.call(&ctx).await;
        ctx.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(debounce.poller_state(), WorkerState::Idle);
        assert!(matches!(debounce.last_result(), Err(GuardError::Cancelled)));

        // An already-cancelled context never reaches the poller
        assert!(matches!(debounce.call(&ctx).await, Err(GuardError::Cancelled)));
        assert_eq!(debounce.poller_state(), WorkerState::Idle);
    }
}
