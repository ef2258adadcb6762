/// The operation shape every decorator consumes and produces
use crate::circuit_breaker::{Breaker, BreakerConfig};
use crate::context::CallContext;
use crate::debounce::{DebounceConfig, DebounceFirst, DebounceLast};
use crate::error::GuardError;
use crate::retry::{Retry, RetryConfig};
use crate::throttle::{Throttle, ThrottleConfig};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A cancellable unit of remote work.
///
/// Decorators take an `Operation` and are themselves an `Operation`, so they nest
/// freely: `Retry::new(Breaker::new(op, ..), ..)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Operation: Send + Sync {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError>;
}

/// Type-erased operation, handy when the decorator stack is chosen at runtime.
pub type BoxOperation = Box<dyn Operation>;

#[async_trait]
impl<O: Operation + ?Sized> Operation for Arc<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        (**self).call(ctx).await
    }
}

#[async_trait]
impl<O: Operation + ?Sized> Operation for Box<O> {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        (**self).call(ctx).await
    }
}

#[async_trait]
impl<O: Operation + ?Sized> Operation for &O {
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        (**self).call(ctx).await
    }
}

/// Operation backed by an async closure. Created with [`operation_fn`].
#[derive(Clone)]
pub struct FnOperation<F> {
    f: F,
}

/// Turn an async closure into an [`Operation`].
///
/// ```rust,no_run
/// use call_guard::{operation_fn, CallContext, GuardError, Operation};
///
/// # async fn run() {
/// let op = operation_fn(|_ctx: CallContext| async {
///     Ok::<_, GuardError>("pong".to_string())
/// });
/// let reply = op.call(&CallContext::new()).await;
/// # }
/// ```
pub fn operation_fn<F, Fut>(f: F) -> FnOperation<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, GuardError>> + Send + 'static,
{
    FnOperation { f }
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, GuardError>> + Send + 'static,
{
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        (self.f)(ctx.clone()).await
    }
}

/// Builder-style wrapping, e.g. `op.breaker(cfg).retry(cfg).boxed()`.
pub trait OperationExt: Operation + Sized {
    fn breaker(self, config: BreakerConfig) -> Breaker<Self> {
        Breaker::new(self, config)
    }

    fn debounce_first(self, window: Duration) -> DebounceFirst<Self> {
        DebounceFirst::new(self, window)
    }

    fn debounce_last(self, config: DebounceConfig) -> DebounceLast<Self>
    where
        Self: 'static,
    {
        DebounceLast::new(self, config)
    }

    fn retry(self, config: RetryConfig) -> Retry<Self> {
        Retry::new(self, config)
    }

    fn throttle(self, config: ThrottleConfig) -> Throttle<Self> {
        Throttle::new(self, config)
    }

    fn boxed(self) -> BoxOperation
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<O: Operation> OperationExt for O {}
