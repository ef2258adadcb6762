/// Tower integration for composable decorator stacks
///
/// Each decorator has a `tower_layer::Layer`, so a stack can be declared with
/// `tower::ServiceBuilder` instead of nesting constructors by hand:
///
/// ```rust,no_run
/// use call_guard::layer::{BreakerLayer, RetryLayer};
/// use call_guard::{operation_fn, BreakerConfig, CallContext, GuardError, Operation, RetryConfig};
/// use tower::ServiceBuilder;
///
/// # async fn run() {
/// let op = ServiceBuilder::new()
///     .layer(RetryLayer::new(RetryConfig::default()))
///     .layer(BreakerLayer::new(BreakerConfig::default()))
///     .service(operation_fn(|_ctx: CallContext| async {
///         Ok::<_, GuardError>("pong".to_string())
///     }));
///
/// let reply = op.call(&CallContext::new()).await;
/// # }
/// ```
///
/// [`OperationService`] and [`ServiceOperation`] bridge between operations and
/// `tower::Service<CallContext>` in both directions.
use crate::circuit_breaker::{Breaker, BreakerConfig};
use crate::context::CallContext;
use crate::debounce::{DebounceConfig, DebounceFirst, DebounceLast};
use crate::error::GuardError;
use crate::operation::Operation;
use crate::retry::{Retry, RetryConfig};
use crate::throttle::{Throttle, ThrottleConfig};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Service, ServiceExt};
use tower_layer::Layer;

// Declares a `Layer` that wraps its inner operation in one decorator,
// built from a cloned config
macro_rules! decorator_layer {
    ($(#[$meta:meta])* $layer:ident => $decorator:ident($config:ty) $(+ $bound:lifetime)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $layer {
            config: $config,
        }

        impl $layer {
            pub fn new(config: $config) -> Self {
                Self { config }
            }
        }

        impl<O: Operation $(+ $bound)?> Layer<O> for $layer {
            type Service = $decorator<O>;

            fn layer(&self, inner: O) -> Self::Service {
                $decorator::new(inner, self.config.clone())
            }
        }
    };
}

decorator_layer!(
    /// Circuit Breaker Layer
    BreakerLayer => Breaker(BreakerConfig)
);
decorator_layer!(RetryLayer => Retry(RetryConfig));
decorator_layer!(
    /// Each wrapped operation gets its own token bucket
    ThrottleLayer => Throttle(ThrottleConfig)
);
decorator_layer!(
    /// Configured with the debounce window
    DebounceFirstLayer => DebounceFirst(Duration)
);
decorator_layer!(DebounceLastLayer => DebounceLast(DebounceConfig) + 'static);

/// Exposes an operation as a `tower::Service<CallContext>`.
pub struct OperationService<O> {
    inner: Arc<O>,
}

impl<O> OperationService<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<O> Clone for OperationService<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: Operation + 'static> Service<CallContext> for OperationService<O> {
    type Response = String;
    type Error = GuardError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Decorators reject instead of applying backpressure
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: CallContext) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.call(&ctx).await })
    }
}

/// Wraps a `tower::Service<CallContext>` so decorators can be stacked around it.
///
/// The service is cloned per call, the usual tower pattern for shared services.
#[derive(Clone)]
pub struct ServiceOperation<S> {
    inner: S,
}

impl<S> ServiceOperation<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> Operation for ServiceOperation<S>
where
    S: Service<CallContext, Response = String, Error = GuardError> + Clone + Send + Sync,
    S::Future: Send,
{
    async fn call(&self, ctx: &CallContext) -> Result<String, GuardError> {
        self.inner.clone().oneshot(ctx.clone()).await
    }
}
