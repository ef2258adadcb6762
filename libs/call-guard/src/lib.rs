//! Composable fault-tolerance decorators for remote calls
//!
//! Every decorator wraps an [`Operation`] and is itself an `Operation`, so they
//! stack in any order:
//! - **Circuit Breaker**: fails fast once consecutive failures reach a threshold,
//!   probing again after an exponentially growing backoff window
//! - **Debounce**: coalesces bursts of calls, keeping the first ([`DebounceFirst`])
//!   or the last ([`DebounceLast`]) call of each burst
//! - **Retry**: re-attempts failed calls a bounded number of times with a fixed delay
//! - **Throttle**: token-bucket rate limiting that rejects when the bucket is empty
//! - **Timeout**: makes a blocking function cancellable by racing it against the
//!   call context's deadline
//! - **Tower Layer**: `tower_layer::Layer` impls for building stacks with
//!   `tower::ServiceBuilder`
//! - **Preset Configurations**: pre-tuned bundles for gRPC, database, Redis and
//!   external HTTP dependencies
//!
//! # Example: retrying a circuit-broken call
//!
//! ```rust,no_run
//! use call_guard::{operation_fn, BreakerConfig, CallContext, GuardError, Operation, OperationExt, RetryConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let op = operation_fn(|_ctx: CallContext| async {
//!         // Your remote call here
//!         Ok::<_, GuardError>("response".to_string())
//!     })
//!     .breaker(BreakerConfig { failure_threshold: 3 })
//!     .retry(RetryConfig { max_retries: 3, delay: Duration::from_millis(100) });
//!
//!     let ctx = CallContext::with_timeout(Duration::from_secs(5));
//!     let result = op.call(&ctx).await;
//! }
//! ```
//!
//! # Example: bounding a blocking call
//!
//! ```rust,no_run
//! use call_guard::{CallContext, Operation, Timeout};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let op = Timeout::new(|| {
//!         std::thread::sleep(Duration::from_secs(2));
//!         Ok("slow answer".to_string())
//!     });
//!
//!     // Returns DeadlineExceeded after 100ms; the blocking call finishes in the background
//!     let result = op.call(&CallContext::with_timeout(Duration::from_millis(100))).await;
//! }
//! ```

pub mod circuit_breaker;
pub mod context;
pub mod debounce;
pub mod error;
pub mod layer;
pub mod operation;
pub mod presets;
pub mod retry;
pub mod throttle;
pub mod timeout;
pub mod worker;

// Re-export main types for convenience
pub use circuit_breaker::{Breaker, BreakerConfig};
pub use context::CallContext;
pub use debounce::{DebounceConfig, DebounceFirst, DebounceLast};
pub use error::GuardError;
pub use operation::{operation_fn, BoxOperation, FnOperation, Operation, OperationExt};
pub use presets::{
    database_config, grpc_config, http_external_config, redis_config, ServiceConfig,
};
pub use retry::{Retry, RetryConfig};
pub use throttle::{Throttle, ThrottleConfig};
pub use timeout::Timeout;
pub use worker::{RestartPolicy, WorkerState};
