/// Preset configurations for common downstream dependency types
use crate::circuit_breaker::BreakerConfig;
use crate::operation::{BoxOperation, Operation, OperationExt};
use crate::retry::RetryConfig;
use crate::throttle::ThrottleConfig;
use std::time::Duration;

/// Configuration bundle for a downstream dependency
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub breaker: BreakerConfig,
    pub retry: Option<RetryConfig>,
    pub throttle: Option<ThrottleConfig>,
}

impl ServiceConfig {
    /// Compose `Throttle(Retry(Breaker(op)))`, skipping the layers left unset.
    ///
    /// The throttle sits outermost so that one admitted call may retry without
    /// spending extra tokens; the breaker sits innermost so each retry attempt
    /// is judged, and rejected fast, on its own.
    pub fn wrap<O: Operation + 'static>(&self, op: O) -> BoxOperation {
        let op = op.breaker(self.breaker.clone()).boxed();

        let op = match &self.retry {
            Some(retry) => op.retry(retry.clone()).boxed(),
            None => op,
        };

        match &self.throttle {
            Some(throttle) => op.throttle(throttle.clone()).boxed(),
            None => op,
        }
    }
}

/// gRPC service calls (internal microservices)
///
/// - Breaker: opens after 5 consecutive failures
/// - Retry: 3 attempts, 100ms apart
/// - Throttle: 100 calls per second
pub fn grpc_config() -> ServiceConfig {
    ServiceConfig {
        breaker: BreakerConfig {
            failure_threshold: 5,
        },
        retry: Some(RetryConfig {
            max_retries: 3,
            delay: Duration::from_millis(100),
        }),
        throttle: Some(ThrottleConfig {
            max_tokens: 100,
            refill_amount: 100,
            refill_interval: Duration::from_secs(1),
        }),
    }
}

/// Database queries (PostgreSQL, MySQL)
///
/// - Breaker: more tolerant, 10 consecutive failures
/// - No retry (avoid duplicate writes)
/// - No throttle, the connection pool already bounds concurrency
pub fn database_config() -> ServiceConfig {
    ServiceConfig {
        breaker: BreakerConfig {
            failure_threshold: 10,
        },
        retry: None,
        throttle: None,
    }
}

/// Cache lookups (Redis)
///
/// - Breaker: trips fast, 3 consecutive failures
/// - Retry: 2 attempts, 20ms apart
pub fn redis_config() -> ServiceConfig {
    ServiceConfig {
        breaker: BreakerConfig {
            failure_threshold: 3,
        },
        retry: Some(RetryConfig {
            max_retries: 2,
            delay: Duration::from_millis(20),
        }),
        throttle: None,
    }
}

/// Third-party HTTP APIs
///
/// - Breaker: opens after 5 consecutive failures
/// - Retry: 2 attempts, 1s apart
/// - Throttle: 10 calls per second, to stay under vendor rate limits
pub fn http_external_config() -> ServiceConfig {
    ServiceConfig {
        breaker: BreakerConfig {
            failure_threshold: 5,
        },
        retry: Some(RetryConfig {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }),
        throttle: Some(ThrottleConfig {
            max_tokens: 10,
            refill_amount: 10,
            refill_interval: Duration::from_secs(1),
        }),
    }
}
