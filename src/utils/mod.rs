// Utility functions

pub mod circuit_breaker;
pub mod logger;
pub mod retry;
pub mod text;

pub use circuit_breaker::{BreakerError, BreakerState, BreakerStats, CircuitBreaker};
pub use logger::init_tracing;
pub use retry::{with_retry, RetryPolicy, Retryable};
