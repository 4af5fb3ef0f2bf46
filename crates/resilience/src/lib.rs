pub mod circuit_breaker;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use retry::{backoff_delay, retry_with_backoff};
pub use timeout::with_timeout;
