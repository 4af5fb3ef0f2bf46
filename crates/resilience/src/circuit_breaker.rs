use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreakerConfig {
    /// consecutive failures within `monitor_window` before opening.
    pub fail_threshold: u32,
    pub monitor_window: Duration,
    pub reset_timeout: Duration,
    /// successes needed in half-open to close again.
    pub trial_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_threshold: 5,
            monitor_window: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(60),
            trial_successes: 2,
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    first_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    half_open_successes: u32,
}

/// Circuit breaker used to guard the remote state store .
/// `closed` -> `open` after `N_fail` consecutive failures inside
/// `W_monitor`; `open` -> `halfOpen` after `T_reset`; `halfOpen` -> `closed`
/// after `N_trial` successes, or back to `open` on any failure.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                    state: BreakerState::Closed,
                    consecutive_failures: 0,
                    first_failure_at: None,
                    opened_at: None,
                    half_open_successes: 0,
            }),
        }
    }

    /// Returns true if a call is currently permitted (closed, or half-open
    /// after the reset timeout has elapsed). Transitions `open` -> `halfOpen`
    /// as a side effect when the timeout has elapsed.
    pub fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    tracing::info!("circuit breaker entering half-open trial");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
                inner.first_failure_at = None;
            }
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.trial_successes {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.first_failure_at = None;
                    tracing::info!("circuit breaker closed after successful trial");
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                self.trip(&mut inner);
            }
            BreakerState::Closed => {
                let now = Instant::now();
                let window_start = *inner.first_failure_at.get_or_insert(now);
                if now.duration_since(window_start) > self.config.monitor_window {
                    // window expired, restart counting from this failure
                    inner.first_failure_at = Some(now);
                    inner.consecutive_failures = 1;
                } else {
                    inner.consecutive_failures += 1;
                }
                if inner.consecutive_failures >= self.config.fail_threshold {
                    self.trip(&mut inner);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_failures = 0;
        inner.first_failure_at = None;
        tracing::warn!("circuit breaker open");
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, BreakerState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
                fail_threshold: 3,
                ..Default::default()
        });
        assert!(cb.allow_call());
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
        assert!(!cb.allow_call());
    }

    #[test]
    fn half_open_trial_closes_on_success() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
                fail_threshold: 1,
                reset_timeout: Duration::from_millis(0),
                trial_successes: 2,
                ..Default::default()
        });
        cb.record_failure();
        assert!(cb.is_open());
        // reset_timeout is zero, so allow_call immediately transitions to half-open
        assert!(cb.allow_call());
        cb.record_success();
        assert!(!cb.is_open());
        cb.record_success();
        assert!(!cb.is_open());
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
                fail_threshold: 1,
                reset_timeout: Duration::from_millis(0),
                ..Default::default()
        });
        cb.record_failure();
        assert!(cb.allow_call());
        cb.record_failure();
        assert!(cb.is_open());
    }
}
