//! Circuit Breaker
//!
//! Shields the chat domain from a flaky upstream dependency. One instance
//! guards the follow-check call used during room creation.
//!
//! State machine: CLOSED counts failures and trips to OPEN at the threshold;
//! OPEN short-circuits until the cooldown elapses, then hands out exactly one
//! HALF_OPEN probe; the probe's outcome either closes the circuit or re-opens
//! it immediately.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::infrastructure::metrics;

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Cooldown before an open circuit admits a probe
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker over one upstream dependency.
pub struct CircuitBreaker {
    name: &'static str,
    inner: Mutex<BreakerInner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: &'static str) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            config,
        }
    }

    /// May the caller contact the dependency right now?
    ///
    /// While OPEN this returns `false` without touching the dependency; once
    /// the cooldown has elapsed it grants exactly one HALF_OPEN probe. Callers
    /// that receive `true` must report the outcome via [`Self::record_success`]
    /// or [`Self::record_failure`].
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.config.open_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    metrics::set_circuit_breaker_state(self.name, inner.state.as_str());
                    tracing::info!(breaker = self.name, "Circuit half-open, probing dependency");
                    true
                } else {
                    false
                }
            }
            // a probe is already in flight
            CircuitState::HalfOpen => false,
        }
    }

    /// Report a successful dependency call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(breaker = self.name, "Circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        metrics::set_circuit_breaker_state(self.name, inner.state.as_str());
    }

    /// Report a failed dependency call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let tripped = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if tripped {
            inner.state = CircuitState::Open;
            tracing::warn!(
                breaker = self.name,
                failures = inner.failure_count,
                "Circuit opened"
            );
        }
        metrics::set_circuit_breaker_state(self.name, inner.state.as_str());
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker() -> CircuitBreaker {
        CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 5,
                open_timeout: Duration::from_millis(50),
            },
        )
    }

    #[test]
    fn five_consecutive_failures_open_the_circuit() {
        let breaker = fast_breaker();
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn open_circuit_short_circuits_calls() {
        let breaker = fast_breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(!breaker.can_execute());
        assert!(!breaker.can_execute());
    }

    #[test]
    fn cooldown_grants_exactly_one_probe() {
        let breaker = fast_breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }

        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.can_execute(), "first call after cooldown probes");
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.can_execute(), "second call waits on the probe");
    }

    #[test]
    fn probe_success_closes_and_resets() {
        let breaker = fast_breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.can_execute());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn probe_failure_reopens_immediately() {
        let breaker = fast_breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn success_while_closed_clears_partial_failures() {
        let breaker = fast_breaker();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
