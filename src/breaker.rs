use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A simple failure-count circuit breaker shared by the cache layer and the
/// admission layer, each configured with its own threshold/reset window.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_secs: u64,
    consecutive_failures: AtomicU32,
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_secs: u64) -> Self {
        CircuitBreaker {
            failure_threshold,
            reset_secs,
            consecutive_failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
        }
    }

    /// Returns whether a call may proceed. Transitions `Open` -> `HalfOpen`
    /// once the reset window has elapsed, allowing exactly one probe call
    /// through (the caller's `record_success`/`record_failure` then decides
    /// whether the breaker closes or reopens).
    pub fn allow(&self) -> bool {
        match self.state() {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => false,
        }
    }

    pub fn state(&self) -> BreakerState {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        if opened_at == 0 {
            return BreakerState::Closed;
        }
        if now_secs().saturating_sub(opened_at) >= self.reset_secs {
            BreakerState::HalfOpen
        } else {
            BreakerState::Open
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.opened_at.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold {
            self.opened_at.store(now_secs(), Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_until_threshold_reached() {
        let breaker = CircuitBreaker::new(3, 60);
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, 60);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
