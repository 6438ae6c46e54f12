//! Circuit breaker guarding the external decision service.
//!
//! Two states and no half-open probing:
//!
//! - **Closed**: calls pass through. Each failure increments a counter; any
//!   success resets it to 0.
//! - **Open**: entered once `failure_threshold` consecutive failures have
//!   been recorded. Calls are refused without contacting the service.
//! - Open → Closed happens on the first call attempt after `cooldown` has
//!   elapsed since the last failure. That attempt resets the counter and
//!   goes through.
//!
//! State lives in two atomics (failure count, last-failure offset from the
//! breaker's creation instant), so concurrent runs never take a lock.
//! `*_at` variants take an explicit instant for deterministic tests.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Seconds after the last failure before an open breaker closes again.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are refused.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Point-in-time view of a breaker, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded.
    pub consecutive_failures: u32,
    /// Milliseconds since the last failure, if there has been one.
    pub last_failure_ago_ms: Option<u64>,
}

/// Lock-free failure-count circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    epoch: Instant,
    failures: AtomicU32,
    /// Millisecond offset of the last failure from `epoch`, plus one; 0 means none.
    last_failure: AtomicU64,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
            epoch: Instant::now(),
            failures: AtomicU32::new(0),
            last_failure: AtomicU64::new(0),
        }
    }

    /// Whether a call may proceed now.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Whether a call may proceed at `now`. Closes an open breaker whose
    /// cooldown has elapsed.
    pub fn allow_at(&self, now: Instant) -> bool {
        let failures = self.failures.load(Ordering::Acquire);
        if failures < self.threshold {
            return true;
        }
        if !self.cooldown_elapsed(now) {
            return false;
        }
        // Only the caller that wins the reset logs the transition.
        if self
            .failures
            .compare_exchange(failures, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!(
                cooldown_secs = self.cooldown.as_secs(),
                "decision service circuit breaker closed after cooldown"
            );
        }
        true
    }

    /// Record the outcome of a call made now.
    pub fn record_result(&self, success: bool) {
        self.record_result_at(success, Instant::now());
    }

    /// Record the outcome of a call that finished at `now`.
    pub fn record_result_at(&self, success: bool, now: Instant) {
        if success {
            self.failures.store(0, Ordering::Release);
            return;
        }
        self.last_failure
            .store(self.offset_ms(now).saturating_add(1), Ordering::Release);
        let previous = self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or(u32::MAX);
        let failures = previous.saturating_add(1);
        if failures == self.threshold {
            tracing::warn!(
                failures,
                cooldown_secs = self.cooldown.as_secs(),
                "decision service circuit breaker opened"
            );
            metrics::counter!("govpipe_breaker_open_total").increment(1);
        }
    }

    /// Current state at `now`, without side effects.
    pub fn state_at(&self, now: Instant) -> CircuitState {
        if self.failures.load(Ordering::Acquire) >= self.threshold && !self.cooldown_elapsed(now) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state_at(Instant::now())
    }

    /// Consecutive failures recorded.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Monitoring snapshot.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let last_failure_ago_ms = match self.last_failure.load(Ordering::Acquire) {
            0 => None,
            stamp => Some(self.offset_ms(now).saturating_sub(stamp - 1)),
        };
        BreakerSnapshot {
            state: self.state_at(now),
            consecutive_failures: self.consecutive_failures(),
            last_failure_ago_ms,
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_failure.load(Ordering::Acquire) {
            0 => true,
            stamp => {
                let since = self.offset_ms(now).saturating_sub(stamp - 1);
                u128::from(since) >= self.cooldown.as_millis()
            }
        }
    }

    fn offset_ms(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&BreakerConfig::default())
    }

    #[test]
    fn starts_closed() {
        let b = breaker();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow());
        assert_eq!(b.snapshot().last_failure_ago_ms, None);
    }

    #[test]
    fn four_failures_keep_it_closed() {
        let b = breaker();
        let t0 = Instant::now();
        for _ in 0..4 {
            b.record_result_at(false, t0);
        }
        assert!(b.allow_at(t0));
        assert_eq!(b.state_at(t0), CircuitState::Closed);
    }

    #[test]
    fn fifth_failure_opens_and_sixth_call_fails_fast() {
        let b = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(b.allow_at(t0));
            b.record_result_at(false, t0);
        }
        assert_eq!(b.state_at(t0), CircuitState::Open);
        assert!(!b.allow_at(t0 + Duration::from_secs(1)));
        assert!(!b.allow_at(t0 + Duration::from_millis(59_999)));
        assert_eq!(b.consecutive_failures(), 5);
    }

    #[test]
    fn closes_on_first_attempt_after_cooldown() {
        let b = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            b.record_result_at(false, t0);
        }
        let later = t0 + Duration::from_secs(60);
        assert!(b.allow_at(later));
        assert_eq!(b.consecutive_failures(), 0);
        assert_eq!(b.state_at(later), CircuitState::Closed);
    }

    #[test]
    fn cooldown_counts_from_last_failure() {
        let b = breaker();
        let t0 = Instant::now();
        for i in 0..6 {
            b.record_result_at(false, t0 + Duration::from_secs(i * 10));
        }
        // Last failure at t0+50s: still open at t0+100s, closed at t0+110s.
        assert!(!b.allow_at(t0 + Duration::from_secs(100)));
        assert!(b.allow_at(t0 + Duration::from_secs(110)));
    }

    #[test]
    fn success_resets_counter() {
        let b = breaker();
        let t0 = Instant::now();
        for _ in 0..4 {
            b.record_result_at(false, t0);
        }
        b.record_result_at(true, t0);
        assert_eq!(b.consecutive_failures(), 0);
        for _ in 0..4 {
            b.record_result_at(false, t0);
        }
        assert!(b.allow_at(t0));
    }

    #[test]
    fn threshold_is_configurable() {
        let b = CircuitBreaker::new(&BreakerConfig {
            failure_threshold: 2,
            cooldown_secs: 1,
        });
        let t0 = Instant::now();
        b.record_result_at(false, t0);
        b.record_result_at(false, t0);
        assert!(!b.allow_at(t0));
        assert!(b.allow_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn zero_threshold_is_treated_as_one() {
        let b = CircuitBreaker::new(&BreakerConfig {
            failure_threshold: 0,
            cooldown_secs: 60,
        });
        let t0 = Instant::now();
        assert!(b.allow_at(t0));
        b.record_result_at(false, t0);
        assert!(!b.allow_at(t0));
    }

    #[test]
    fn concurrent_failures_are_all_counted() {
        let b = std::sync::Arc::new(breaker());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = std::sync::Arc::clone(&b);
                std::thread::spawn(move || b.record_result(false))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.consecutive_failures(), 4);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: BreakerConfig = serde_json::from_str(r#"{"cooldown_secs": 5}"#).unwrap();
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.cooldown_secs, 5);
    }
}
