//! Login failure throttling.
//!
//! Per-principal state machine: a windowed failure counter, an exponential
//! backoff phase past the soft threshold, and a hard lockout flag past the
//! hard threshold. The exponential phase slows automated guessing without
//! fully locking out a legitimate user; the lockout bounds worst-case
//! attacker throughput.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// Exponent cap so the backoff arithmetic cannot overflow; the hard
// threshold is expected to trip long before this.
const MAX_BACKOFF_EXPONENT: u32 = 32;

/// Thresholds and windows, usually derived from [`crate::GateConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Inactivity window after which the failure counter resets.
    pub window: Duration,
    /// Failure count at which backoff delays start.
    pub soft_threshold: u32,
    /// Failure count at which the hard lockout flag is set.
    pub hard_threshold: u32,
    /// Base of the exponential delay, in seconds.
    pub backoff_base: u64,
    /// Lifetime of the hard lockout flag.
    pub lockout: Duration,
}

#[derive(Debug)]
struct FailureState {
    count: u32,
    last_failure_at: Instant,
    window_expires_at: Instant,
    locked_until: Option<Instant>,
}

/// Classification of a login attempt, computed before credentials are
/// consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Proceed,
    /// Backoff phase: reject and tell the caller how long to wait.
    Delayed { retry_after: u64 },
    /// Hard lockout: reject unconditionally until the flag expires.
    Locked { retry_after: u64 },
}

#[derive(Debug)]
pub struct LoginThrottle {
    policy: ThrottlePolicy,
    states: Mutex<HashMap<String, FailureState>>,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Classify an attempt for `principal`.
    ///
    /// In the backoff phase the required delay is `base^(count - soft)`
    /// seconds measured from the last failure; once it has elapsed the
    /// attempt proceeds to credential verification.
    pub async fn check(&self, principal: &str, now: Instant) -> ThrottleDecision {
        let mut states = self.states.lock().await;
        states.retain(|_, state| {
            state.window_expires_at > now || state.locked_until.is_some_and(|until| until > now)
        });

        let Some(state) = states.get(principal) else {
            return ThrottleDecision::Proceed;
        };

        if let Some(locked_until) = state.locked_until {
            if locked_until > now {
                return ThrottleDecision::Locked {
                    retry_after: seconds_until(now, locked_until),
                };
            }
        }

        if state.window_expires_at <= now {
            return ThrottleDecision::Proceed;
        }

        if state.count >= self.policy.soft_threshold {
            let exponent = (state.count - self.policy.soft_threshold).min(MAX_BACKOFF_EXPONENT);
            let delay = self.policy.backoff_base.saturating_pow(exponent);
            let not_before = state.last_failure_at + Duration::from_secs(delay);
            if not_before > now {
                return ThrottleDecision::Delayed {
                    retry_after: seconds_until(now, not_before),
                };
            }
        }

        ThrottleDecision::Proceed
    }

    /// Record a failed attempt. Increment-and-classify runs under one lock;
    /// crossing the hard threshold arms the lockout flag.
    pub async fn record_failure(&self, principal: &str, now: Instant) {
        let mut states = self.states.lock().await;
        let state = states
            .entry(principal.to_string())
            .or_insert_with(|| FailureState {
                count: 0,
                last_failure_at: now,
                window_expires_at: now,
                locked_until: None,
            });

        if state.window_expires_at <= now {
            // The inactivity window elapsed; the streak starts over.
            state.count = 0;
            state.locked_until = None;
        }

        state.count += 1;
        state.last_failure_at = now;
        state.window_expires_at = now + self.policy.window;
        if state.count >= self.policy.hard_threshold {
            state.locked_until = Some(now + self.policy.lockout);
        }
    }

    /// Successful verification clears the counter and any lockout flag.
    pub async fn clear(&self, principal: &str) {
        self.states.lock().await.remove(principal);
    }
}

/// Whole seconds from `now` until `deadline`, rounded up.
fn seconds_until(now: Instant, deadline: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(now);
    let mut seconds = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        seconds = seconds.saturating_add(1);
    }
    seconds.max(1)
}

#[cfg(test)]
mod tests {
    use super::{LoginThrottle, ThrottleDecision, ThrottlePolicy};
    use std::time::{Duration, Instant};

    fn policy() -> ThrottlePolicy {
        ThrottlePolicy {
            window: Duration::from_secs(300),
            soft_threshold: 5,
            hard_threshold: 15,
            backoff_base: 2,
            lockout: Duration::from_secs(900),
        }
    }

    #[tokio::test]
    async fn clear_state_proceeds() {
        let throttle = LoginThrottle::new(policy());
        assert_eq!(
            throttle.check("alice", Instant::now()).await,
            ThrottleDecision::Proceed
        );
    }

    #[tokio::test]
    async fn five_failures_delay_the_sixth_attempt_by_one_second() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..5 {
            throttle.record_failure("alice", now).await;
        }

        // base^(5 - 5) = 1 second, measured from the last failure.
        assert_eq!(
            throttle.check("alice", now).await,
            ThrottleDecision::Delayed { retry_after: 1 }
        );
        assert_eq!(
            throttle.check("alice", now + Duration::from_secs(1)).await,
            ThrottleDecision::Proceed
        );
    }

    #[tokio::test]
    async fn delay_grows_exponentially() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..7 {
            throttle.record_failure("alice", now).await;
        }

        // base^(7 - 5) = 4 seconds.
        assert_eq!(
            throttle.check("alice", now).await,
            ThrottleDecision::Delayed { retry_after: 4 }
        );
    }

    #[tokio::test]
    async fn hard_threshold_locks_regardless_of_backoff() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..15 {
            throttle.record_failure("alice", now).await;
        }

        assert_eq!(
            throttle.check("alice", now).await,
            ThrottleDecision::Locked { retry_after: 900 }
        );
        // Still locked long after any backoff delay would have elapsed.
        assert_eq!(
            throttle.check("alice", now + Duration::from_secs(600)).await,
            ThrottleDecision::Locked { retry_after: 300 }
        );
        // The flag expires with its own TTL.
        assert_eq!(
            throttle.check("alice", now + Duration::from_secs(900)).await,
            ThrottleDecision::Proceed
        );
    }

    #[tokio::test]
    async fn inactivity_window_resets_the_counter() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..5 {
            throttle.record_failure("alice", now).await;
        }
        let later = now + Duration::from_secs(301);
        assert_eq!(
            throttle.check("alice", later).await,
            ThrottleDecision::Proceed
        );

        // A new failure after the window starts from one, not six.
        throttle.record_failure("alice", later).await;
        assert_eq!(
            throttle.check("alice", later).await,
            ThrottleDecision::Proceed
        );
    }

    #[tokio::test]
    async fn success_clears_counter_and_lockout() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..15 {
            throttle.record_failure("alice", now).await;
        }
        throttle.clear("alice").await;
        assert_eq!(
            throttle.check("alice", now).await,
            ThrottleDecision::Proceed
        );
    }

    #[tokio::test]
    async fn principals_are_isolated() {
        let throttle = LoginThrottle::new(policy());
        let now = Instant::now();

        for _ in 0..5 {
            throttle.record_failure("alice", now).await;
        }
        assert_eq!(
            throttle.check("bob", now).await,
            ThrottleDecision::Proceed
        );
    }
}
