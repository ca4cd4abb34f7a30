//! Runtime configuration for the gate.

use std::time::Duration;

use crate::throttle::ThrottlePolicy;

const DEFAULT_TOKEN_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_MAX_DEVICES: usize = 3;
const DEFAULT_FAILURE_WINDOW_SECONDS: u64 = 5 * 60;
const DEFAULT_SOFT_THRESHOLD: u32 = 5;
const DEFAULT_HARD_THRESHOLD: u32 = 15;
const DEFAULT_BACKOFF_BASE: u64 = 2;
const DEFAULT_LOCKOUT_SECONDS: u64 = 15 * 60;

/// Gate-wide knobs: token lifetime, device cap, and throttle thresholds.
#[derive(Clone, Debug)]
pub struct GateConfig {
    token_ttl: Duration,
    max_devices: usize,
    failure_window: Duration,
    soft_threshold: u32,
    hard_threshold: u32,
    backoff_base: u64,
    lockout: Duration,
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS),
            max_devices: DEFAULT_MAX_DEVICES,
            failure_window: Duration::from_secs(DEFAULT_FAILURE_WINDOW_SECONDS),
            soft_threshold: DEFAULT_SOFT_THRESHOLD,
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            backoff_base: DEFAULT_BACKOFF_BASE,
            lockout: Duration::from_secs(DEFAULT_LOCKOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }

    #[must_use]
    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    #[must_use]
    pub fn with_soft_threshold(mut self, threshold: u32) -> Self {
        self.soft_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_hard_threshold(mut self, threshold: u32) -> Self {
        self.hard_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_backoff_base(mut self, base: u64) -> Self {
        self.backoff_base = base;
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    #[must_use]
    pub fn max_devices(&self) -> usize {
        self.max_devices
    }

    #[must_use]
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            window: self.failure_window,
            soft_threshold: self.soft_threshold,
            hard_threshold: self.hard_threshold,
            backoff_base: self.backoff_base,
            lockout: self.lockout,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}
