//! Exponential backoff with a total delay budget.
//!
//! A `BackoffPolicy` is shared configuration; each call starts its own
//! `Backoff` so attempt state is never shared between in-flight calls.
//! The budget counts only the delays this backoff hands out. Time spent
//! inside attempts (round trips, flood waits) is not charged to it.

use std::time::Duration;

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MULTIPLIER: f64 = 1.1;
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Cap on the sum of all delays. Once the next delay would cross it,
    /// the backoff stops.
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed: DEFAULT_MAX_ELAPSED,
        }
    }
}

impl BackoffPolicy {
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            current: self.initial_interval,
            spent: Duration::ZERO,
        }
    }
}

/// Per-call backoff state.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    spent: Duration,
}

impl Backoff {
    /// Next delay, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.current;
        if self.spent + delay > self.policy.max_elapsed {
            return None;
        }
        let grown = (self.current.as_nanos() as f64 * self.policy.multiplier).round() as u64;
        self.current = Duration::from_nanos(grown).min(self.policy.max_interval);
        self.spent += delay;
        Some(delay)
    }

    /// Sum of the delays handed out so far.
    pub fn spent(&self) -> Duration {
        self.spent
    }
}
