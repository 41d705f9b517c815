//! Reconnect budget.
//!
//! Each failed connection waits a random delay in
//! `0..=min(max, base * 2^failures)` and spends one attempt. A session
//! that reaches READY or RESUMED refills the budget.

use std::time::Duration;

use super::GatewayConfig;

#[derive(Debug)]
pub(crate) struct Reconnects {
    base_ms: u64,
    max_ms: u64,
    limit: u32,
    failures: u32,
}

impl Reconnects {
    pub(super) fn new(config: &GatewayConfig) -> Self {
        Self {
            base_ms: millis(config.backoff_base),
            max_ms: millis(config.backoff_max),
            limit: config.max_reconnect_attempts,
            failures: 0,
        }
    }

    /// Record a failure. `None` once the budget is spent.
    pub(super) fn next_delay(&mut self) -> Option<Duration> {
        let ceiling = 2u64
            .checked_pow(self.failures)
            .map_or(u64::MAX, |factor| self.base_ms.saturating_mul(factor))
            .min(self.max_ms);
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.limit {
            return None;
        }
        Some(Duration::from_millis(fastrand::u64(0..=ceiling)))
    }

    pub(super) fn failures(&self) -> u32 {
        self.failures
    }

    /// The session is live again.
    pub(super) fn connected(&mut self) {
        self.failures = 0;
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
