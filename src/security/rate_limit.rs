//! Fixed-window rate limiting keyed by client address.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::{ConfigStore, GatekeeperConfig};

/// Window length and request ceiling applied to one check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl From<&GatekeeperConfig> for RateLimitPolicy {
    fn from(config: &GatekeeperConfig) -> Self {
        Self {
            window: Duration::from_secs(config.rate_limit_window_secs),
            max_requests: config.rate_limit_max_requests,
        }
    }
}

/// Per-client counter for the current window.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

impl RateLimitEntry {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            window_reset_at: now + window,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Hard-reset fixed window limiter.
///
/// Counting restarts at 1 on the first request seen after the deadline, so a
/// burst straddling the boundary can be admitted up to twice the ceiling.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    entries: DashMap<String, RateLimitEntry>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request from `key` at the current instant.
    pub fn check(&self, key: &str, policy: RateLimitPolicy) -> RateDecision {
        self.check_at(key, policy, Instant::now())
    }

    /// Record a request from `key` observed at `now`.
    pub fn check_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateDecision {
        match self.entries.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry::open(now, policy.window));
                RateDecision::Allowed {
                    remaining: policy.max_requests.saturating_sub(1),
                }
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if now > entry.window_reset_at {
                    *entry = RateLimitEntry::open(now, policy.window);
                    return RateDecision::Allowed {
                        remaining: policy.max_requests.saturating_sub(1),
                    };
                }

                if entry.count >= policy.max_requests {
                    let left = entry.window_reset_at.saturating_duration_since(now);
                    return RateDecision::Limited {
                        retry_after_secs: left.as_millis().div_ceil(1000) as u64,
                    };
                }

                entry.count += 1;
                RateDecision::Allowed {
                    remaining: policy.max_requests - entry.count,
                }
            }
        }
    }

    /// Drop entries whose window ended more than `grace` before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant, grace: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now <= entry.window_reset_at + grace);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of one client's entry.
    #[cfg(test)]
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|r| r.value().clone())
    }
}

/// Periodically sweep long-expired windows until shutdown.
pub async fn run_sweeper(
    limiter: Arc<FixedWindowLimiter>,
    config: Arc<ConfigStore>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let snapshot = config.snapshot();
        let interval = Duration::from_secs(snapshot.gatekeeper.sweep_interval_secs);
        let grace = Duration::from_secs(snapshot.gatekeeper.rate_limit_window_secs);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let removed = limiter.sweep(Instant::now(), grace);
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Swept expired rate limit entries");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
