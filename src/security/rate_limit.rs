//! Per-principal sliding-window rate limiting.
//!
//! # Algorithm
//! Sliding-window log: each principal keeps the exact timestamps of its
//! admitted calls. On every call:
//! ```text
//! window_start = now - window
//! drop timestamps <= window_start
//! if remaining >= max_requests → reject (nothing recorded)
//! else append now → admit
//! ```
//! At most `max_requests` calls are admitted in any trailing window, and a
//! blocked principal is released when its oldest timestamp ages out, not at
//! a bucket edge.
//!
//! # Concurrency
//! Prune, check and append for one principal run under that principal's
//! map-entry lock, so two racing calls can never both take the last slot.
//!
//! # Idle principals
//! A principal whose newest timestamp has left the window holds no state
//! worth keeping. Such entries are swept every [`SWEEP_INTERVAL`] admissions
//! and before keys are counted.
//!
//! # Limitations
//! [`LocalWindowStore`] lives in process memory. Behind a load balancer each
//! instance enforces its own limit; a shared deployment needs a
//! [`WindowStore`] backed by an external store with atomic updates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::observability::metrics;
use crate::security::clock::Clock;
use crate::security::error::{SecurityError, SecurityResult};

/// Longest accepted window: 366 days.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 3600;

/// Admissions between sweeps of idle principals.
pub const SWEEP_INTERVAL: u64 = 1024;

/// Limit applied to one principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl RatePolicy {
    /// Windows longer than [`MAX_WINDOW_SECS`] are clamped to it.
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window: Duration::seconds(window_seconds.min(MAX_WINDOW_SECS) as i64),
        }
    }
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: usize },
    Rejected { retry_after: Duration },
}

/// Storage for sliding-window logs.
///
/// `admit` must run prune, check and append as one atomic step per key.
pub trait WindowStore: Send + Sync {
    fn admit(&self, key: &str, now: DateTime<Utc>, policy: RatePolicy) -> Admission;

    /// Number of keys with at least one call inside `window` of `now`.
    fn tracked_keys(&self, now: DateTime<Utc>, window: Duration) -> usize;
}

/// Start of the window ending at `now`, saturating at the earliest
/// representable instant.
fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// In-process window store.
#[derive(Debug, Default)]
pub struct LocalWindowStore {
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
    admissions: AtomicU64,
}

impl LocalWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every key whose newest call is at or before `window_start`.
    fn sweep(&self, window_start: DateTime<Utc>) {
        let before = self.windows.len();
        self.windows
            .retain(|_, log| log.back().is_some_and(|newest| *newest > window_start));
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle rate-limit windows");
        }
    }
}

impl WindowStore for LocalWindowStore {
    fn admit(&self, key: &str, now: DateTime<Utc>, policy: RatePolicy) -> Admission {
        let cutoff = window_start(now, policy.window);
        // Sweep before taking the entry lock; `retain` locks every shard.
        if self.admissions.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(cutoff);
        }

        // Logs are appended in clock order, so the oldest entries sit at the front.
        let mut log = self.windows.entry(key.to_string()).or_default();
        while log.front().is_some_and(|ts| *ts <= cutoff) {
            log.pop_front();
        }

        if log.len() >= policy.max_requests {
            let retry_after = log
                .front()
                .map(|oldest| policy.window - (now - *oldest))
                .unwrap_or(policy.window);
            let idle = log.is_empty();
            drop(log);
            if idle {
                self.windows.remove_if(key, |_, log| log.is_empty());
            }
            return Admission::Rejected { retry_after };
        }

        log.push_back(now);
        Admission::Admitted {
            remaining: policy.max_requests - log.len(),
        }
    }

    fn tracked_keys(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.sweep(window_start(now, window));
        self.windows.len()
    }
}

/// Rate limiter keyed by principal id.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// A limiter over an in-process store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(LocalWindowStore::new()), clock)
    }

    pub fn with_store(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a call for `principal_id`, or reject it if the window is full.
    pub fn check_and_record(
        &self,
        principal_id: &str,
        max_requests: usize,
        window_seconds: u64,
    ) -> SecurityResult<()> {
        let policy = RatePolicy::new(max_requests, window_seconds);
        match self.store.admit(principal_id, self.clock.now(), policy) {
            Admission::Admitted { remaining } => {
                tracing::trace!(principal = %principal_id, remaining, "Request admitted");
                Ok(())
            }
            Admission::Rejected { retry_after } => {
                let retry_after_secs = u64::try_from(retry_after.num_seconds()).unwrap_or(0).max(1);
                tracing::warn!(
                    target: "audit",
                    event = "rate_limited",
                    principal = %principal_id,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited();
                Err(SecurityError::RateLimitExceeded { retry_after_secs })
            }
        }
    }

    /// Principals with a call inside the trailing `window_seconds`.
    pub fn tracked_principals(&self, window_seconds: u64) -> usize {
        let policy = RatePolicy::new(0, window_seconds);
        self.store.tracked_keys(self.clock.now(), policy.window)
    }
}
