//! Sliding-window request rate limiting.
//!
//! Each key — an identity plus an endpoint class — owns a log of request
//! timestamps. A request is admitted when fewer than `limit` timestamps fall
//! inside the trailing window at the moment of the check, and the check and
//! the append are one atomic step: the log is mutated under its shard lock
//! in a concurrent map, so two requests racing on the same key serialize,
//! while requests for different keys proceed in parallel on other shards.
//! Under any interleaving, a key with `limit` slots admits at most `limit`
//! requests per window.
//!
//! A denied request is not recorded; being told "no" does not push the
//! reset time further out. Admitted work is never un-counted either — a
//! caller that abandons a request after admission has still spent the slot.
//!
//! The limiter is in-process and infallible. A deployment that swaps in a
//! remote counter must map backend failure to a deny (fail closed), not a
//! pass.

use std::collections::VecDeque;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Who is being limited.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateSubject {
    /// An authenticated user.
    User(Uuid),
    /// An unauthenticated caller, keyed by network address.
    Address(IpAddr),
}

/// One rate-limiting bucket: an identity acting on one endpoint class.
///
/// The endpoint class is the route template plus method ("GET /api/v1/users"),
/// never the concrete path, so `/users/<id>` shares one budget across ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub tenant_id: Option<Uuid>,
    pub subject: RateSubject,
    pub endpoint: String,
}

/// Limit over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub window: Duration,
}

impl Quota {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::seconds(60),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        /// Unix seconds when the oldest counted request leaves the window.
        reset_at: i64,
    },
    Denied {
        limit: u32,
        reset_at: i64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateDecision::Allowed { limit, .. } | RateDecision::Denied { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateDecision::Allowed { remaining, .. } => *remaining,
            RateDecision::Denied { .. } => 0,
        }
    }

    pub fn reset_at(&self) -> i64 {
        match self {
            RateDecision::Allowed { reset_at, .. } | RateDecision::Denied { reset_at, .. } => {
                *reset_at
            }
        }
    }

    /// Seconds a denied caller should wait, never less than one.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at() - now.timestamp()).max(1) as u64
    }
}

/// Sliding-window-log limiter over a sharded concurrent map.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<RateKey, VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check a key against its quota and, if admitted, record
    /// the request.
    pub fn check_and_increment(&self, key: &RateKey, quota: Quota) -> RateDecision {
        self.check_at(key, quota, Utc::now())
    }

    fn check_at(&self, key: &RateKey, quota: Quota, now: DateTime<Utc>) -> RateDecision {
        let now_ms = now.timestamp_millis();
        let window_ms = quota.window.num_milliseconds();

        // Entry guard holds the shard lock for the whole check-and-append.
        let mut window = self.windows.entry(key.clone()).or_default();

        while window.front().map_or(false, |ts| now_ms - *ts >= window_ms) {
            window.pop_front();
        }

        let count = window.len() as u32;
        if count >= quota.limit {
            return RateDecision::Denied {
                limit: quota.limit,
                reset_at: reset_epoch(window.front(), window_ms, now_ms),
            };
        }

        window.push_back(now_ms);
        RateDecision::Allowed {
            limit: quota.limit,
            remaining: quota.limit - count - 1,
            reset_at: reset_epoch(window.front(), window_ms, now_ms),
        }
    }

    /// Drop keys whose most recent request is older than `idle_for`.
    /// Returns the number of keys removed.
    pub fn purge_idle(&self, idle_for: Duration) -> usize {
        let cutoff = Utc::now().timestamp_millis() - idle_for.num_milliseconds();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| window.back().map_or(false, |ts| *ts >= cutoff));
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

fn reset_epoch(front: Option<&i64>, window_ms: i64, now_ms: i64) -> i64 {
    (front.copied().unwrap_or(now_ms) + window_ms) / 1000
}
