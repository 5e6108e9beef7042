use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;

use crate::client::client_identifier;
use crate::metrics::TRACKED_KEYS;
use crate::policy::RateLimitPolicy;

// Rate limit entry - tracks attempts per action + client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitEntry {
    fn start(now: DateTime<Utc>, policy: &RateLimitPolicy) -> Self {
        Self {
            count: 1,
            reset_time: now + policy.window(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time
    }
}

// Outcome of a single limiter call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

impl Decision {
    // Seconds to wait until is_expired() holds, i.e. strictly past reset_time
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_time - now).num_milliseconds().max(0);
        (millis / 1000 + 1) as u64
    }
}

// Who sweeps expired counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    Inline,     // every check sweeps first
    Background, // spawn_sweeper does it
}

// Fixed-window limiter, in memory only. Clones share the table
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    entries: DashMap<String, RateLimitEntry>,
    sweep: SweepMode,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(SweepMode::Inline)
    }
}

impl RateLimiter {
    pub fn new(sweep: SweepMode) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                entries: DashMap::new(),
                sweep,
            }),
        }
    }

    pub fn sweep_mode(&self) -> SweepMode {
        self.inner.sweep
    }

    pub fn check(&self, headers: &HeaderMap, action: &str, policy: &RateLimitPolicy) -> Decision {
        let client = client_identifier(headers);
        self.check_at(&client, action, policy, Utc::now())
    }

    // Explicit client and clock, check() uses the headers and Utc::now()
    pub fn check_at(
        &self,
        client: &str,
        action: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Decision {
        if self.inner.sweep == SweepMode::Inline {
            self.evict_expired(now);
        }

        let limit = policy.limit();
        let key = format!("{}:{}", action, client);

        match self.inner.entries.entry(key) {
            Entry::Vacant(slot) => {
                let entry = slot.insert(RateLimitEntry::start(now, policy));
                Decision {
                    success: true,
                    limit,
                    remaining: limit - 1,
                    reset_time: entry.reset_time,
                }
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                // window over? start a new one
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::start(now, policy);
                    return Decision {
                        success: true,
                        limit,
                        remaining: limit - 1,
                        reset_time: entry.reset_time,
                    };
                }

                if entry.count < limit {
                    entry.count += 1;
                    return Decision {
                        success: true,
                        limit,
                        remaining: limit - entry.count,
                        reset_time: entry.reset_time,
                    };
                }

                // over limit, window is not extended
                Decision {
                    success: false,
                    limit,
                    remaining: 0,
                    reset_time: entry.reset_time,
                }
            }
        }
    }

    // Returns how many counters were dropped
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.inner.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn get(&self, action: &str, client: &str) -> Option<RateLimitEntry> {
        self.inner
            .entries
            .get(&format!("{}:{}", action, client))
            .map(|entry| *entry)
    }

    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            tracing::info!(interval_secs = every.as_secs(), "rate limit sweeper started");
            loop {
                ticker.tick().await;
                let removed = limiter.evict_expired(Utc::now());
                TRACKED_KEYS.set(limiter.len() as i64);
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "evicted expired rate limit counters");
                }
            }
        })
    }
}
