//! Per-client request limiting for the API routes.
//!
//! Each client IP gets a fixed window of `limit` requests; once exhausted,
//! further requests are rejected until the window expires.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Client count above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clients: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

    /// Allows `limit` requests per client and `window`. A limit of 0 disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: DashMap::new(),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Counts one request from `client`.
    ///
    /// Returns the time until the window resets when the client is over its limit.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.limit == 0 {
            return Ok(());
        }
        if self.clients.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            return Err(self.window.saturating_sub(elapsed));
        }
        entry.count += 1;
        Ok(())
    }

    fn prune(&self, now: Instant) {
        self.clients
            .retain(|_, window| now.saturating_duration_since(window.started) < self.window);
        tracing::debug!(clients = self.clients.len(), "pruned rate limit windows");
    }
}
