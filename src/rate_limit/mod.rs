//! RateLimiter - per-client sliding window
//!
//! ## Responsibilities
//!
//! - Track request timestamps per client identifier
//! - Reject the request that would exceed the limit inside the window
//! - Reclaim entries for clients that went quiet
//!
//! The client map is process-wide mutable state consulted on every request.
//! tokio dispatches handlers across OS threads, so all access goes through a
//! single mutex; within one client the append order matches arrival order
//! because the lock is held across prune-check-append.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window request counter keyed by client identifier
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    /// Max requests per window; 0 means limiting is disabled
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per client per `window`.
    ///
    /// A `max_requests` of 0 disables limiting entirely: every request is
    /// allowed and nothing is recorded.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Decide whether a request from `client_id` arriving at `now` passes.
    ///
    /// Prunes the client's window to timestamps newer than the window length,
    /// rejects if the pruned count has reached the limit, and otherwise
    /// records `now` and accepts.
    pub fn allow(&self, client_id: &str, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let mut windows = self.windows.lock().unwrap();
        let times = windows.entry(client_id.to_string()).or_default();
        times.retain(|&t| now.duration_since(t) < self.window);
        if times.len() >= self.max_requests {
            return false;
        }
        times.push(now);
        true
    }

    /// Drop clients whose entire window has expired.
    ///
    /// Entries are otherwise never removed, so a long-running server would
    /// accumulate one entry per client address ever seen. Run periodically.
    pub fn sweep_idle(&self, now: Instant) {
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, times| times.iter().any(|&t| now.duration_since(t) < self.window));
    }

    /// Number of tracked clients (post-sweep observability)
    pub fn client_count(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}
