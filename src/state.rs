//! Application state
//!
//! Holds all shared components and state

use crate::config::ServerConfig;
use crate::index::ImageIndex;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<ServerConfig>,
    /// Alias index (scoped connection per operation)
    pub index: ImageIndex,
    /// Per-client sliding-window rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}
