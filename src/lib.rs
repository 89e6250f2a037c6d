//! imgvault
//!
//! Self-hosted image drop box: files dropped into an origin directory are
//! compressed once at startup, keyed by a stable alias, and served over two
//! read endpoints.
//!
//! ## Architecture (5 Components)
//!
//! 1. ServerConfig - `config.toml` knobs, defaults written on first run
//! 2. IngestionPipeline - scan, validate, alias, compress, persist, retire
//! 3. AliasIndex - persistent unique alias-to-path mapping (SQLite)
//! 4. RateLimiter - per-client sliding-window request gate
//! 5. WebAPI - the two read endpoints behind the rate-limit and HTTPS gates
//!
//! ## Lifecycle
//!
//! Strictly sequential phases: Initialize (config, directories, schema,
//! listener bind) then Ingest (the origin tree, to completion) then Serve.
//! Ingestion and serving never overlap.

pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod rate_limit;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
