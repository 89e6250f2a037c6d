//! Server configuration
//!
//! Loaded from `config.toml` in the working directory. A missing file is
//! created with the documented defaults on first run; missing keys fall back
//! to their defaults individually. A malformed file is a fatal startup error.

use crate::error::{Error, Result};
use crate::ingest::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name, resolved relative to the working directory
pub const CONFIG_FILE: &str = "config.toml";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Alias index file location
    pub database_name: PathBuf,
    /// Advisory SQLite cache size hint in KiB
    pub database_cache: u32,
    /// Listening port
    pub listen_port: u16,
    /// Drop directory scanned once at startup
    pub image_path_origin: PathBuf,
    /// Destination for normalized, compressed images
    pub image_path_processed: PathBuf,
    /// Re-encode quality, 0-100 (applies to JPEG output)
    pub compress_image_quality: u8,
    /// Output format for re-encoded images
    pub image_format: OutputFormat,
    /// Redirect plaintext requests to https when true
    pub strict_https: bool,
    /// Max requests per client per window; 0 disables limiting
    pub rate_limit: usize,
    /// Sliding window length in seconds
    pub time_window: u64,
    /// Bind address
    pub server_host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_name: PathBuf::from("test.db"),
            database_cache: 256,
            listen_port: 20001,
            image_path_origin: PathBuf::from("Origin"),
            image_path_processed: PathBuf::from("Processed"),
            compress_image_quality: 75,
            image_format: OutputFormat::Jpeg,
            strict_https: false,
            rate_limit: 5,
            time_window: 60,
            server_host: "0.0.0.0".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, writing the default file first if it
    /// does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let defaults = Self::default();
            let rendered = toml::to_string_pretty(&defaults)
                .map_err(|e| Error::Config(format!("failed to render defaults: {e}")))?;
            std::fs::write(path, rendered)?;
            tracing::info!(path = %path.display(), "Created default config file");
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("malformed {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.compress_image_quality > 100 {
            return Err(Error::Config(format!(
                "compress_image_quality must be 0-100, got {}",
                self.compress_image_quality
            )));
        }
        Ok(())
    }
}
