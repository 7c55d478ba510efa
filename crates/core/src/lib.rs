//! Weatherbit Ingest Core Library
//!
//! Shared utilities for the forecast and history ingestion jobs:
//! - Configuration loading (XDG-compliant)
//! - File system utilities
//! - Application-wide defaults

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigError, ConfigSource};
pub use fs::{append_bytes, ensure_parent_dir, path_exists, write_bytes};

/// Application name used for XDG paths
pub const APP_NAME: &str = "weatherbit-ingest";

/// Offset every canonical instant is normalized to (JST)
pub const DEFAULT_REFERENCE_OFFSET: &str = "+09:00";

/// Courtesy delay between two locations sent to the upstream API
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

/// Hours of hourly forecast requested per location
pub const DEFAULT_FORECAST_HOURS: u16 = 72;

/// Upper bound Weatherbit accepts for the `hours` parameter
pub const MAX_FORECAST_HOURS: u16 = 240;
