//! TOML configuration loading
//!
//! ```toml
//! [chain]
//! max_length_m = 60.0
//! stop_before_max_m = 55.0
//!
//! [catenary]
//! fixed_factor = 0.9
//! ```
//!
//! Sections and keys that are left out keep their defaults.

use super::types::{ConfigError, WindlassConfig};

/// Parse and validate a TOML configuration document
pub fn from_toml(input: &str) -> Result<WindlassConfig, ConfigError> {
    let config: WindlassConfig = toml::from_str(input).map_err(|_| {
        log_error!("Config: TOML parse failed");
        ConfigError::Parse
    })?;

    config.validate().map_err(|e| {
        log_error!("Config: validation failed: {:?}", e);
        e
    })?;

    Ok(config)
}
