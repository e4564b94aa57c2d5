//! Configuration loading from files and environment variables

use super::bridge_config::BridgeConfig;
use crate::error::{TidingsError, TidingsResult};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "tidings.toml";

/// Load configuration from a file
///
/// Supports TOML and JSON based on the file extension.
/// Returns the default config if the file doesn't exist.
pub fn load_from_file(path: &Path) -> TidingsResult<BridgeConfig> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        TidingsError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| {
            TidingsError::config_with_context(
                format!("Failed to parse JSON config: {}", e),
                format!("Deserializing JSON configuration from '{}'", path.display()),
            )
        })?,
        _ => toml::from_str(&content).map_err(|e| {
            TidingsError::config_with_context(
                format!("Failed to parse TOML config: {}", e),
                format!("Deserializing TOML configuration from '{}'", path.display()),
            )
        })?,
    };

    Ok(config)
}

/// Apply `TIDINGS_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut BridgeConfig) -> TidingsResult<()> {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// Apply `TIDINGS_*` overrides using the given variable lookup
pub fn apply_overrides_from<F>(config: &mut BridgeConfig, lookup: F) -> TidingsResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(command) = lookup("TIDINGS_PROVIDER_COMMAND") {
        config.provider.command = command;
    }

    if let Some(args) = lookup("TIDINGS_PROVIDER_ARGS") {
        config.provider.args = args.split_whitespace().map(str::to_string).collect();
    }

    if let Some(secs) = lookup("TIDINGS_REQUEST_TIMEOUT_SECS") {
        config.request_timeout = parse_secs("TIDINGS_REQUEST_TIMEOUT_SECS", &secs)?;
    }

    if let Some(secs) = lookup("TIDINGS_HANDSHAKE_TIMEOUT_SECS") {
        config.handshake_timeout = parse_secs("TIDINGS_HANDSHAKE_TIMEOUT_SECS", &secs)?;
    }

    if let Some(level) = lookup("TIDINGS_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = lookup("TIDINGS_LOG_FORMAT") {
        config.logging.format = format;
    }

    Ok(())
}

fn parse_secs(key: &str, value: &str) -> TidingsResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| TidingsError::config(format!("Invalid {} value: '{}'", key, value)))
}

/// Load configuration: file first, then environment overrides
pub fn load_config(path: Option<&Path>) -> TidingsResult<BridgeConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut config = load_from_file(path)?;
    apply_env_overrides(&mut config)?;
    config.validate_bounds()?;
    Ok(config)
}
