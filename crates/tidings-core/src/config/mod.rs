//! Configuration for the provider bridge and its host

pub mod bridge_config;
pub mod loader;
pub mod logging_config;
pub mod timeouts;

pub use bridge_config::{BridgeConfig, ClientIdentity, ProviderConfig, ReadinessPolicy};
pub use loader::{DEFAULT_CONFIG_FILE, apply_env_overrides, load_config, load_from_file};
pub use logging_config::LoggingConfig;
