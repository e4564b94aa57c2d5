//! Provider bridge configuration

use super::logging_config::LoggingConfig;
use super::timeouts;
use crate::error::{TidingsError, TidingsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn default_tool_call_timeout() -> Duration {
    timeouts::request::tool_call_timeout()
}

fn default_handshake_timeout() -> Duration {
    timeouts::handshake::timeout()
}

fn default_banner_wait() -> Duration {
    timeouts::handshake::banner_wait()
}

fn default_shutdown_grace() -> Duration {
    timeouts::shutdown::grace()
}

fn default_poll_interval() -> Duration {
    timeouts::readiness::poll_interval()
}

fn default_max_poll_attempts() -> u32 {
    timeouts::readiness::MAX_POLL_ATTEMPTS
}

/// How the external tool-provider process is launched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Executable to spawn
    pub command: String,
    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables on top of the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the provider
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Substring on the provider's stderr that signals it is listening.
    /// Only used to send the handshake early; readiness still comes from
    /// the handshake response.
    #[serde(default)]
    pub banner_pattern: Option<String>,
}

impl ProviderConfig {
    /// Create a provider config for a command and its arguments
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Default::default()
        }
    }

    /// Add environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the stderr banner hint
    pub fn with_banner(mut self, pattern: impl Into<String>) -> Self {
        self.banner_pattern = Some(pattern.into());
        self
    }
}

/// Bounded polling used while a caller waits for the provider to become ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Interval between checks
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Maximum number of checks
    #[serde(default = "default_max_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_attempts: default_max_poll_attempts(),
        }
    }
}

impl ReadinessPolicy {
    /// Upper bound on how long a caller can wait. Saturates at `Duration::MAX`.
    pub fn total_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

/// Identity announced to the provider in the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "tidings".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Provider process
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Timeout applied to each tool call unless the caller overrides it
    #[serde(with = "humantime_serde", default = "default_tool_call_timeout")]
    pub request_timeout: Duration,
    /// Bound on the initialize exchange
    #[serde(with = "humantime_serde", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
    /// How long the handshake waits for the banner when one is configured
    #[serde(with = "humantime_serde", default = "default_banner_wait")]
    pub banner_wait: Duration,
    /// Time the provider gets to exit on shutdown before it is killed
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
    /// Readiness polling bounds
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    /// Client identity sent during the handshake
    #[serde(default)]
    pub client: ClientIdentity,
    /// Logging settings for the host binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            request_timeout: default_tool_call_timeout(),
            handshake_timeout: default_handshake_timeout(),
            banner_wait: default_banner_wait(),
            shutdown_grace: default_shutdown_grace(),
            readiness: ReadinessPolicy::default(),
            client: ClientIdentity::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a config for the given provider with default bounds
    pub fn for_provider(provider: ProviderConfig) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    /// Set the per-call timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the readiness polling policy
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Check that every bound is usable
    pub fn validate(&self) -> TidingsResult<()> {
        if self.provider.command.trim().is_empty() {
            return Err(TidingsError::config("provider.command must not be empty"));
        }
        self.validate_bounds()
    }

    /// Check timeouts and polling bounds without requiring a provider command
    pub fn validate_bounds(&self) -> TidingsResult<()> {
        if self.request_timeout.is_zero() {
            return Err(TidingsError::config("request_timeout must be greater than zero"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(TidingsError::config(
                "handshake_timeout must be greater than zero",
            ));
        }
        if self.readiness.poll_interval.is_zero() || self.readiness.max_attempts == 0 {
            return Err(TidingsError::config(
                "readiness polling needs a non-zero interval and attempt count",
            ));
        }
        Ok(())
    }
}
