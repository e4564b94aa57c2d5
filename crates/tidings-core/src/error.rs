//! Error types for Tidings
//!
//! Every error in the workspace implements [`UnifiedError`], which gives
//! callers a stable error code and a retryability hint regardless of which
//! layer produced the failure.

use crate::mcp::McpError;
use thiserror::Error;

/// Result type alias for Tidings operations
pub type TidingsResult<T> = Result<T, TidingsError>;

/// Unified error interface shared by all error types in the workspace
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Top-level error for the configuration and host layers
#[derive(Debug, Error, Clone)]
pub enum TidingsError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Errors raised by the provider bridge
    #[error(transparent)]
    Bridge(#[from] McpError),
}

impl TidingsError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context about where it happened
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Context attached to the error, if any
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. } => context.as_deref(),
            _ => None,
        }
    }
}

impl UnifiedError for TidingsError {
    fn error_code(&self) -> &str {
        match self {
            Self::Config { .. } => "TIDINGS_CONFIG",
            Self::Io(_) => "TIDINGS_IO",
            Self::Bridge(err) => err.error_code(),
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Config { message, .. } => message,
            Self::Io(message) => message,
            Self::Bridge(err) => err.message(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Bridge(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for TidingsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_context() {
        let err = TidingsError::config_with_context("bad value", "reading tidings.toml");
        assert_eq!(err.error_code(), "TIDINGS_CONFIG");
        assert_eq!(err.message(), "bad value");
        assert_eq!(err.context(), Some("reading tidings.toml"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_bridge_error_passthrough() {
        let err: TidingsError = McpError::not_ready(crate::mcp::ReadinessState::Failed).into();
        assert_eq!(err.error_code(), "MCP_NOT_READY");
        assert!(err.to_string().contains("failed"));
    }
}
