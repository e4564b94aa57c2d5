//! MCP bridge error types

use super::readiness::ReadinessState;
use crate::error::UnifiedError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the provider bridge
#[derive(Debug, Error, Clone)]
pub enum McpError {
    /// The provider executable could not be launched
    #[error("Failed to spawn provider '{command}': {message}")]
    Spawn { command: String, message: String },

    /// The initialize exchange did not complete in time
    #[error("Handshake timed out after {timeout:?}")]
    HandshakeTimeout { timeout: Duration },

    /// The provider answered the initialize request with an error
    #[error("Handshake rejected by provider: {message}")]
    HandshakeRejected { message: String },

    /// The provider did not reach the ready state within the polling bound
    #[error("Provider not ready (state: {state})")]
    NotReady { state: ReadinessState },

    /// A call's response did not arrive within its bound
    #[error("Call '{name}' timed out after {timeout:?}")]
    CallTimeout { name: String, timeout: Duration },

    /// The provider returned an error object for a call
    #[error("Remote tool error {code}: {message}")]
    RemoteTool {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// The provider exited while the call was outstanding
    #[error("Provider process terminated{}", exit_suffix(.code))]
    ProcessTerminated { code: Option<i32> },

    /// I/O failure on the provider pipes
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid bridge configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => String::new(),
    }
}

impl McpError {
    /// Create a new Spawn error
    pub fn spawn(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a new NotReady error
    pub fn not_ready(state: ReadinessState) -> Self {
        Self::NotReady { state }
    }

    /// Create a new CallTimeout error
    pub fn call_timeout(name: impl Into<String>, timeout: Duration) -> Self {
        Self::CallTimeout {
            name: name.into(),
            timeout,
        }
    }

    /// Create a new RemoteTool error
    pub fn remote_tool(code: i32, message: impl Into<String>) -> Self {
        Self::RemoteTool {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl UnifiedError for McpError {
    fn error_code(&self) -> &str {
        match self {
            Self::Spawn { .. } => "MCP_SPAWN",
            Self::HandshakeTimeout { .. } => "MCP_HANDSHAKE_TIMEOUT",
            Self::HandshakeRejected { .. } => "MCP_HANDSHAKE_REJECTED",
            Self::NotReady { .. } => "MCP_NOT_READY",
            Self::CallTimeout { .. } => "MCP_CALL_TIMEOUT",
            Self::RemoteTool { .. } => "MCP_REMOTE_TOOL",
            Self::ProcessTerminated { .. } => "MCP_PROCESS_TERMINATED",
            Self::Transport { .. } => "MCP_TRANSPORT",
            Self::Serialization { .. } => "MCP_SERIALIZATION",
            Self::Config { .. } => "MCP_CONFIG",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Spawn { message, .. } => message,
            Self::HandshakeTimeout { .. } => "Handshake timed out",
            Self::HandshakeRejected { message } => message,
            Self::NotReady { .. } => "Provider not ready",
            Self::CallTimeout { .. } => "Call timed out",
            Self::RemoteTool { message, .. } => message,
            Self::ProcessTerminated { .. } => "Provider process terminated",
            Self::Transport { message } => message,
            Self::Serialization { message } => message,
            Self::Config { message } => message,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotReady { .. } | Self::CallTimeout { .. } | Self::Transport { .. }
        )
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}
