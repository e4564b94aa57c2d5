//! Tidings Core Library
//!
//! Bridges a host application to an external tool provider process over
//! MCP stdio, with readiness tracking, per-call timeouts and correlation of
//! concurrent calls.

pub mod config;
pub mod error;
pub mod mcp;

// Re-export commonly used types
pub use config::{BridgeConfig, LoggingConfig, ProviderConfig, ReadinessPolicy};
pub use error::{TidingsError, TidingsResult, UnifiedError};
pub use mcp::{McpBridge, McpError, McpTool, ReadinessState};
