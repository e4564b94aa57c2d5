//! Model Context Protocol (MCP) bridge to a stdio tool provider
//!
//! The provider runs as a child process and speaks line-delimited
//! JSON-RPC 2.0 over its stdin and stdout. Its stderr is forwarded to the log.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidings_core::config::{BridgeConfig, ProviderConfig};
//! use tidings_core::mcp::McpBridge;
//!
//! let provider = ProviderConfig::new("python", vec!["mcp_server.py".into()]);
//! let bridge = McpBridge::start(BridgeConfig::for_provider(provider))?;
//!
//! let emails = bridge.call_tool("get_recent_emails", json!({"hours": 24})).await?;
//! bridge.shutdown().await;
//! ```

pub mod bridge;
pub mod codec;
pub mod correlator;
pub mod error;
pub mod notification;
pub mod protocol;
pub mod readiness;
pub mod supervisor;
pub mod types;

pub use bridge::McpBridge;
pub use codec::FrameCodec;
pub use correlator::{CallOutcome, Correlator, PendingCall, PendingSlot};
pub use error::McpError;
pub use notification::{LoggingNotificationHandler, NotificationHandler};
pub use protocol::{McpMessage, McpNotification, McpRequest, McpResponse, McpRpcError, RequestId};
pub use readiness::{Readiness, ReadinessState};
pub use supervisor::{ProcessControl, ProcessEvent, ProcessHandle, ProcessSupervisor};
pub use types::{InitializeResult, McpServerInfo, McpTool};
