//! MCP type definitions

use super::error::McpError;
use super::protocol::MCP_PROTOCOL_VERSION;
use crate::config::ClientIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client information sent during initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        ClientIdentity::default().into()
    }
}

impl From<ClientIdentity> for ClientInfo {
    fn from(identity: ClientIdentity) -> Self {
        Self {
            name: identity.name,
            version: identity.version,
        }
    }
}

/// Client capabilities announced in the handshake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Tool support (empty object means "supported")
    #[serde(default)]
    pub tools: Value,
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version
    pub protocol_version: String,
    /// Client capabilities
    pub capabilities: ClientCapabilities,
    /// Client info
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Build handshake parameters for the given client identity
    pub fn new(client: &ClientIdentity) -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                tools: Value::Object(serde_json::Map::new()),
            },
            client_info: client.clone().into(),
        }
    }
}

/// Server information returned after initialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerInfo {
    /// Server name
    #[serde(default)]
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: String,
}

/// Result of the `initialize` request.
///
/// Every field is optional: a bare `{}` result still completes the handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version chosen by the server
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Server capabilities, kept opaque
    #[serde(default)]
    pub capabilities: Value,
    /// Server info
    #[serde(default)]
    pub server_info: McpServerInfo,
    /// Free-form usage instructions
    #[serde(default)]
    pub instructions: Option<String>,
}

/// MCP tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: Option<String>,
    /// Input schema (JSON Schema)
    #[serde(default)]
    pub input_schema: Value,
}

/// Unwrap a `tools/call` result.
///
/// Providers put the tool's return value under `structuredContent` when they
/// have one; that value is returned directly. A result flagged `isError` is
/// turned into a [`McpError::RemoteTool`] carrying the text content. Anything
/// else is passed through untouched.
pub fn unwrap_tool_result(result: Value) -> Result<Value, McpError> {
    let Value::Object(mut fields) = result else {
        return Ok(result);
    };

    if fields.get("isError").and_then(Value::as_bool) == Some(true) {
        let message = text_content(fields.get("content"))
            .unwrap_or_else(|| "tool reported an error".to_string());
        return Err(McpError::RemoteTool {
            code: 0,
            message,
            data: fields.remove("structuredContent"),
        });
    }

    match fields.remove("structuredContent") {
        Some(structured) => Ok(structured),
        None => Ok(Value::Object(fields)),
    }
}

/// Join the text blocks of a `content` array
fn text_content(content: Option<&Value>) -> Option<String> {
    let texts: Vec<&str> = content?
        .as_array()?
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
