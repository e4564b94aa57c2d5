//! Call command implementation

use super::start_bridge;
use crate::console::CliConsole;
use anyhow::{Context, bail};
use serde_json::Value;
use std::time::Duration;
use tidings_core::BridgeConfig;

/// Invoke one tool and print its result
pub async fn run(
    console: &CliConsole,
    config: BridgeConfig,
    tool: &str,
    args: &str,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let arguments = parse_arguments(args)?;
    let bridge = start_bridge(console, config).await?;

    let bound = timeout
        .map(Duration::from_secs)
        .unwrap_or(bridge.config().request_timeout);
    let outcome = bridge.call_tool_with_timeout(tool, arguments, bound).await;
    bridge.shutdown().await;

    let result = outcome.with_context(|| format!("calling tool '{}'", tool))?;
    console.json(&result)
}

fn parse_arguments(args: &str) -> anyhow::Result<Value> {
    let arguments: Value =
        serde_json::from_str(args).with_context(|| format!("--args is not valid JSON: {}", args))?;
    if !arguments.is_object() {
        bail!("--args must be a JSON object, got: {}", args);
    }
    Ok(arguments)
}
