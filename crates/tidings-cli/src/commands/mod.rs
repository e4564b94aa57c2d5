//! CLI command implementations

pub mod call;
pub mod status;
pub mod tools;

use crate::console::CliConsole;
use anyhow::Context;
use tidings_core::{BridgeConfig, McpBridge};

/// Spawn the provider and wait for the handshake to complete
pub async fn start_bridge(console: &CliConsole, config: BridgeConfig) -> anyhow::Result<McpBridge> {
    console.info(&format!(
        "Starting provider: {} {}",
        config.provider.command,
        config.provider.args.join(" ")
    ));

    let bridge = McpBridge::start(config).context("starting provider")?;
    if let Err(e) = bridge.wait_until_ready().await {
        bridge.shutdown().await;
        return Err(e).context("provider did not become ready");
    }

    console.info("Provider ready");
    Ok(bridge)
}
