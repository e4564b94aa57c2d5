//! Status command implementation

use crate::console::CliConsole;
use anyhow::Context;
use tidings_core::{BridgeConfig, McpBridge};

/// Start the provider, wait for the handshake and report what happened
pub async fn run(console: &CliConsole, config: BridgeConfig) -> anyhow::Result<()> {
    let bridge = McpBridge::start(config).context("starting provider")?;
    let readiness = bridge.wait_until_ready().await;

    console.print_header("Provider Status");
    let provider = &bridge.config().provider;
    console.print_field("Command", &provider.command);
    console.print_field("Arguments", &provider.args.join(" "));
    console.print_field(
        "PID",
        &bridge.pid().map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
    );
    console.print_field("State", &bridge.state().to_string());

    if let Some(info) = bridge.server_info() {
        console.print_field("Server", &info.server_info.name);
        console.print_field("Server version", &info.server_info.version);
        console.print_field(
            "Protocol",
            info.protocol_version.as_deref().unwrap_or("unknown"),
        );
    }

    let outcome = match readiness {
        Ok(()) => match bridge.list_tools().await {
            Ok(tools) => {
                console.print_field("Tools", &tools.len().to_string());
                Ok(())
            }
            Err(e) => {
                console.warn(&format!("Ready, but listing tools failed: {}", e));
                Ok(())
            }
        },
        Err(e) => Err(e).context("provider did not become ready"),
    };

    bridge.shutdown().await;
    if outcome.is_ok() {
        console.success("Provider is healthy");
    }
    outcome
}
