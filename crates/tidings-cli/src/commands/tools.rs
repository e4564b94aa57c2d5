//! Tools command implementation

use super::start_bridge;
use crate::console::CliConsole;
use tidings_core::BridgeConfig;

/// List the tools the provider exposes
pub async fn run(console: &CliConsole, config: BridgeConfig) -> anyhow::Result<()> {
    let bridge = start_bridge(console, config).await?;
    let tools = bridge.list_tools().await;
    bridge.shutdown().await;
    let tools = tools?;

    console.print_header("Provider Tools");
    console.print_table_header(&["Tool Name", "Description"]);
    for tool in &tools {
        let description = tool.description.as_deref().unwrap_or("");
        let summary = description.lines().next().unwrap_or("");
        console.print_table_row(&[tool.name.as_str(), summary]);
    }

    println!();
    console.success(&format!("Total tools available: {}", tools.len()));
    Ok(())
}
