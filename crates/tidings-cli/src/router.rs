//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands;
use crate::console::CliConsole;
use anyhow::Context;
use tidings_core::config::{BridgeConfig, load_config};

/// Load the configuration file and apply command-line overrides
pub fn resolve_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = load_config(Some(cli.config.as_path()))
        .with_context(|| format!("loading configuration from '{}'", cli.config.display()))?;

    if let Some(command) = &cli.command {
        config.provider.command = command.clone();
    }
    if !cli.provider_args.is_empty() {
        config.provider.args = cli.provider_args.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli, config: BridgeConfig) -> anyhow::Result<()> {
    let console = CliConsole::new(cli.verbose);

    match cli.command_kind {
        Commands::Call {
            tool,
            args,
            timeout,
        } => commands::call::run(&console, config, &tool, &args, timeout).await,
        Commands::Tools => commands::tools::run(&console, config).await,
        Commands::Status => commands::status::run(&console, config).await,
    }
}
