//! CLI argument definitions using clap
//!
//! - tidings call <tool> [--args <json>]   # Invoke one tool
//! - tidings tools                         # List provider tools
//! - tidings status                        # Handshake and report readiness

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidings_core::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(name = "tidings")]
#[command(about = "Tidings - bridge to stdio tool providers")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Provider executable, overrides the configuration file
    #[arg(long, global = true)]
    pub command: Option<String>,

    /// Provider argument, repeatable; replaces the configured arguments
    #[arg(long = "arg", global = true, allow_hyphen_values = true)]
    pub provider_args: Vec<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command_kind: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Invoke a tool and print its result as JSON
    Call {
        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Timeout in seconds, overrides the configured request timeout
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List the tools the provider exposes
    Tools,

    /// Start the provider, complete the handshake and report its state
    Status,
}
