//! Tidings CLI application
//!
//! Drives a stdio tool provider from the command line.
//!
//! ```bash
//! tidings --command python --arg mcp_server.py tools
//! tidings call get_recent_emails --args '{"hours": 24}'
//! tidings status
//! ```
//!
//! Logs go to stderr so that results printed on stdout stay valid JSON.

mod args;
mod commands;
mod console;
mod router;

use clap::Parser;
use tidings_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = router::resolve_config(&cli)?;

    init_logging(&config.logging);

    router::route(cli, config).await
}

/// Install the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}
