//! CLI console utilities

use colored::*;

/// Console for human-readable output. Results meant for machines are
/// printed with [`CliConsole::json`] and never decorated.
pub struct CliConsole {
    verbose: bool,
}

impl CliConsole {
    /// Create a new CLI console
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print an info message (verbose only)
    pub fn info(&self, message: &str) {
        if self.verbose {
            eprintln!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green().bold(), message.green());
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    /// Print a header
    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }

    /// Print a key/value line
    pub fn print_field(&self, key: &str, value: &str) {
        println!("  {:<18} {}", format!("{}:", key).bold(), value);
    }

    /// Print a table row
    pub fn print_table_row(&self, columns: &[&str]) {
        let row = columns
            .iter()
            .map(|col| format!("{:<28}", col))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", row);
    }

    /// Print a table header with an underline
    pub fn print_table_header(&self, headers: &[&str]) {
        self.print_table_row(headers);
        println!("{}", "-".repeat(headers.len() * 29).dimmed());
    }

    /// Print a JSON value as pretty-printed text on stdout
    pub fn json(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
