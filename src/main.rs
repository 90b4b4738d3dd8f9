//! # docsift server binary
//!
//! ```bash
//! docsift --config ./config/docsift.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsift serve` | Start the HTTP server and the expiry sweeper |
//! | `docsift check` | Validate a configuration file and exit |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsift::config::load_config;
use docsift::server::run_server;

/// Ephemeral session-scoped document retrieval store.
#[derive(Parser)]
#[command(name = "docsift", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "docsift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve,
    /// Validate the configuration file and exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Serve => run_server(&config).await,
        Command::Check => {
            println!("config ok: {}", cli.config.display());
            Ok(())
        }
    }
}
