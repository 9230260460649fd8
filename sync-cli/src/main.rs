//! # chat-sync
//!
//! CLI harness for the chat-sync engine.
//!
//! ## Commands
//!
//! - `replay`: Run a connectivity/remote scenario script against the engine
//! - `cache show`: Print the cached snapshot
//! - `cache clear`: Drop the cached snapshot
//!
//! ## Example
//!
//! ```bash
//! # Replay a scenario, caching into the data directory
//! chat-sync --data-dir ./data replay scenario.txt
//!
//! # Inspect what the engine would show offline
//! chat-sync --data-dir ./data cache show
//! ```
//!
//! Set `RUST_LOG=chat_sync_client=debug` to see the engine's decisions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{cache, replay};
use config::AppConfig;

/// CLI harness for the chat-sync engine.
#[derive(Parser, Debug)]
#[command(name = "chat-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding chat-sync.toml and the cache
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/chat-sync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario script against the engine
    Replay {
        /// Script file, one step per line
        script: PathBuf,
    },

    /// Inspect or clear the cached snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print the cached snapshot
    Show,
    /// Remove the cached snapshot
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let app = AppConfig::load(&data_dir, cli.config.as_deref())?;
    debug!(
        data_dir = %data_dir.display(),
        cache_dir = %app.cache_dir().display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Replay { script } => {
            let contents = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            replay::run(&app, &contents).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Show => cache::show(&app).await?,
            CacheAction::Clear => cache::clear(&app).await?,
        },
    }

    Ok(())
}

/// Get the default data directory for chat-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "chat-sync", "chat-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
