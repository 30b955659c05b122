// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! vktg - relay between a VK account and Telegram chats.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use vktg_config::validation::validate_for_serve;
use vktg_config::{ConfigError, VktgConfig};

/// vktg - relay between a VK account and Telegram chats.
#[derive(Parser, Debug)]
#[command(name = "vktg", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the relay (default).
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum ConfigCommands {
    /// Validate configuration and print diagnostics.
    Check,
}

fn load(path: Option<&Path>) -> Result<VktgConfig, Vec<ConfigError>> {
    match path {
        Some(path) => vktg_config::load_and_validate_path(path),
        None => vktg_config::load_and_validate(),
    }
}

/// Loads the configuration plus the keys `serve` cannot run without.
fn load_for_serve(path: Option<&Path>) -> Result<VktgConfig, Vec<ConfigError>> {
    let config = load(path)?;
    validate_for_serve(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = match load_for_serve(path) {
                Ok(config) => config,
                Err(errors) => {
                    vktg_config::render_errors(&errors);
                    std::process::exit(1);
                }
            };
            serve::run_serve(config).await.into_diagnostic()
        }
        Commands::Config {
            action: ConfigCommands::Check,
        } => match load_for_serve(path) {
            Ok(config) => {
                println!(
                    "vktg: config ok (database={}, read_notifications={:?})",
                    config.storage.database_path, config.telegram.read_notification_mode
                );
                Ok(())
            }
            Err(errors) => {
                vktg_config::render_errors(&errors);
                std::process::exit(1);
            }
        },
    }
}
