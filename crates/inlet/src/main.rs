// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inlet - multi-tenant inbound message ingestion service.
//!
//! Binary entry point: receives webhooks from WhatsApp, Instagram,
//! Facebook, and TikTok, normalizes and persists them, and schedules
//! AI-response work.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use inlet_config::InletConfig;

/// Inlet - multi-tenant inbound message ingestion service.
#[derive(Parser, Debug)]
#[command(name = "inlet", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path (skips the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook ingestion server.
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load_config(cli: &Cli) -> InletConfig {
    let result = match &cli.config {
        Some(path) => inlet_config::load_config_from_path(path)
            .map_err(|e| vec![inlet_config::ConfigError::Parse(e.to_string())])
            .and_then(|config| {
                inlet_config::validation::validate_config(&config)?;
                Ok(config)
            }),
        None => inlet_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            for error in &errors {
                eprintln!("inlet: {error}");
            }
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("inlet: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "inlet: config ok (server {}:{}, db {})",
                config.server.host, config.server.port, config.storage.database_path
            );
        }
    }
}
