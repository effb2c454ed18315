// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod audio;
mod clips;
mod config;
mod controller;
mod error;
mod feedback;
mod filter;
mod player;
mod process;
mod recorder;
#[cfg(test)]
mod testutil;
mod util;

use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=ohrgarten audio installation
After=sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/ohrgarten
ExecStart=/usr/local/bin/ohrgarten start "$OHRGARTEN_CONFIG"
KillSignal=SIGINT

[Install]
WantedBy=multi-user.target
Alias=ohrgarten.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An interactive audio installation."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will run the installation until interrupted.
    Start {
        /// The path to the installation config.
        config_path: String,
    },
    /// Lists the stored clips in playback order.
    Clips {
        /// The path to the installation config.
        config_path: String,
    },
    /// Deletes one stored clip.
    Remove {
        /// The path to the installation config.
        config_path: String,
        /// The clip's file name, as printed by the clips command.
        clip_name: String,
    },
    /// Deletes every stored clip.
    Reset {
        /// The path to the installation config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let mut running = config::init_installation(&PathBuf::from(config_path))?;

            let mut code = 0;
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Interrupted.");
                }
                result = running.controller.join() => {
                    match result {
                        Ok(()) => info!("Buttons closed."),
                        Err(e) => {
                            error!(err = e.to_string(), "Controller stopped unexpectedly.");
                            code = 1;
                        }
                    }
                }
            }

            info!(clips = running.store.len(), "Stopping the installation.");
            running.shutdown();
            // The keyboard driver may still be blocked reading stdin, which would keep the
            // runtime from shutting down.
            std::process::exit(code);
        }
        Commands::Clips { config_path } => {
            let store = config::init_store(&PathBuf::from(config_path))?;
            let clips = store.list();
            if clips.is_empty() {
                println!("No clips in {}.", store.dir().display());
            }
            for (i, clip) in clips.iter().enumerate() {
                println!(
                    "{:>4}. {} ({})",
                    i + 1,
                    clip.name(),
                    clip.created_at().format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Remove {
            config_path,
            clip_name,
        } => {
            let store = config::init_store(&PathBuf::from(config_path))?;
            match store.remove(&store.dir().join(&clip_name))? {
                Some(clip) => println!("Removed {}.", clip),
                None => return Err(format!("no clip named {}", clip_name).into()),
            }
        }
        Commands::Reset { config_path } => {
            let store = config::init_store(&PathBuf::from(config_path))?;
            let report = store.reset();
            println!("Deleted {} clip(s).", report.deleted.len());
            for failure in &report.failures {
                println!("Failed: {}", failure);
            }
            if !report.failures.is_empty() {
                return Err(format!("{} clip(s) could not be deleted", report.failures.len()).into());
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
