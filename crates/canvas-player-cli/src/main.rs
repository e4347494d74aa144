//! canvas-player: command-line front end for the player shell.
//!
//! ## Modes
//! - `fetch`: acquire a resource over HTTP and write it out.
//! - `simulate`: run a full player session (headless decoder, in-memory
//!   document), replay gestures and print the lifecycle snapshot as JSON.

mod cli;
mod runtime;

use std::time::Duration;

use anyhow::{Result, bail};
use canvas_player::config::PlayerConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,canvas_player=info")
        }))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    if let Some(secs) = args.timeout {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--timeout must be a positive number of seconds");
        }
        config.http.timeout = Duration::from_secs_f64(secs);
    }

    let interrupted = runtime::install_interrupt_flag()?;

    match args.cmd {
        cli::Command::Fetch { url, out } => {
            runtime::run_fetch(&url, out.as_deref(), config.http, interrupted)
        }
        cli::Command::Simulate {
            url,
            file,
            autoplay,
            streaming,
            poster,
            no_control,
            clicks,
            touch,
        } => {
            let player = &mut config.player;
            player.autoplay |= autoplay;
            player.streaming |= streaming;
            if poster.is_some() {
                player.poster = poster;
            }
            if no_control {
                player.control = false;
            }
            runtime::run_simulate(
                runtime::SimulateConfig {
                    url,
                    file,
                    clicks,
                    touch,
                    config,
                },
                interrupted,
            )
        }
    }
}
