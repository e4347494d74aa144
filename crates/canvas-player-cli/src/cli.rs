use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "canvas-player", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML config with [player], [http] and [headless] sections
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    pub timeout: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a media resource and write it to a file (or stdout)
    Fetch {
        /// Resource URL
        url: String,

        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Drive a player session against an in-memory document and print its final state
    Simulate {
        /// Resource URL
        url: String,

        /// Serve the URL from a local file instead of the network
        #[arg(long)]
        file: Option<PathBuf>,

        /// Start playback as soon as the media is loaded
        #[arg(long)]
        autoplay: bool,

        /// Treat the resource as a live stream
        #[arg(long)]
        streaming: bool,

        /// Poster image shown until first play
        #[arg(long)]
        poster: Option<String>,

        /// Disable click-to-toggle and the play button
        #[arg(long)]
        no_control: bool,

        /// Clicks to dispatch on the wrapper once the media settles
        #[arg(long, default_value_t = 0)]
        clicks: u32,

        /// Dispatch a touchstart on the unlock trigger before clicking
        #[arg(long)]
        touch: bool,
    },
}
