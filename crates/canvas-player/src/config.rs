//! Configuration loading and parsing.
//!
//! A single TOML file carries the player options, the HTTP transport settings
//! and the headless decoder profile. Every section is optional.

use std::path::Path;

use anyhow::{Context, Result, bail};
use canvas_player_types::PlayerOptions;
use serde::Deserialize;

use crate::headless::HeadlessConfig;
use crate::http_transport::HttpTransportConfig;

/// Top-level player configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Widget options (`[player]`).
    pub player: PlayerOptions,
    /// Network settings (`[http]`).
    pub http: HttpTransportConfig,
    /// Headless decoder profile (`[headless]`).
    pub headless: HeadlessConfig,
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = Self::parse(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let cfg = toml::from_str::<PlayerConfig>(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.player.chunk_size == 0 {
            bail!("player.chunk_size must be greater than zero");
        }
        if self.http.read_chunk == 0 {
            bail!("http.read_chunk must be greater than zero");
        }
        Ok(())
    }
}
