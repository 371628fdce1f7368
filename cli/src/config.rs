use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

/// Display preferences from `~/.ghpulse.toml`. Credentials never live here.
#[derive(Debug, Default, Deserialize)]
pub struct GhpulseConfig {
    pub json: Option<bool>,
    pub authors: Option<bool>,
    pub color: Option<bool>,
}

pub fn load() -> GhpulseConfig {
    match try_load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("ignoring ~/.ghpulse.toml: {e:#}");
            GhpulseConfig::default()
        }
    }
}

fn try_load() -> Result<GhpulseConfig> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME not set"))?;
    let config_path = home.join(".ghpulse.toml");
    if !config_path.exists() {
        return Ok(GhpulseConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: GhpulseConfig = toml::from_str(&content)?;
    Ok(config)
}
