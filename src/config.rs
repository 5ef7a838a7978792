use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default = "default_store_config")]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    /// Bot token (xoxb-...) used for Web API calls
    pub bot_token: String,
    /// App-level token (xapp-...) required for Socket Mode
    pub app_token: String,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

fn default_bot_name() -> String {
    "norrisbot".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/norrisbot.db")
}

fn default_store_config() -> StoreConfig {
    StoreConfig {
        database_path: default_db_path(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
