use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow, bail};

pub const DEFAULT_SERVER: &str = "http://localhost:9000";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub server: Option<String>,
    pub api_token: Option<String>,
    pub access_token: Option<String>,
    pub integration_id: Option<String>,
    pub default_assistant: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            server: Some(DEFAULT_SERVER.to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Environment variables win over the config file
    pub fn with_env_overrides(self) -> Self {
        self.apply_env(|key| std::env::var(key).ok())
    }

    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(server) = lookup("COCO_SERVER") {
            self.server = Some(server);
        }
        if let Some(token) = lookup("COCO_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(token) = lookup("COCO_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(id) = lookup("COCO_INTEGRATION_ID") {
            self.integration_id = Some(id);
        }
        self
    }

    pub fn server_url(&self) -> &str {
        self.server.as_deref().unwrap_or(DEFAULT_SERVER)
    }

    /// Set a field by its config-file name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            "server" => &mut self.server,
            "api_token" => &mut self.api_token,
            "access_token" => &mut self.access_token,
            "integration_id" => &mut self.integration_id,
            "default_assistant" => &mut self.default_assistant,
            other => bail!("Unknown config key: {}", other),
        };
        *slot = if value.is_empty() { None } else { Some(value.to_string()) };
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("coco-chat").join("config.json"))
    }
}
