//! Runtime configuration.
//!
//! Everything has a default so the app runs without a config file. A JSON file can
//! override any subset of fields, and the command line overrides the file. The chat
//! API key is never part of the defaults: it comes from the file, `--api-key` or the
//! `QQVFP_API_KEY` environment variable.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ROUTE_URL: &str = "https://route.hkrscoc.com/api.php";
pub const DEFAULT_AIRAC_CYCLE: &str = "2506";
pub const DEFAULT_CHAT_URL: &str = "https://api.vveai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub route: RouteConfig,
    pub chat: ChatConfig,
    /// Upper bound for a whole fetch request, in seconds
    pub request_timeout_secs: u64,
    pub servers: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub base_url: String,
    pub airac_cycle: String,
    /// Directory under which `way/` and `file/` are created
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
}

/// Contents of the server information page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub teamspeak: String,
    pub multiplayer_server: String,
    pub administrator: String,
    pub register_url: String,
    pub community_group: String,
    pub status: String,
    pub banner: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            chat: ChatConfig::default(),
            request_timeout_secs: 30,
            servers: ServerInfo::default(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ROUTE_URL.to_string(),
            airac_cycle: DEFAULT_AIRAC_CYCLE.to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_CHAT_URL.to_string(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.7,
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            teamspeak: "39688.cn".to_string(),
            multiplayer_server: "39688.cn".to_string(),
            administrator: "1234".to_string(),
            register_url: "https://39688.cn".to_string(),
            community_group: "878365469".to_string(),
            status: "Online".to_string(),
            banner: "Servers are running normally, welcome aboard!".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                let config: AppConfig = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?;
                debug!("Loaded config from {}", path.display());
                config
            }
            None => AppConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        if self.route.airac_cycle.trim().is_empty() {
            anyhow::bail!("route.airac_cycle must not be empty");
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            anyhow::bail!("chat.temperature must be between 0 and 2");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
