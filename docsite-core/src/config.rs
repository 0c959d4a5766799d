use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deploy::DeploymentDescriptor;
use crate::links::DEFAULT_CONTENT_PREFIX;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub content: ContentConfig,
    pub navigation: NavigationConfig,
    pub deploy: DeploymentDescriptor,
    /// Set by the preview server only; never read from disk.
    #[serde(skip)]
    pub live_reload: Option<LiveReload>,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        Ok(config)
    }

    /// Switch on live reload so rendered pages connect back to the preview
    /// server at `host:port`.
    pub fn dev(&mut self, host: String, port: u16) {
        self.live_reload = Some(LiveReload { host, port });
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Documentation".to_string(),
            description: None,
            base_url: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    /// Root-relative prefix of internal links, e.g. `/content/`.
    pub prefix: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CONTENT_PREFIX.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Categories shown first in the sidebar, in this order.
    pub categories: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LiveReload {
    pub host: String,
    pub port: u16,
}

impl LiveReload {
    pub fn url(&self) -> String {
        format!("ws://{}:{}/__livereload", self.host, self.port)
    }
}
