/// CLI configuration
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Sent as `X-API-Key`; empty when the backend runs without keys
    #[serde(default)]
    pub api_key: String,

    /// Volume grants live here
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Local database copy and temporary downloads
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            api_key: String::new(),
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl CliConfig {
    /// Load `flashtune.toml` (or `path`) overlaid with `FLASHTUNE_CLI__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("flashtune.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("FLASHTUNE_CLI")
                .prefix_separator("__")
                .separator("__"),
        );

        settings
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Where downloads are staged before they are copied to the volume
    pub fn temp_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("flashtune"))
        .unwrap_or_else(|| PathBuf::from(".flashtune"))
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("flashtune"))
        .unwrap_or_else(|| PathBuf::from(".flashtune/cache"))
}
