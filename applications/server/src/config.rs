/// Server configuration
use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the requested locator in tool arguments
pub const URL_PLACEHOLDER: &str = "{url}";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub extractor: ExtractorSettings,

    #[serde(default)]
    pub transcoder: TranscoderSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthSettings {
    /// Accepted `X-API-Key` values; empty disables the check
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Media extractor (yt-dlp or compatible)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorSettings {
    #[serde(default = "default_extractor_program")]
    pub program: String,

    /// Arguments for streaming the best audio track to stdout
    #[serde(default = "default_download_args")]
    pub download_args: Vec<String>,

    /// Number of results requested per search
    #[serde(default = "default_search_results")]
    pub search_results: u32,
}

/// Transcoder reading the extractor's output on stdin and writing MP3
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderSettings {
    #[serde(default = "default_transcoder_program")]
    pub program: String,

    #[serde(default = "default_transcoder_args")]
    pub args: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from file and environment
    ///
    /// `path` defaults to `config.toml` in the working directory; a missing
    /// default file is fine, a missing explicit one is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. FLASHTUNE__SERVER__PORT=8080
        settings = settings.add_source(
            config::Environment::with_prefix("FLASHTUNE")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("auth.api_keys")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ServerError::Config("server.port must not be 0".to_string()));
        }

        if self.extractor.program.trim().is_empty() {
            return Err(ServerError::Config(
                "extractor.program is required".to_string(),
            ));
        }

        if self.transcoder.program.trim().is_empty() {
            return Err(ServerError::Config(
                "transcoder.program is required".to_string(),
            ));
        }

        if !self
            .extractor
            .download_args
            .iter()
            .any(|arg| arg.contains(URL_PLACEHOLDER))
        {
            return Err(ServerError::Config(format!(
                "extractor.download_args must contain the {} placeholder",
                URL_PLACEHOLDER
            )));
        }

        if self.extractor.search_results == 0 {
            return Err(ServerError::Config(
                "extractor.search_results must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// Default values
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            download_args: default_download_args(),
            search_results: default_search_results(),
        }
    }
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: default_transcoder_program(),
            args: default_transcoder_args(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_extractor_program() -> String {
    "yt-dlp".to_string()
}

fn default_download_args() -> Vec<String> {
    [
        "--quiet",
        "--no-warnings",
        "--no-playlist",
        "-f",
        "bestaudio",
        "-o",
        "-",
        "--",
        URL_PLACEHOLDER,
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_search_results() -> u32 {
    5
}

fn default_transcoder_program() -> String {
    "ffmpeg".to_string()
}

fn default_transcoder_args() -> Vec<String> {
    // VBR quality 0 is the highest libmp3lame setting
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-vn",
        "-codec:a",
        "libmp3lame",
        "-q:a",
        "0",
        "-f",
        "mp3",
        "pipe:1",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.extractor.program, "yt-dlp");
        assert_eq!(config.transcoder.program, "ffmpeg");
        assert!(config.auth.api_keys.is_empty());
        config.validate().unwrap();

        // Option parsing ends before the locator
        let args = &config.extractor.download_args;
        assert_eq!(args[args.len() - 2..], ["--", URL_PLACEHOLDER]);
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let mut config = ServerConfig::default();
        config.extractor.download_args = vec!["-o".to_string(), "-".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_program_rejected() {
        let mut config = ServerConfig::default();
        config.transcoder.program = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flashtune.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8088\n\n[auth]\napi_keys = [\"k1\", \"k2\"]\n\n[extractor]\nsearch_results = 3\n",
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.api_keys, vec!["k1", "k2"]);
        assert_eq!(config.extractor.search_results, 3);
        assert_eq!(config.transcoder.program, "ffmpeg");
    }
}
