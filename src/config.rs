use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://hunyuan.tencent.com/api";
pub const DEFAULT_MODEL: &str = "gpt_175B_0404";
pub const DEFAULT_PLUGIN: &str = "Adaptive";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API root, without a trailing slash
    pub base_url: String,

    /// Model name sent with every chat request
    pub model: String,

    /// Plugin name sent with every chat request
    pub plugin: String,

    /// File holding the raw `Cookie` header value
    pub cookie_file: Option<PathBuf>,

    /// Start a fresh conversation when the active one is full
    pub auto_rollover: bool,

    /// Repaint answers while they stream in
    pub stream: bool,

    /// HTTP identity
    pub http: HttpConfig,
}

/// Headers and connection settings for the API client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    /// Applies to connection setup only; reads are never timed out
    pub connect_timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0".to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6".to_string(),
            connect_timeout_secs: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            plugin: DEFAULT_PLUGIN.to_string(),
            cookie_file: None,
            auto_rollover: true,
            stream: true,
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Default location: `~/.hunyuan/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".hunyuan").join("config.toml"))
    }

    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Read the cookie header value from the configured file
    pub fn read_cookie(&self) -> Result<String> {
        let path = self
            .cookie_file
            .as_ref()
            .context("Please specify the path to the cookie file (--cookie-file)")?;
        let cookie = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cookie file {}", path.display()))?;
        Ok(cookie.trim_end_matches(['\r', '\n']).to_string())
    }
}
