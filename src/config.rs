use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Most items returned by `GET /api/news`
    #[serde(default = "default_news_limit")]
    pub news_limit: i64,
    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default)]
    pub digest: DigestConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_database_url() -> String {
    "sqlite:ml_digest.db?mode=rwc".to_string()
}

fn default_news_limit() -> i64 {
    50
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    #[default]
    Database,
    Remote,
    Static,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    #[serde(default)]
    pub mode: DigestMode,
    /// News-listing endpoint for remote mode
    #[serde(default)]
    pub news_url: Option<String>,
    /// Directory of `YYYY-MM-DD.json` files for static mode
    #[serde(default = "default_digest_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            mode: DigestMode::default(),
            news_url: None,
            dir: default_digest_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_digest_dir() -> PathBuf {
    PathBuf::from("digests")
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::from_str("");
        }
        Self::load(path)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `DATABASE_URL` wins over the file, as in most deployments.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        self
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.news_limit <= 0 {
            anyhow::bail!("news_limit must be positive");
        }
        if self.digest.mode == DigestMode::Remote && self.digest.news_url.is_none() {
            anyhow::bail!("digest.news_url is required in remote mode");
        }
        Ok(())
    }
}
