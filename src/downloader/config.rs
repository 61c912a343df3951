// Client configuration
//
// Defaults match the development backend. Environment overrides:
//   MEDIA_API_URL                base URL of the extraction backend
//   MEDIA_API_PROXY              HTTP/SOCKS proxy (e.g. "socks5h://127.0.0.1:1080")
//   MEDIA_PROGRESS_TIMEOUT_SECS  inactivity window for the progress stream
//   MEDIA_OUTPUT_DIR             where saved artifacts land

use std::path::PathBuf;
use std::time::Duration;

use super::endpoints::Endpoints;
use super::errors::ConfigError;

pub const ENV_BASE_URL: &str = "MEDIA_API_URL";
pub const ENV_PROXY: &str = "MEDIA_API_PROXY";
pub const ENV_PROGRESS_TIMEOUT: &str = "MEDIA_PROGRESS_TIMEOUT_SECS";
pub const ENV_OUTPUT_DIR: &str = "MEDIA_OUTPUT_DIR";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the extraction backend
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout for `/extract` (the server runs yt-dlp synchronously)
    pub request_timeout: Duration,
    /// Longest gap tolerated between two progress payloads
    pub inactivity_timeout: Duration,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Directory for saved artifacts
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            inactivity_timeout: Duration::from_secs(60),
            proxy: None,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the `MEDIA_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }

        if let Some(proxy) = lookup(ENV_PROXY) {
            let proxy = proxy.trim();
            config.proxy = (!proxy.is_empty()).then(|| proxy.to_string());
        }

        if let Some(raw) = lookup(ENV_PROGRESS_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_PROGRESS_TIMEOUT.to_string(),
                    value: raw.clone(),
                })?;
            config.inactivity_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }

        config.endpoints()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::parse(&self.base_url)
    }
}
