//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: which
//! backend to talk to, HTTP timeouts, mock backend behavior and the last
//! subject id used to sign in.
//!
//! Configuration is stored at `~/.config/simpay/config.json`. The
//! `SIMPAY_BACKEND` and `SIMPAY_API_URL` environment variables override it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "simpay";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable selecting the backend (`mock` or `http`)
pub const BACKEND_ENV: &str = "SIMPAY_BACKEND";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "SIMPAY_API_URL";

/// Which gateway implementation the client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process `MockBackend`
    #[default]
    Mock,
    /// `ApiClient` against `api_base_url`
    Http,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "http" => Ok(Backend::Http),
            other => Err(anyhow::anyhow!("unknown backend '{}', expected 'mock' or 'http'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub mock_min_latency_ms: u64,
    pub mock_max_latency_ms: u64,
    /// Fraction of mock feed fetches that fail, 0.0..=1.0
    pub mock_feed_failure_rate: f64,
    pub last_subject_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            mock_min_latency_ms: 500,
            mock_max_latency_ms: 1500,
            mock_feed_failure_rate: 0.1,
            last_subject_id: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides. Invalid values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(BACKEND_ENV).ok(),
            std::env::var(API_URL_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, backend: Option<String>, api_url: Option<String>) {
        if let Some(raw) = backend {
            match raw.parse() {
                Ok(backend) => self.backend = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", BACKEND_ENV),
            }
        }
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn mock_latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.mock_min_latency_ms),
            Duration::from_millis(self.mock_max_latency_ms),
        )
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"backend":"http","last_subject_id":"teste@simpay.com"}"#)
                .expect("parse config");
        assert_eq!(config.backend, Backend::Http);
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.last_subject_id.as_deref(), Some("teste@simpay.com"));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("HTTP".into()), Some("http://10.0.2.2:3000/mock".into()));
        assert_eq!(config.backend, Backend::Http);
        assert_eq!(config.api_base_url, "http://10.0.2.2:3000/mock");

        config.apply_overrides(Some("carrier-pigeon".into()), Some("  ".into()));
        assert_eq!(config.backend, Backend::Http);
        assert_eq!(config.api_base_url, "http://10.0.2.2:3000/mock");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("mock".parse::<Backend>().unwrap(), Backend::Mock);
        assert!("grpc".parse::<Backend>().is_err());
    }
}
