use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use crate::spotify_rs::auth::SpotifyApiCredentials;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    /// Where OAuth tokens are cached between runs
    #[serde(default)]
    token_cache: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

/// Values given on the command line or through the environment; they win over the file
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("spotify-relinker").join("config.toml"))
    }

    /// Load the default config file, or an empty config when there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if overrides.client_id.is_some() {
            self.client_id = overrides.client_id;
        }
        if overrides.client_secret.is_some() {
            self.client_secret = overrides.client_secret;
        }
        if overrides.redirect_uri.is_some() {
            self.redirect_uri = overrides.redirect_uri;
        }
        self
    }

    pub fn credentials(&self) -> Result<SpotifyApiCredentials> {
        let missing = |name: &str| {
            let location = Self::config_path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config.toml".to_string());
            eyre!(
                "Missing Spotify {}. Set it in {} or pass it via the command line/environment.",
                name,
                location
            )
        };

        let client_id = self
            .client_id
            .clone()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| missing("client_id"))?;
        let client_secret = self
            .client_secret
            .clone()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| missing("client_secret"))?;

        Ok(SpotifyApiCredentials {
            client_id,
            client_secret,
            redirect_uri: self
                .redirect_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        })
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn token_cache_path(&self) -> PathBuf {
        match &self.token_cache {
            Some(path) => self.expand_path(path),
            None => dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("spotify-relinker")
                .join("token.json"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
