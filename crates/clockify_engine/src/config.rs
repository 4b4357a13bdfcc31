//! Startup configuration: credentials, transport limits and the access roster.
//!
//! Values are read once, at startup, into plain structs that are then passed
//! to constructors. Nothing below the binary reads the environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clockify_core::Roster;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.clockify.me/api/v1";

pub const API_KEY_VAR: &str = "CLOCKIFY_API_KEY";
pub const WORKSPACE_VAR: &str = "CLOCKIFY_WORKSPACE_ID";
pub const BASE_URL_VAR: &str = "CLOCKIFY_BASE_URL";
pub const APPROVE_VAR: &str = "APPROVE_CHANGES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid base url {url}: {message}")]
    BaseUrl { url: String, message: String },
    #[error("could not read roster {path:?}: {source}")]
    RosterIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse roster {path:?}: {message}")]
    RosterFormat { path: PathBuf, message: String },
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub workspace_id: String,
    pub base_url: String,
    pub transport: TransportSettings,
}

// Keep the key out of logs.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"***")
            .field("workspace_id", &self.workspace_id)
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            workspace_id: workspace_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            transport: TransportSettings::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportSettings) -> Self {
        self.transport = transport;
        self
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_key = read(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let workspace_id = read(WORKSPACE_VAR).ok_or(ConfigError::Missing(WORKSPACE_VAR))?;
        let config = Self::new(api_key, workspace_id);
        let config = match read(BASE_URL_VAR) {
            Some(base_url) => config.with_base_url(base_url),
            None => config,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(API_KEY_VAR));
        }
        if self.workspace_id.trim().is_empty() {
            return Err(ConfigError::Missing(WORKSPACE_VAR));
        }
        url::Url::parse(&self.base_url).map_err(|err| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            message: err.to_string(),
        })?;
        Ok(())
    }
}

/// Changes are applied only when `APPROVE_CHANGES` is `true`, `1` or `yes`.
pub fn changes_approved(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(APPROVE_VAR)
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

pub fn load_roster(path: &Path) -> Result<Roster, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::RosterIo {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|err| ConfigError::RosterFormat {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = ApiConfig::from_lookup(lookup(&[(WORKSPACE_VAR, "ws1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_KEY_VAR)));
        let err = ApiConfig::from_lookup(lookup(&[(API_KEY_VAR, "k"), (WORKSPACE_VAR, " ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(WORKSPACE_VAR)));
    }

    #[test]
    fn base_url_override_is_validated() {
        let config = ApiConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "secret"),
            (WORKSPACE_VAR, "ws1"),
            (BASE_URL_VAR, "http://localhost:9000/api"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/api");
        assert!(!format!("{config:?}").contains("secret"));

        let err = ApiConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "secret"),
            (WORKSPACE_VAR, "ws1"),
            (BASE_URL_VAR, "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::BaseUrl { .. }));
    }

    #[test]
    fn approval_defaults_to_dry_run() {
        assert!(!changes_approved(lookup(&[])));
        assert!(!changes_approved(lookup(&[(APPROVE_VAR, "false")])));
        assert!(changes_approved(lookup(&[(APPROVE_VAR, "TRUE")])));
    }
}
