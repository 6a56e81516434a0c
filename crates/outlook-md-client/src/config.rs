//! Client configuration file.
//!
//! Read from `~/.config/outlook-md/config.toml` (platform config dir) unless
//! `--config` / `OUTLOOK_MD_CONFIG` points elsewhere. Every section is
//! optional and a missing default file means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use outlook_md_core::TracingOutputFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret;

/// Errors raised while reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot resolve [{section}] {key}: {message}")]
    Secret {
        section: &'static str,
        key: &'static str,
        message: String,
    },

    #[error("invalid [{section}] {key} '{value}': {message}")]
    InvalidUrl {
        section: &'static str,
        key: &'static str,
        value: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub auth: AuthSettings,
    pub calendar: CalendarSettings,
    pub logging: LoggingSettings,
}

/// `[auth]` section. `client_id` and `tenant_id` accept `env::` and `pass::`
/// references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// IANA zone name or `Local`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_base_url: Option<String>,
    pub skip_solo_events: bool,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            timeout: 30,
            graph_base_url: None,
            skip_solo_events: false,
        }
    }
}

impl CalendarSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: TracingOutputFormat,
}

impl ClientConfig {
    /// Loads the file at the default path, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads an explicitly named file. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks URL-valued settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("auth", "authority", self.auth.authority.as_deref())?;
        check_url("calendar", "graph_base_url", self.calendar.graph_base_url.as_deref())?;
        Ok(())
    }

    /// Returns `[auth] client_id` with secret references resolved.
    pub fn client_id(&self) -> Result<Option<String>, ConfigError> {
        secret::resolve_optional(self.auth.client_id.as_deref()).map_err(|message| {
            ConfigError::Secret {
                section: "auth",
                key: "client_id",
                message,
            }
        })
    }

    /// Returns `[auth] tenant_id` with secret references resolved.
    pub fn tenant_id(&self) -> Result<Option<String>, ConfigError> {
        secret::resolve_optional(self.auth.tenant_id.as_deref()).map_err(|message| {
            ConfigError::Secret {
                section: "auth",
                key: "tenant_id",
                message,
            }
        })
    }
}

fn check_url(section: &'static str, key: &'static str, value: Option<&str>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        section,
        key,
        value: value.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            section,
            key,
            value: value.to_string(),
            message: "expected an http or https URL".to_string(),
        });
    }
    Ok(())
}

/// Returns the default config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("outlook-md")
}

/// Returns the default config file path.
pub fn default_path() -> PathBuf {
    default_config_dir().join("config.toml")
}
