//! Token record and its on-disk cache.
//!
//! The cache holds exactly one record. Its JSON layout (`access_token`,
//! `token_type`, `refresh_token`, `expiry`) is compatible with cache files
//! written by earlier releases of the tool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Tolerance applied when checking expiry against the local clock.
pub const CLOCK_SKEW: Duration = Duration::seconds(10);

/// An OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiry. `None` means the token does not expire.
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Builds a record from a token endpoint response received at `now`.
    pub fn from_grant(
        access_token: impl Into<String>,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expiry: expires_in_secs
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// Returns true if the token can be used at `now`.
    ///
    /// An empty access token is never valid. A missing expiry is always
    /// valid. Otherwise the token must outlive `now` by [`CLOCK_SKEW`].
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => now + CLOCK_SKEW < expiry,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Returns the refresh token if one is present and non-empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Applies a refreshed token set to this record.
    ///
    /// A refresh response without a new refresh token keeps the old one.
    pub fn apply_refresh(&mut self, refreshed: TokenRecord) {
        self.access_token = refreshed.access_token;
        self.token_type = refreshed.token_type;
        self.expiry = refreshed.expiry;
        if refreshed.refresh_token.is_some() {
            self.refresh_token = refreshed.refresh_token;
        }
    }
}

/// Older cache files store an unset expiry as the zero time
/// (`0001-01-01T00:00:00Z`); treat that as "no expiry".
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
    Ok(value.filter(|dt| dt.year() > 1))
}

/// File-backed storage for a single [`TokenRecord`].
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default cache location, `~/.outlook-md/token.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".outlook-md").join("token.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached record.
    ///
    /// Returns `Ok(None)` when no cache file exists. A file that exists but
    /// cannot be read or decoded is a cache corruption error.
    pub fn load(&self) -> ProviderResult<Option<TokenRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token cache");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::cache_corruption(format!(
                    "failed to read token cache {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e));
            }
        };

        let record: TokenRecord = serde_json::from_str(&content).map_err(|e| {
            ProviderError::cache_corruption(format!(
                "failed to parse token cache {} (remove it or run `outlook-md auth logout`): {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })?;

        debug!(path = %self.path.display(), "loaded token cache");
        Ok(Some(record))
    }

    /// Atomically replaces the cache with `record`.
    ///
    /// The parent directory is created with mode 0700 and the file is written
    /// with mode 0600 before being renamed over the target.
    pub fn save(&self, record: &TokenRecord) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent).map_err(|e| {
                ProviderError::persistence(format!(
                    "failed to create token directory {}: {}",
                    parent.display(),
                    e
                ))
                .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = write_private_temp(dir, content.as_bytes()).map_err(|e| {
            ProviderError::persistence(format!(
                "failed to write token cache in {}: {}",
                dir.display(),
                e
            ))
            .with_source(e)
        })?;

        // Concurrent writers each rename their own complete file.
        temp.persist(&self.path).map_err(|e| {
            ProviderError::persistence(format!(
                "failed to replace token cache {}: {}",
                self.path.display(),
                e.error
            ))
            .with_source(e.error)
        })?;

        debug!(path = %self.path.display(), "saved token cache");
        Ok(())
    }

    /// Removes the cache file. A missing file is not an error.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "removed token cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::persistence(format!(
                "failed to remove token cache {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

/// Writes `content` to a fresh temp file in `dir` (mode 0600 on unix). The file is
/// removed on drop unless persisted.
fn write_private_temp(dir: &Path, content: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(".token-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}
