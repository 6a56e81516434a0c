//! Access token lifecycle.
//!
//! Resolution order for [`TokenLifecycleManager::get_access_token`]:
//!
//! ```text
//! override ──hit──▶ done
//!    │miss
//!    ▼
//! cache ──not found──────────────▶ device flow ──▶ save ──▶ done
//!    │corrupt: fail                   ▲
//!    │loaded                          │refresh failed
//!    ▼                                │
//! valid? ──no──▶ refresh (once) ──────┘
//!    │yes            │ok
//!    ▼               ▼
//!   done        save ──▶ done
//! ```
//!
//! Save failures after a refresh or sign-in are logged and otherwise ignored.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Credential;
use super::tokens::{TokenCache, TokenRecord};
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::source::BoxFuture;

/// The identity platform operations the manager depends on.
pub trait TokenAuthority: Send + Sync {
    /// Runs an interactive sign-in.
    fn device_flow<'a>(
        &'a self,
        credential: &'a Credential,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>>;

    /// Exchanges a refresh token for a new token set.
    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
        refresh_token: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>>;
}

/// Snapshot of the cached token, for `auth status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub cached: bool,
    pub valid: bool,
    pub has_refresh_token: bool,
    pub expiry: Option<DateTime<Utc>>,
}

/// Produces usable access tokens for one invocation.
pub struct TokenLifecycleManager<A> {
    credential: Credential,
    cache: TokenCache,
    authority: A,
}

impl<A: TokenAuthority> TokenLifecycleManager<A> {
    pub fn new(credential: Credential, cache: TokenCache, authority: A) -> Self {
        Self {
            credential,
            cache,
            authority,
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns an access token, signing in interactively if needed.
    ///
    /// A non-empty `access_override` is returned as is, without touching
    /// credentials, cache or network.
    pub async fn get_access_token(
        &self,
        access_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        if let Some(token) = access_override.filter(|t| !t.is_empty()) {
            debug!("using access token override");
            return Ok(token.to_string());
        }

        self.credential.validate()?;

        match self.cache.load()? {
            None => debug!("no cached token, starting device code sign-in"),
            Some(record) if record.is_valid() => {
                debug!(expiry = ?record.expiry, "using cached access token");
                return Ok(record.access_token);
            }
            Some(record) => {
                debug!(expiry = ?record.expiry, "cached access token expired");
                match self.try_refresh(record, cancel).await {
                    Ok(token) => return Ok(token),
                    Err(e) if e.code() == ProviderErrorCode::Cancelled => return Err(e),
                    Err(e) => warn!(error = %e, "token refresh failed, falling back to device code sign-in"),
                }
            }
        }

        self.sign_in(cancel).await
    }

    /// Forces an interactive sign-in and caches the result.
    pub async fn login(&self, cancel: &CancellationToken) -> ProviderResult<String> {
        self.credential.validate()?;
        self.sign_in(cancel).await
    }

    /// Removes the cached token.
    pub fn logout(&self) -> ProviderResult<()> {
        self.cache.clear()
    }

    /// Reports on the cached token without contacting the network.
    pub fn status(&self) -> ProviderResult<TokenStatus> {
        Ok(match self.cache.load()? {
            None => TokenStatus {
                cached: false,
                valid: false,
                has_refresh_token: false,
                expiry: None,
            },
            Some(record) => TokenStatus {
                cached: true,
                valid: record.is_valid(),
                has_refresh_token: record.refresh_token().is_some(),
                expiry: record.expiry,
            },
        })
    }

    async fn try_refresh(
        &self,
        mut record: TokenRecord,
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        let refresh_token = record
            .refresh_token()
            .ok_or_else(|| ProviderError::token_refresh("cached token has no refresh token"))?
            .to_string();

        let refreshed = self
            .authority
            .refresh(&self.credential, &refresh_token, cancel)
            .await?;
        if refreshed.access_token.is_empty() {
            return Err(ProviderError::token_refresh(
                "refresh response had an empty access token",
            ));
        }

        record.apply_refresh(refreshed);
        self.persist(&record);
        info!("using refreshed access token");
        Ok(record.access_token)
    }

    async fn sign_in(&self, cancel: &CancellationToken) -> ProviderResult<String> {
        let record = self.authority.device_flow(&self.credential, cancel).await?;
        self.persist(&record);
        Ok(record.access_token)
    }

    fn persist(&self, record: &TokenRecord) {
        if let Err(e) = self.cache.save(record) {
            warn!(error = %e, path = %self.cache.path().display(), "failed to save token cache");
        }
    }
}
