//! Microsoft identity platform authentication.
//!
//! - [`Credential`]: application (client) id and directory (tenant) id
//! - [`TokenCache`]: single-record on-disk token store
//! - [`DeviceCodeAuthenticator`]: device-code sign-in and refresh-token exchange
//! - [`TokenLifecycleManager`]: override, cache, refresh, device flow

pub mod device_code;
pub mod manager;
pub mod tokens;

pub use device_code::{DeviceAuthorizationGrant, DeviceCodeAuthenticator, PromptFn};
pub use manager::{TokenAuthority, TokenLifecycleManager, TokenStatus};
pub use tokens::{CLOCK_SKEW, TokenCache, TokenRecord};

use std::fmt;

use crate::error::{ProviderError, ProviderResult};

/// Delegated permissions requested for every token.
pub const SCOPES: &str = "Calendars.Read offline_access";

/// Default identity platform authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// The Azure AD application registration used to sign in.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub tenant_id: String,
}

impl Credential {
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Checks that both identifiers are present.
    pub fn validate(&self) -> ProviderResult<()> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client id (OUTLOOK_MD_CLIENT_ID or [auth] client_id)");
        }
        if self.tenant_id.trim().is_empty() {
            missing.push("tenant id (OUTLOOK_MD_TENANT_ID or [auth] tenant_id)");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::configuration(format!(
                "missing {}",
                missing.join(" and ")
            )))
        }
    }
}

// Debug output shows only a prefix of each identifier.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &redact(&self.client_id))
            .field("tenant_id", &redact(&self.tenant_id))
            .finish()
    }
}

fn redact(value: &str) -> String {
    match value.len() {
        0 => "<empty>".to_string(),
        1..=8 => "***".to_string(),
        _ => format!("{}***", &value[..value.char_indices().nth(4).map_or(0, |(i, _)| i)]),
    }
}
