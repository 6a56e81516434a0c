//! Application credential lookup.
//!
//! Client and tenant ids come from, in order: the macOS Keychain, the
//! `OUTLOOK_MD_CLIENT_ID` / `OUTLOOK_MD_TENANT_ID` environment variables and
//! the `[auth]` section of the config file. Each id is resolved on its own,
//! so the client id may come from the Keychain while the tenant comes from
//! the environment.

use std::process::Command;

use outlook_md_providers::Credential;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Keychain service holding both ids.
pub const KEYCHAIN_SERVICE: &str = "com.github.obsidian-outlook-sync";

/// `security` exit status when the item does not exist.
const SECURITY_ITEM_NOT_FOUND: i32 = 44;
/// `security` exit status when the user denies access.
const SECURITY_ACCESS_DENIED: i32 = 36;

/// The two identifiers that make up a [`Credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKey {
    ClientId,
    TenantId,
}

impl CredentialKey {
    pub fn keychain_account(self) -> &'static str {
        match self {
            Self::ClientId => "client-id",
            Self::TenantId => "tenant-id",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Self::ClientId => "OUTLOOK_MD_CLIENT_ID",
            Self::TenantId => "OUTLOOK_MD_TENANT_ID",
        }
    }
}

/// A place credentials can be read from.
pub trait CredentialStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Ok(None)` when the store has no value for `key`.
    fn lookup(&self, key: CredentialKey) -> ClientResult<Option<String>>;
}

/// Reads generic passwords through the `security` command.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new() -> Self {
        Self {
            service: KEYCHAIN_SERVICE.to_string(),
        }
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeychainStore {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn lookup(&self, key: CredentialKey) -> ClientResult<Option<String>> {
        let account = key.keychain_account();
        let output = Command::new("security")
            .args(["find-generic-password", "-s", &self.service, "-a", account, "-w"])
            .output()
            .map_err(|e| ClientError::Credential(format!("failed to run `security`: {}", e)))?;

        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!value.is_empty()).then_some(value))
            }
            Some(SECURITY_ITEM_NOT_FOUND) => Ok(None),
            Some(SECURITY_ACCESS_DENIED) => Err(ClientError::Credential(format!(
                "access to keychain item {}/{} was denied",
                self.service, account
            ))),
            _ => Err(ClientError::Credential(format!(
                "`security find-generic-password` failed for {}/{} ({}): {}",
                self.service,
                account,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

/// Reads process environment variables.
#[derive(Debug, Clone)]
pub struct EnvStore {
    client_id_var: String,
    tenant_id_var: String,
}

impl EnvStore {
    pub fn new() -> Self {
        Self::with_vars(
            CredentialKey::ClientId.env_var(),
            CredentialKey::TenantId.env_var(),
        )
    }

    pub fn with_vars(client_id_var: impl Into<String>, tenant_id_var: impl Into<String>) -> Self {
        Self {
            client_id_var: client_id_var.into(),
            tenant_id_var: tenant_id_var.into(),
        }
    }
}

impl Default for EnvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for EnvStore {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn lookup(&self, key: CredentialKey) -> ClientResult<Option<String>> {
        let var = match key {
            CredentialKey::ClientId => &self.client_id_var,
            CredentialKey::TenantId => &self.tenant_id_var,
        };
        Ok(std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

/// Reads the `[auth]` section of the config file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: ClientConfig,
}

impl ConfigStore {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl CredentialStore for ConfigStore {
    fn name(&self) -> &'static str {
        "config file"
    }

    fn lookup(&self, key: CredentialKey) -> ClientResult<Option<String>> {
        let value = match key {
            CredentialKey::ClientId => self.config.client_id()?,
            CredentialKey::TenantId => self.config.tenant_id()?,
        };
        Ok(value)
    }
}

/// Ordered list of stores; the first value found wins.
pub struct CredentialChain {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl CredentialChain {
    pub fn new(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { stores }
    }

    /// Keychain (macOS only), then environment, then config file.
    pub fn platform_default(config: &ClientConfig) -> Self {
        let mut stores: Vec<Box<dyn CredentialStore>> = Vec::new();
        if cfg!(target_os = "macos") {
            stores.push(Box::new(KeychainStore::new()));
        }
        stores.push(Box::new(EnvStore::new()));
        stores.push(Box::new(ConfigStore::new(config.clone())));
        Self::new(stores)
    }

    /// Builds a credential. Missing ids are left empty for
    /// [`Credential::validate`] to report.
    ///
    /// A failing store is logged and skipped. The error from the last failing
    /// store is returned only when no store had a value.
    pub fn resolve(&self) -> ClientResult<Credential> {
        Ok(Credential::new(
            self.lookup(CredentialKey::ClientId)?.unwrap_or_default(),
            self.lookup(CredentialKey::TenantId)?.unwrap_or_default(),
        ))
    }

    fn lookup(&self, key: CredentialKey) -> ClientResult<Option<String>> {
        let mut last_error = None;
        for store in &self.stores {
            match store.lookup(key) {
                Ok(Some(value)) => {
                    debug!(store = store.name(), key = ?key, "credential found");
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(store = store.name(), key = ?key, error = %e, "credential store failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
