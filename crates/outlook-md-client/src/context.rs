//! Effective settings for one invocation.
//!
//! Command-line flags win over `config.toml`, which wins over built-in
//! defaults.

use std::path::PathBuf;
use std::time::Duration;

use outlook_md_providers::{
    Credential, DeviceCodeAuthenticator, GraphCalendarClient, NormalizeOptions, TokenCache,
    TokenLifecycleManager,
};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::{self, ClientConfig};
use crate::credentials::CredentialChain;
use crate::error::{ClientError, ClientResult};
use crate::timezone::{self, ResolvedTimezone};

pub struct RunContext {
    config: ClientConfig,
    config_path: PathBuf,
    timezone: String,
    token_path: Option<PathBuf>,
    access_override: Option<String>,
    skip_solo_events: bool,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(cli: &Cli, config: ClientConfig, cancel: CancellationToken) -> Self {
        Self {
            config_path: cli.config.clone().unwrap_or_else(config::default_path),
            timezone: cli
                .tz
                .clone()
                .or_else(|| config.calendar.timezone.clone())
                .unwrap_or_else(|| timezone::LOCAL.to_string()),
            token_path: cli
                .token_path
                .clone()
                .or_else(|| config.auth.token_path.clone()),
            access_override: cli
                .access_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            skip_solo_events: cli.skip_solo_events || config.calendar.skip_solo_events,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn access_override(&self) -> Option<&str> {
        self.access_override.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.config.calendar.timeout()
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            skip_solo_events: self.skip_solo_events,
        }
    }

    pub fn timezone(&self) -> ClientResult<ResolvedTimezone> {
        timezone::resolve(&self.timezone)
    }

    /// `--token-path`, then `[auth] token_path`, then `~/.outlook-md/token.json`.
    pub fn token_path(&self) -> ClientResult<PathBuf> {
        self.token_path
            .clone()
            .or_else(TokenCache::default_path)
            .ok_or_else(|| {
                ClientError::Config(
                    "cannot determine home directory for the token cache; use --token-path"
                        .to_string(),
                )
            })
    }

    /// Builds the token manager.
    ///
    /// With an access token override the credential stores are not consulted.
    pub fn token_manager(&self) -> ClientResult<TokenLifecycleManager<DeviceCodeAuthenticator>> {
        let credential = if self.access_override.is_some() {
            Credential::default()
        } else {
            CredentialChain::platform_default(&self.config).resolve()?
        };

        let mut authenticator = DeviceCodeAuthenticator::new(self.timeout())?;
        if let Some(authority) = &self.config.auth.authority {
            authenticator = authenticator.with_authority(authority.as_str());
        }

        Ok(TokenLifecycleManager::new(
            credential,
            TokenCache::new(self.token_path()?),
            authenticator,
        ))
    }

    pub fn graph_client(&self, access_token: String) -> ClientResult<GraphCalendarClient> {
        let mut client = GraphCalendarClient::new(access_token, self.timeout())?
            .with_normalize_options(self.normalize_options());
        if let Some(base_url) = &self.config.calendar.graph_base_url {
            client = client.with_base_url(base_url.as_str());
        }
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["outlook-md"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_config() {
        let mut config = ClientConfig::default();
        config.calendar.timezone = Some("Europe/Paris".to_string());
        config.auth.token_path = Some(PathBuf::from("/from/config.json"));

        let ctx = RunContext::new(
            &cli(&["--tz", "Asia/Tokyo", "--token-path", "/from/flag.json", "today"]),
            config,
            CancellationToken::new(),
        );
        assert_eq!(ctx.timezone().unwrap().name(), "Asia/Tokyo");
        assert_eq!(ctx.token_path().unwrap(), PathBuf::from("/from/flag.json"));
    }

    #[test]
    fn config_used_when_flags_absent() {
        let mut config = ClientConfig::default();
        config.calendar.timezone = Some("Europe/Paris".to_string());
        config.calendar.skip_solo_events = true;
        config.auth.token_path = Some(PathBuf::from("/from/config.json"));

        let ctx = RunContext::new(&cli(&["today"]), config, CancellationToken::new());
        assert_eq!(ctx.timezone().unwrap().name(), "Europe/Paris");
        assert_eq!(ctx.token_path().unwrap(), PathBuf::from("/from/config.json"));
        assert!(ctx.normalize_options().skip_solo_events);
    }

    #[test]
    fn blank_access_token_ignored() {
        let ctx = RunContext::new(
            &cli(&["--access-token", "  ", "today"]),
            ClientConfig::default(),
            CancellationToken::new(),
        );
        assert_eq!(ctx.access_override(), None);
    }

    #[tokio::test]
    async fn override_skips_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let ctx = RunContext::new(
            &cli(&[
                "--access-token",
                "override-token",
                "--token-path",
                token_path.to_str().unwrap(),
                "today",
            ]),
            ClientConfig::default(),
            CancellationToken::new(),
        );
        let manager = ctx.token_manager().unwrap();
        let token = manager
            .get_access_token(ctx.access_override(), ctx.cancel())
            .await
            .unwrap();
        assert_eq!(token, "override-token");
        assert!(!token_path.exists());
    }

    #[test]
    fn graph_client_uses_configured_base_url() {
        let mut config = ClientConfig::default();
        config.calendar.graph_base_url = Some("https://graph.example.test/v1.0/".to_string());
        let ctx = RunContext::new(&cli(&["today"]), config, CancellationToken::new());
        let client = ctx.graph_client("token".to_string()).unwrap();
        assert_eq!(client.base_url(), "https://graph.example.test/v1.0");
    }
}
