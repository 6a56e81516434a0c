//! OAuth 2.0 device authorization grant against the Microsoft identity
//! platform.
//!
//! # Flow Overview
//!
//! 1. POST `{authority}/{tenant}/oauth2/v2.0/devicecode` for a user code
//! 2. Show the verification URI and code to the user
//! 3. Poll `{authority}/{tenant}/oauth2/v2.0/token` until the user finishes,
//!    the code expires, or the caller cancels
//!
//! The same token endpoint serves refresh-token exchanges.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::manager::TokenAuthority;
use super::tokens::TokenRecord;
use super::{Credential, DEFAULT_AUTHORITY, SCOPES};
use crate::error::{ProviderError, ProviderResult};
use crate::source::{BoxFuture, cancellable};

const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Poll interval used when the server does not send one.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Added to the poll interval on every `slow_down` response.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Lifetime assumed when the server omits `expires_in`.
const DEFAULT_CODE_LIFETIME: Duration = Duration::from_secs(900);

/// Callback that shows the user code to the operator.
pub type PromptFn = Arc<dyn Fn(&DeviceAuthorizationGrant) + Send + Sync>;

/// A pending device authorization. Lives for one sign-in attempt only.
#[derive(Debug, Clone)]
pub struct DeviceAuthorizationGrant {
    pub verification_uri: String,
    pub user_code: String,
    pub device_code: String,
    pub poll_interval: Duration,
    pub expires_at: Instant,
    /// Server-provided instructions, if any.
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_record(self) -> TokenRecord {
        TokenRecord::from_grant(
            self.access_token,
            self.token_type,
            self.refresh_token,
            self.expires_in,
            Utc::now(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Writes sign-in instructions to stderr.
pub fn stderr_prompt(grant: &DeviceAuthorizationGrant) {
    eprintln!();
    eprintln!("To authenticate:");
    eprintln!("1. Visit: {}", grant.verification_uri);
    eprintln!("2. Enter code: {}", grant.user_code);
    eprintln!();
    eprintln!("Waiting for authentication...");
    eprintln!();
}

/// Device-code sign-in and refresh-token exchange.
#[derive(Clone)]
pub struct DeviceCodeAuthenticator {
    http_client: reqwest::Client,
    authority: String,
    default_interval: Duration,
    slow_down_step: Duration,
    prompt: PromptFn,
}

impl std::fmt::Debug for DeviceCodeAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCodeAuthenticator")
            .field("authority", &self.authority)
            .field("default_interval", &self.default_interval)
            .field("slow_down_step", &self.slow_down_step)
            .finish_non_exhaustive()
    }
}

impl DeviceCodeAuthenticator {
    /// Creates an authenticator whose HTTP requests time out after `timeout`.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            authority: DEFAULT_AUTHORITY.to_string(),
            default_interval: DEFAULT_POLL_INTERVAL,
            slow_down_step: SLOW_DOWN_STEP,
            prompt: Arc::new(stderr_prompt),
        })
    }

    /// Overrides the identity platform authority URL.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the default poll interval and the `slow_down` increment.
    pub fn with_poll_timing(mut self, default_interval: Duration, slow_down_step: Duration) -> Self {
        self.default_interval = default_interval;
        self.slow_down_step = slow_down_step;
        self
    }

    /// Replaces the stderr prompt.
    pub fn with_prompt(mut self, prompt: PromptFn) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn endpoint(&self, credential: &Credential, name: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority,
            urlencoding::encode(&credential.tenant_id),
            name
        )
    }

    /// Runs the full device-code flow: request, prompt, poll.
    pub async fn authenticate(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> ProviderResult<TokenRecord> {
        let grant = self.request_device_code(credential, cancel).await?;
        (self.prompt)(&grant);
        let record = self.poll_for_token(credential, &grant, cancel).await?;
        info!("device code sign-in completed");
        Ok(record)
    }

    /// Starts a device authorization.
    pub async fn request_device_code(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> ProviderResult<DeviceAuthorizationGrant> {
        let url = self.endpoint(credential, "devicecode");
        debug!(%url, "requesting device code");

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("scope", SCOPES),
        ];
        let request = self.http_client.post(&url).form(&params).send();
        let response = cancellable(cancel, "device code request", request)
            .await?
            .map_err(|e| ProviderError::from_reqwest("device code request failed", e))?;

        let status = response.status();
        let body = cancellable(cancel, "device code request", response.text())
            .await?
            .map_err(|e| ProviderError::from_reqwest("failed to read device code response", e))?;

        if !status.is_success() {
            let err: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(ProviderError::authentication(format!(
                "device code request rejected: {}",
                describe(&err, status.as_u16())
            ))
            .with_status(status.as_u16())
            .with_body(body));
        }

        let resp: DeviceCodeResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::parse(format!("invalid device code response: {}", e)).with_source(e)
        })?;

        let poll_interval = match resp.interval {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.default_interval,
        };
        let lifetime = match resp.expires_in {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_CODE_LIFETIME,
        };

        Ok(DeviceAuthorizationGrant {
            verification_uri: resp.verification_uri,
            user_code: resp.user_code,
            device_code: resp.device_code,
            poll_interval,
            expires_at: Instant::now() + lifetime,
            message: resp.message,
        })
    }

    /// Polls the token endpoint until the grant resolves.
    ///
    /// Waits one interval before every poll. Nothing runs in the background:
    /// dropping the future or cancelling `cancel` stops polling.
    pub async fn poll_for_token(
        &self,
        credential: &Credential,
        grant: &DeviceAuthorizationGrant,
        cancel: &CancellationToken,
    ) -> ProviderResult<TokenRecord> {
        let url = self.endpoint(credential, "token");
        let mut interval = grant.poll_interval;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ProviderError::cancelled("device code sign-in cancelled"));
                }
                _ = tokio::time::sleep_until(grant.expires_at) => {
                    return Err(ProviderError::device_code_expired(
                        "device code expired before sign-in completed",
                    ));
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let params = [
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
                ("client_id", credential.client_id.as_str()),
                ("device_code", grant.device_code.as_str()),
            ];
            let request = self.http_client.post(&url).form(&params).send();
            let response = cancellable(cancel, "device code sign-in", request)
                .await?
                .map_err(|e| ProviderError::from_reqwest("token poll failed", e))?;

            let status = response.status();
            let body = cancellable(cancel, "device code sign-in", response.text())
                .await?
                .map_err(|e| ProviderError::from_reqwest("failed to read token response", e))?;

            if status.is_success() {
                let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                    ProviderError::parse(format!("invalid token response: {}", e)).with_source(e)
                })?;
                return Ok(token.into_record());
            }

            let err: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            match err.error.as_str() {
                "authorization_pending" => {
                    debug!("authorization pending");
                }
                "slow_down" => {
                    interval += self.slow_down_step;
                    debug!(interval_secs = interval.as_secs_f64(), "server asked to slow down");
                }
                "expired_token" => {
                    return Err(ProviderError::device_code_expired(
                        "device code expired before sign-in completed",
                    ));
                }
                "access_denied" | "authorization_declined" => {
                    return Err(ProviderError::authentication("sign-in was denied by the user"));
                }
                _ => {
                    return Err(ProviderError::authentication(format!(
                        "device code sign-in failed: {}",
                        describe(&err, status.as_u16())
                    ))
                    .with_status(status.as_u16())
                    .with_body(body));
                }
            }
        }
    }

    /// Exchanges a refresh token for a new token set.
    pub async fn refresh(
        &self,
        credential: &Credential,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<TokenRecord> {
        let url = self.endpoint(credential, "token");
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", credential.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", SCOPES),
        ];

        let request = self.http_client.post(&url).form(&params).send();
        let response = cancellable(cancel, "token refresh", request)
            .await?
            .map_err(|e| {
                ProviderError::token_refresh(format!("token refresh request failed: {}", e))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = cancellable(cancel, "token refresh", response.text())
            .await?
            .map_err(|e| {
                ProviderError::token_refresh(format!("failed to read refresh response: {}", e))
                    .with_source(e)
            })?;

        if !status.is_success() {
            let err: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            warn!(status = status.as_u16(), error = %err.error, "token refresh rejected");
            return Err(ProviderError::token_refresh(format!(
                "token refresh failed: {}",
                describe(&err, status.as_u16())
            ))
            .with_status(status.as_u16())
            .with_body(body));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::token_refresh(format!("invalid refresh response: {}", e)).with_source(e)
        })?;

        info!("refreshed access token");
        Ok(token.into_record())
    }
}

fn describe(err: &OAuthErrorResponse, status: u16) -> String {
    match (err.error.is_empty(), &err.error_description) {
        (true, _) => format!("HTTP {}", status),
        (false, Some(desc)) => format!("{} ({})", err.error, desc),
        (false, None) => err.error.clone(),
    }
}

impl TokenAuthority for DeviceCodeAuthenticator {
    fn device_flow<'a>(
        &'a self,
        credential: &'a Credential,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>> {
        Box::pin(self.authenticate(credential, cancel))
    }

    fn refresh<'a>(
        &'a self,
        credential: &'a Credential,
        refresh_token: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>> {
        Box::pin(DeviceCodeAuthenticator::refresh(
            self,
            credential,
            refresh_token,
            cancel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TENANT: &str = "contoso";

    fn credential() -> Credential {
        Credential::new("app-id", TENANT)
    }

    fn authenticator(server: &MockServer) -> DeviceCodeAuthenticator {
        DeviceCodeAuthenticator::new(Duration::from_secs(5))
            .unwrap()
            .with_authority(server.uri())
            .with_poll_timing(Duration::from_millis(10), Duration::from_millis(20))
            .with_prompt(Arc::new(|_: &DeviceAuthorizationGrant| {}))
    }

    fn device_code_body(expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": expires_in,
            "interval": 0,
            "message": "To sign in, use a web browser..."
        })
    }

    fn oauth_error(code: &str) -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": code,
            "error_description": format!("AADSTS: {}", code)
        }))
    }

    fn token_body() -> serde_json::Value {
        serde_json::json!({
            "token_type": "Bearer",
            "scope": "Calendars.Read",
            "expires_in": 3600,
            "access_token": "access-xyz",
            "refresh_token": "refresh-xyz"
        })
    }

    async fn mount_device_code(server: &MockServer, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/devicecode", TENANT)))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains("scope=Calendars.Read+offline_access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_code_body(expires_in)))
            .mount(server)
            .await;
    }

    fn token_path() -> String {
        format!("/{}/oauth2/v2.0/token", TENANT)
    }

    /// Mounts `first` for the first `times` polls, then `then` forever.
    async fn mount_poll_sequence(
        server: &MockServer,
        first: ResponseTemplate,
        times: u64,
        then: ResponseTemplate,
    ) {
        Mock::given(method("POST"))
            .and(path(token_path()))
            .and(body_string_contains("device_code=dev-123"))
            .respond_with(first)
            .up_to_n_times(times)
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(token_path()))
            .respond_with(then)
            .with_priority(2)
            .mount(server)
            .await;
    }

    mod device_flow {
        use super::*;

        #[tokio::test]
        async fn pending_then_success() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            mount_poll_sequence(
                &server,
                oauth_error("authorization_pending"),
                2,
                ResponseTemplate::new(200).set_body_json(token_body()),
            )
            .await;

            let shown = Arc::new(Mutex::new(None));
            let seen = shown.clone();
            let auth = authenticator(&server).with_prompt(Arc::new(move |grant: &DeviceAuthorizationGrant| {
                *seen.lock().unwrap() = Some(grant.user_code.clone());
            }));

            let record = auth
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(record.access_token, "access-xyz");
            assert_eq!(record.refresh_token(), Some("refresh-xyz"));
            assert!(record.expiry.is_some());
            assert_eq!(shown.lock().unwrap().as_deref(), Some("ABCD-EFGH"));

            let polls = server
                .received_requests()
                .await
                .unwrap()
                .iter()
                .filter(|r| r.url.path() == token_path())
                .count();
            assert_eq!(polls, 3);
        }

        #[tokio::test]
        async fn slow_down_increases_interval() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            mount_poll_sequence(
                &server,
                oauth_error("slow_down"),
                2,
                ResponseTemplate::new(200).set_body_json(token_body()),
            )
            .await;

            let auth = authenticator(&server);
            let started = std::time::Instant::now();
            let record = auth
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(record.access_token, "access-xyz");
            // 10ms, then 30ms, then 50ms between polls.
            assert!(started.elapsed() >= Duration::from_millis(90));
        }

        #[tokio::test]
        async fn expired_token_is_terminal() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            mount_poll_sequence(
                &server,
                oauth_error("authorization_pending"),
                1,
                oauth_error("expired_token"),
            )
            .await;

            let err = authenticator(&server)
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::DeviceCodeExpired);
        }

        #[tokio::test]
        async fn grant_deadline_expires() {
            let server = MockServer::start().await;
            mount_device_code(&server, 1).await;
            Mock::given(method("POST"))
                .and(path(token_path()))
                .respond_with(oauth_error("authorization_pending"))
                .mount(&server)
                .await;

            let auth = authenticator(&server)
                .with_poll_timing(Duration::from_millis(200), Duration::from_millis(200));
            let err = auth
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::DeviceCodeExpired);
        }

        #[tokio::test]
        async fn access_denied_is_authentication_error() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            mount_poll_sequence(
                &server,
                oauth_error("authorization_pending"),
                1,
                oauth_error("access_denied"),
            )
            .await;

            let err = authenticator(&server)
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
            assert!(err.message().contains("denied"));
        }

        #[tokio::test]
        async fn unknown_error_carries_description() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            Mock::given(method("POST"))
                .and(path(token_path()))
                .respond_with(oauth_error("invalid_client"))
                .mount(&server)
                .await;

            let err = authenticator(&server)
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
            assert!(err.message().contains("invalid_client"));
            assert!(err.message().contains("AADSTS"));
            assert_eq!(err.status(), Some(400));
        }

        #[tokio::test]
        async fn cancellation_stops_polling() {
            let server = MockServer::start().await;
            mount_device_code(&server, 900).await;
            Mock::given(method("POST"))
                .and(path(token_path()))
                .respond_with(oauth_error("authorization_pending"))
                .mount(&server)
                .await;

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let err = authenticator(&server)
                .authenticate(&credential(), &cancel)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::Cancelled);
        }

        #[tokio::test]
        async fn rejected_device_code_request() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(format!("/{}/oauth2/v2.0/devicecode", TENANT)))
                .respond_with(oauth_error("invalid_request"))
                .mount(&server)
                .await;

            let err = authenticator(&server)
                .authenticate(&credential(), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
            assert!(err.message().contains("invalid_request"));
        }

        #[tokio::test]
        async fn server_interval_is_used() {
            let server = MockServer::start().await;
            let mut body = device_code_body(900);
            body["interval"] = serde_json::json!(7);
            Mock::given(method("POST"))
                .and(path(format!("/{}/oauth2/v2.0/devicecode", TENANT)))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let grant = authenticator(&server)
                .request_device_code(&credential(), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(grant.poll_interval, Duration::from_secs(7));
            assert_eq!(grant.user_code, "ABCD-EFGH");
        }
    }

    mod refresh {
        use super::*;

        #[tokio::test]
        async fn success_returns_new_record() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(token_path()))
                .and(body_string_contains("grant_type=refresh_token"))
                .and(body_string_contains("refresh_token=old-refresh"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "access_token": "fresh"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let record = authenticator(&server)
                .refresh(&credential(), "old-refresh", &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(record.access_token, "fresh");
            assert!(record.refresh_token.is_none());
        }

        #[tokio::test]
        async fn rejection_is_refresh_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(token_path()))
                .respond_with(oauth_error("invalid_grant"))
                .mount(&server)
                .await;

            let err = authenticator(&server)
                .refresh(&credential(), "stale", &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::TokenRefreshFailed);
            assert_eq!(err.status(), Some(400));
            assert!(err.body().unwrap_or_default().contains("invalid_grant"));
        }
    }

    #[test]
    fn authority_trailing_slash_is_trimmed() {
        let auth = DeviceCodeAuthenticator::new(Duration::from_secs(1))
            .unwrap()
            .with_authority("https://login.example.com/");
        assert_eq!(auth.authority(), "https://login.example.com");
        assert_eq!(
            auth.endpoint(&credential(), "token"),
            "https://login.example.com/contoso/oauth2/v2.0/token"
        );
    }
}
