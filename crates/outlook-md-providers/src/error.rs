//! Error types for authentication and calendar operations.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Missing or invalid configuration (credentials, timezone, URLs).
    ConfigurationError,
    /// The token cache exists but cannot be read or decoded.
    CacheCorruption,
    /// Authentication was rejected or failed.
    AuthenticationFailed,
    /// The device code expired before the user finished signing in.
    DeviceCodeExpired,
    /// The operation was cancelled by the user.
    Cancelled,
    /// A refresh-token exchange failed.
    TokenRefreshFailed,
    /// Connection failure, DNS resolution, TLS, etc.
    NetworkError,
    /// The request did not complete within the timeout.
    Timeout,
    /// The server answered with a non-success status.
    HttpStatus,
    /// A response or event could not be decoded.
    ParseError,
    /// Writing local state failed.
    PersistenceFailed,
    /// Unexpected state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::CacheCorruption => "cache_corruption",
            Self::AuthenticationFailed => "authentication_failed",
            Self::DeviceCodeExpired => "device_code_expired",
            Self::Cancelled => "cancelled",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::ParseError => "parse_error",
            Self::PersistenceFailed => "persistence_failed",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while authenticating or talking to the calendar service.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Component that raised the error (e.g. "graph", "device-code").
    provider: Option<String>,
    /// HTTP status for [`ProviderErrorCode::HttpStatus`] and refresh failures.
    status: Option<u16>,
    /// Raw response body, kept for diagnosis.
    body: Option<String>,
    /// The event that failed to normalize.
    event_id: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            body: None,
            event_id: None,
            source: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn cache_corruption(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CacheCorruption, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn device_code_expired(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::DeviceCodeExpired, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Cancelled, message)
    }

    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::TokenRefreshFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Timeout, message)
    }

    /// Creates a non-success status error carrying the status and raw body.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let mut err = Self::new(
            ProviderErrorCode::HttpStatus,
            format!("server returned HTTP {}", status),
        );
        err.status = Some(status);
        err.body = Some(body.into());
        err
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ParseError, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::PersistenceFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Converts a reqwest failure into a network or timeout error.
    pub fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        let base = if err.is_timeout() {
            Self::timeout(format!("{}: request timed out", context))
        } else if err.is_decode() {
            Self::parse(format!("{}: {}", context, err))
        } else {
            Self::network(format!("{}: {}", context, err))
        };
        base.with_source(err)
    }

    /// Sets the component name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the HTTP status for this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the raw response body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Names the event this error relates to.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref id) = self.event_id {
            write!(f, " (event {})", id)?;
        }
        if let Some(ref body) = self.body
            && !body.is_empty()
        {
            write!(f, ": {}", truncate(body, 512))?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_names() {
        assert_eq!(ProviderErrorCode::CacheCorruption.as_str(), "cache_corruption");
        assert_eq!(
            ProviderErrorCode::DeviceCodeExpired.as_str(),
            "device_code_expired"
        );
    }

    #[test]
    fn http_status_carries_status_and_body() {
        let err = ProviderError::http_status(403, "{\"error\":\"forbidden\"}").with_provider("graph");
        assert_eq!(err.code(), ProviderErrorCode::HttpStatus);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.body(), Some("{\"error\":\"forbidden\"}"));

        let display = err.to_string();
        assert!(display.starts_with("[graph] http_status: server returned HTTP 403"));
        assert!(display.contains("forbidden"));
    }

    #[test]
    fn parse_error_names_event() {
        let err = ProviderError::parse("bad start time").with_event_id("AAMk-1");
        assert_eq!(err.event_id(), Some("AAMk-1"));
        assert!(err.to_string().contains("(event AAMk-1)"));
    }

    #[test]
    fn long_body_is_truncated_in_display() {
        let err = ProviderError::http_status(500, "é".repeat(600));
        // Display must not split a multi-byte character.
        assert!(err.to_string().len() < 700);
        assert_eq!(err.body().map(str::len), Some(1200));
    }

    #[test]
    fn with_source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ProviderError::persistence("failed to save token").with_source(io_err);
        assert!(err.source().is_some());
    }
}
