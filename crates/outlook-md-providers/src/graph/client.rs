//! Microsoft Graph calendar client.
//!
//! One authenticated `GET /me/calendarView` per call. Graph renders event
//! times in the zone named by the `Prefer: outlook.timezone` header.

use std::time::Duration;

use chrono::SecondsFormat;
use chrono_tz::Tz;
use outlook_md_core::{CalendarEvent, TimeWindow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::wire::CalendarViewResponse;
use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::normalize::{NormalizeOptions, normalize_events};
use crate::source::{BoxFuture, CalendarSource, cancellable};

/// Base URL for Microsoft Graph v1.0.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Microsoft Graph calendar client.
#[derive(Debug, Clone)]
pub struct GraphCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
    normalize: NormalizeOptions,
}

impl GraphCalendarClient {
    /// Creates a client that authenticates with `access_token`.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: GRAPH_API_BASE.to_string(),
            normalize: NormalizeOptions::default(),
        })
    }

    /// Points the client at a different Graph endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_normalize_options(mut self, options: NormalizeOptions) -> Self {
        self.normalize = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches and normalizes the events overlapping `window`.
    pub async fn get_calendar_view(
        &self,
        window: &TimeWindow,
        timezone: Tz,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let response = self.fetch_calendar_view(window, timezone, cancel).await?;
        if response.next_link.is_some() {
            warn!("calendar view has more pages than were returned; some events may be missing");
        }
        normalize_events(response.into_events(), timezone, self.normalize)
    }

    async fn fetch_calendar_view(
        &self,
        window: &TimeWindow,
        timezone: Tz,
        cancel: &CancellationToken,
    ) -> ProviderResult<CalendarViewResponse> {
        let url = format!("{}/me/calendarView", self.base_url);
        let start = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(%url, %start, %end, tz = timezone.name(), "requesting calendar view");

        let request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Prefer", format!("outlook.timezone=\"{}\"", timezone.name()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(&[("startDateTime", start), ("endDateTime", end)])
            .send();

        let response = cancellable(cancel, "calendar request", request)
            .await?
            .map_err(|e| graph_error(ProviderError::from_reqwest("calendar request failed", e)))?;

        let status = response.status();
        let body = cancellable(cancel, "calendar request", response.text())
            .await?
            .map_err(|e| graph_error(ProviderError::from_reqwest("failed to read calendar response", e)))?;

        if !status.is_success() {
            let err = if status == reqwest::StatusCode::UNAUTHORIZED {
                ProviderError::new(
                    ProviderErrorCode::HttpStatus,
                    "access token rejected (HTTP 401); run `outlook-md auth login`",
                )
                .with_status(status.as_u16())
                .with_body(body)
            } else {
                ProviderError::http_status(status.as_u16(), body)
            };
            return Err(graph_error(err));
        }

        let parsed: CalendarViewResponse = serde_json::from_str(&body).map_err(|e| {
            graph_error(ProviderError::parse(format!("invalid calendar response: {}", e)).with_source(e))
        })?;
        debug!(count = parsed.value.as_ref().map_or(0, Vec::len), "received events");
        Ok(parsed)
    }
}

fn graph_error(err: ProviderError) -> ProviderError {
    err.with_provider("graph")
}

impl CalendarSource for GraphCalendarClient {
    fn get_calendar_view<'a>(
        &'a self,
        window: &'a TimeWindow,
        timezone: Tz,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(GraphCalendarClient::get_calendar_view(
            self, window, timezone, cancel,
        ))
    }

    fn name(&self) -> &str {
        "graph"
    }
}
