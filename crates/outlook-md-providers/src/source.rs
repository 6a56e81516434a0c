//! The calendar source abstraction.
//!
//! [`CalendarSource`] is what the command layer talks to. The Graph client is
//! the real implementation; tests substitute canned sources.

use std::future::Future;
use std::pin::Pin;

use chrono_tz::Tz;
use outlook_md_core::{CalendarEvent, TimeWindow};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ProviderResult};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so they can be used as
/// `dyn CalendarSource` / `dyn TokenAuthority`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A read-only source of calendar events.
pub trait CalendarSource: Send + Sync {
    /// Returns the events overlapping `window`, rendered in `timezone` and
    /// sorted by start time.
    fn get_calendar_view<'a>(
        &'a self,
        window: &'a TimeWindow,
        timezone: Tz,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F>(
    cancel: &CancellationToken,
    what: &str,
    fut: F,
) -> ProviderResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::cancelled(format!("{} cancelled", what))),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[tokio::test]
    async fn cancellable_passes_through_output() {
        let cancel = CancellationToken::new();
        let out = cancellable(&cancel, "work", async { 42 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn cancellable_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = cancellable(&cancel, "calendar request", std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Cancelled);
        assert_eq!(err.message(), "calendar request cancelled");
    }
}
