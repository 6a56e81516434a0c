//! `today`, `tomorrow`, `week` and `range`.

use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use outlook_md_core::{CliOutput, OutputFormat, TimeWindow, WindowKind, write_json};
use outlook_md_providers::CalendarSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::ClientResult;

/// Which window to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSpec {
    Named(WindowKind),
    Range { start: String, end: String },
}

impl WindowSpec {
    pub fn resolve(&self, now: DateTime<Utc>, tz: &Tz) -> ClientResult<TimeWindow> {
        let window = match self {
            Self::Named(kind) => TimeWindow::for_kind(*kind, now, tz)?,
            Self::Range { start, end } => TimeWindow::parse(start, end, tz)?,
        };
        Ok(window)
    }
}

/// Fetches the window and writes the document to stdout.
pub async fn run(ctx: &RunContext, spec: WindowSpec, format: OutputFormat) -> ClientResult<()> {
    let timezone = ctx.timezone()?;
    let window = spec.resolve(Utc::now(), &timezone.tz)?;
    debug!(start = %window.start, end = %window.end, "resolved window");

    let manager = ctx.token_manager()?;
    let token = manager
        .get_access_token(ctx.access_override(), ctx.cancel())
        .await?;
    let client = ctx.graph_client(token)?;

    let output = fetch(&client, window, timezone.tz, ctx.cancel()).await?;
    info!(count = output.events.len(), "fetched events");

    let stdout = std::io::stdout().lock();
    write_output(stdout, &output, format)
}

/// Queries `source` and wraps the events in the output document.
pub async fn fetch(
    source: &dyn CalendarSource,
    window: TimeWindow,
    tz: Tz,
    cancel: &CancellationToken,
) -> ClientResult<CliOutput> {
    let events = source.get_calendar_view(&window, tz, cancel).await?;
    Ok(CliOutput::new(tz.name(), window, events))
}

pub fn write_output<W: Write>(writer: W, output: &CliOutput, format: OutputFormat) -> ClientResult<()> {
    match format {
        OutputFormat::Json => write_json(writer, output)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use outlook_md_core::{CalendarEvent, Organizer};
    use outlook_md_providers::{BoxFuture, ProviderError, ProviderErrorCode, ProviderResult};
    use std::sync::Mutex;

    use crate::error::ClientError;

    struct FakeSource {
        result: Mutex<Option<ProviderResult<Vec<CalendarEvent>>>>,
        seen: Mutex<Option<(TimeWindow, Tz)>>,
    }

    impl FakeSource {
        fn returning(result: ProviderResult<Vec<CalendarEvent>>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
                seen: Mutex::new(None),
            }
        }
    }

    impl CalendarSource for FakeSource {
        fn get_calendar_view<'a>(
            &'a self,
            window: &'a TimeWindow,
            timezone: Tz,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
            Box::pin(async move {
                *self.seen.lock().unwrap() = Some((window.clone(), timezone));
                self.result.lock().unwrap().take().unwrap_or_else(|| Ok(Vec::new()))
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn paris() -> Tz {
        chrono_tz::Europe::Paris
    }

    fn sample_event() -> CalendarEvent {
        let start = paris().with_ymd_and_hms(2026, 1, 7, 10, 0, 0).unwrap().fixed_offset();
        CalendarEvent::new("evt-1", "Standup", start, start + chrono::Duration::minutes(15))
            .with_organizer(Organizer::new("Ada", "ada@contoso.com"))
    }

    mod windows {
        use super::*;

        #[test]
        fn named_window() {
            let now = Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap();
            let window = WindowSpec::Named(WindowKind::Today)
                .resolve(now, &paris())
                .unwrap();
            assert_eq!(window.start.to_rfc3339(), "2026-01-07T00:00:00+01:00");
            assert_eq!(window.end.to_rfc3339(), "2026-01-08T00:00:00+01:00");
        }

        #[test]
        fn range_window() {
            let now = Utc::now();
            let window = WindowSpec::Range {
                start: "2026-01-05".to_string(),
                end: "2026-01-07T12:00:00Z".to_string(),
            }
            .resolve(now, &paris())
            .unwrap();
            assert_eq!(window.start.to_rfc3339(), "2026-01-05T00:00:00+01:00");
            assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap());
        }

        #[test]
        fn inverted_range_rejected() {
            let err = WindowSpec::Range {
                start: "2026-01-07".to_string(),
                end: "2026-01-05".to_string(),
            }
            .resolve(Utc::now(), &paris())
            .unwrap_err();
            assert!(matches!(err, ClientError::Window(_)));
        }
    }

    mod fetching {
        use super::*;

        #[tokio::test]
        async fn wraps_events_in_document() {
            let source = FakeSource::returning(Ok(vec![sample_event()]));
            let window = WindowSpec::Named(WindowKind::Today)
                .resolve(Utc.with_ymd_and_hms(2026, 1, 7, 9, 0, 0).unwrap(), &paris())
                .unwrap();

            let output = fetch(&source, window.clone(), paris(), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(output.version, 1);
            assert_eq!(output.timezone, "Europe/Paris");
            assert_eq!(output.window, window);
            assert_eq!(output.events.len(), 1);

            let seen = source.seen.lock().unwrap().clone().unwrap();
            assert_eq!(seen, (window, paris()));
        }

        #[tokio::test]
        async fn source_errors_propagate() {
            let source = FakeSource::returning(Err(ProviderError::http_status(503, "unavailable")));
            let window = WindowSpec::Named(WindowKind::Week)
                .resolve(Utc::now(), &paris())
                .unwrap();

            let err = fetch(&source, window, paris(), &CancellationToken::new())
                .await
                .unwrap_err();
            match err {
                ClientError::Provider(e) => assert_eq!(e.code(), ProviderErrorCode::HttpStatus),
                other => panic!("unexpected error {:?}", other),
            }
        }

        #[tokio::test]
        async fn empty_result_written_as_empty_array() {
            let source = FakeSource::returning(Ok(Vec::new()));
            let window = WindowSpec::Named(WindowKind::Tomorrow)
                .resolve(Utc::now(), &paris())
                .unwrap();
            let output = fetch(&source, window, paris(), &CancellationToken::new())
                .await
                .unwrap();

            let mut buf = Vec::new();
            write_output(&mut buf, &output, OutputFormat::Json).unwrap();
            let text = String::from_utf8(buf).unwrap();
            assert!(text.contains("\"events\": []"));
            assert!(text.ends_with("}\n"));
        }
    }
}
