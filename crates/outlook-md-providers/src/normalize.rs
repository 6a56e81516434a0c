//! Graph event to [`CalendarEvent`] conversion pipeline.
//!
//! The normalization process:
//! 1. Parses start/end into instants rendered in the target timezone
//! 2. Maps attendee roles onto [`AttendeeType`] and orders attendees
//! 3. Optionally drops events the user organized alone
//! 4. Orders events chronologically
//!
//! The output is deterministic for a given input: sorts are stable and
//! keyed only on event data.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use outlook_md_core::{Attendee, AttendeeType, CalendarEvent, Organizer};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::graph::wire::{GraphDateTime, GraphEvent};

/// Format of Graph's bare local timestamps, e.g. `2026-01-07T10:00:00.0000000`.
const GRAPH_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Options for [`normalize_events`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop events the user organized that have no attendees.
    pub skip_solo_events: bool,
}

/// Converts a batch of Graph events, filters and orders them.
pub fn normalize_events(
    raw_events: Vec<GraphEvent>,
    tz: Tz,
    options: NormalizeOptions,
) -> ProviderResult<Vec<CalendarEvent>> {
    let total = raw_events.len();
    let mut events = Vec::with_capacity(total);
    for raw in raw_events {
        if options.skip_solo_events && is_solo_event(&raw) {
            debug!(id = raw.id(), "skipping event without attendees");
            continue;
        }
        events.push(normalize_event(&raw, tz)?);
    }

    sort_events(&mut events);
    debug!(total, kept = events.len(), "normalized events");
    Ok(events)
}

/// Converts a single Graph event.
pub fn normalize_event(raw: &GraphEvent, tz: Tz) -> ProviderResult<CalendarEvent> {
    let id = raw.id();
    let start = event_time(raw.start.as_ref(), tz, id, "start")?;
    let end = event_time(raw.end.as_ref(), tz, id, "end")?;

    let mut attendees = Vec::with_capacity(raw.attendee_count());
    for attendee in raw.attendees.iter().flatten() {
        let kind_str = attendee.kind.as_deref().unwrap_or_default();
        let kind: AttendeeType = kind_str.parse().map_err(|e| {
            ProviderError::parse(format!("invalid attendee: {}", e))
                .with_event_id(id)
                .with_source(e)
        })?;
        attendees.push(Attendee::new(attendee.name(), attendee.address(), kind));
    }
    sort_attendees(&mut attendees);

    let organizer = raw
        .organizer
        .as_ref()
        .map(|o| Organizer::new(o.name(), o.address()))
        .unwrap_or_default();

    Ok(CalendarEvent::new(id, raw.subject(), start, end)
        .with_all_day(raw.is_all_day.unwrap_or(false))
        .with_location(raw.location_name())
        .with_organizer(organizer)
        .with_attendees(attendees))
}

fn event_time(
    value: Option<&GraphDateTime>,
    tz: Tz,
    id: &str,
    which: &str,
) -> ProviderResult<DateTime<FixedOffset>> {
    let raw = value
        .and_then(|v| v.date_time.as_deref())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::parse(format!("missing {} time", which)).with_event_id(id))?;

    parse_graph_datetime(raw, tz).map_err(|reason| {
        ProviderError::parse(format!("invalid {} time '{}': {}", which, raw, reason))
            .with_event_id(id)
    })
}

/// Parses a Graph timestamp into an instant rendered in `tz`.
///
/// RFC 3339 values with an explicit offset are converted into `tz`. Bare
/// local values are read as wall-clock time in `tz`: an ambiguous time takes
/// the earlier instant and a time inside a DST gap is rejected.
pub fn parse_graph_datetime(value: &str, tz: Tz) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&tz).fixed_offset());
    }

    let naive = NaiveDateTime::parse_from_str(value, GRAPH_LOCAL_FORMAT)
        .map_err(|e| format!("expected RFC 3339 or YYYY-MM-DDTHH:MM:SS ({})", e))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.fixed_offset()),
        LocalResult::None => Err(format!("local time does not exist in {}", tz.name())),
    }
}

/// Orders attendees by role, then email, then name (both case-insensitive).
///
/// Stable: attendees with equal keys keep their input order.
pub fn sort_attendees(attendees: &mut [Attendee]) {
    attendees.sort_by_cached_key(|a| (a.kind.rank(), a.email.to_lowercase(), a.name.to_lowercase()));
}

/// Orders events by start instant, keeping input order for equal starts.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by_key(|e| e.start);
}

fn is_solo_event(raw: &GraphEvent) -> bool {
    raw.attendee_count() == 0
        && raw
            .response()
            .is_some_and(|r| r.eq_ignore_ascii_case("organizer"))
}
