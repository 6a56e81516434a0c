//! Canonical calendar event types.
//!
//! These are the domain types emitted by the normalization pipeline and
//! serialized into the version 1 output schema. They are built once and never
//! mutated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The role of an attendee in a meeting.
///
/// The declaration order is the sort rank: required attendees come first,
/// then optional ones, then resources (rooms, equipment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeType {
    /// A required participant.
    Required,
    /// An optional participant.
    Optional,
    /// A room or piece of equipment.
    Resource,
}

impl AttendeeType {
    /// Returns the ordering rank (required=0, optional=1, resource=2).
    pub fn rank(self) -> u8 {
        match self {
            Self::Required => 0,
            Self::Optional => 1,
            Self::Resource => 2,
        }
    }

    /// Returns the wire/output name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for AttendeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one of the three known attendee types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attendee type '{0}'")]
pub struct UnknownAttendeeType(pub String);

impl FromStr for AttendeeType {
    type Err = UnknownAttendeeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "resource" => Ok(Self::Resource),
            _ => Err(UnknownAttendeeType(s.to_string())),
        }
    }
}

/// A meeting attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Display name, possibly empty.
    pub name: String,
    /// Email address, possibly empty for some resources.
    pub email: String,
    /// Attendee role.
    #[serde(rename = "type")]
    pub kind: AttendeeType,
}

impl Attendee {
    /// Creates a new attendee.
    pub fn new(name: impl Into<String>, email: impl Into<String>, kind: AttendeeType) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            kind,
        }
    }
}

/// The organizer of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Organizer {
    /// Creates a new organizer.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A calendar event in canonical form.
///
/// `start` and `end` are absolute instants carrying the offset of the
/// timezone the events were requested in, so the wall-clock value printed in
/// the output matches what the user sees in their calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Provider identifier of the event occurrence.
    pub id: String,
    /// Event title.
    pub subject: String,
    /// Whether the event spans whole days.
    pub is_all_day: bool,
    /// Start instant, rendered in the target timezone.
    pub start: DateTime<FixedOffset>,
    /// End instant, rendered in the target timezone.
    pub end: DateTime<FixedOffset>,
    /// Location display name, empty if none.
    pub location: String,
    /// The organizer.
    pub organizer: Organizer,
    /// Attendees, ordered by role, email, then name.
    pub attendees: Vec<Attendee>,
}

impl CalendarEvent {
    /// Creates an event with no location, organizer or attendees.
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            is_all_day: false,
            start,
            end,
            location: String::new(),
            organizer: Organizer::default(),
            attendees: Vec::new(),
        }
    }

    /// Builder method to mark the event as all-day.
    pub fn with_all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the organizer.
    pub fn with_organizer(mut self, organizer: Organizer) -> Self {
        self.organizer = organizer;
        self
    }

    /// Builder method to set the attendees.
    ///
    /// The list is stored as given; ordering is the normalizer's job.
    pub fn with_attendees(mut self, attendees: Vec<Attendee>) -> Self {
        self.attendees = attendees;
        self
    }
}
