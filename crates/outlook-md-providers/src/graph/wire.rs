//! Microsoft Graph `calendarView` response types.
//!
//! Graph sends `null` for many absent fields, so every field is optional and
//! the accessors fall back to empty values.

use serde::Deserialize;

/// Top-level `calendarView` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarViewResponse {
    #[serde(default)]
    pub value: Option<Vec<GraphEvent>>,

    /// Present when the server has more pages than were returned.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

impl CalendarViewResponse {
    pub fn into_events(self) -> Vec<GraphEvent> {
        self.value.unwrap_or_default()
    }
}

/// One event occurrence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub start: Option<GraphDateTime>,
    #[serde(default)]
    pub end: Option<GraphDateTime>,
    #[serde(default)]
    pub location: Option<GraphLocation>,
    #[serde(default)]
    pub organizer: Option<GraphRecipient>,
    #[serde(default)]
    pub attendees: Option<Vec<GraphAttendee>>,
    #[serde(default)]
    pub response_status: Option<GraphResponseStatus>,
}

impl GraphEvent {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    pub fn location_name(&self) -> &str {
        self.location
            .as_ref()
            .and_then(|l| l.display_name.as_deref())
            .unwrap_or_default()
    }

    pub fn attendee_count(&self) -> usize {
        self.attendees.as_ref().map_or(0, Vec::len)
    }

    /// The signed-in user's response, e.g. `organizer` or `accepted`.
    pub fn response(&self) -> Option<&str> {
        self.response_status
            .as_ref()
            .and_then(|r| r.response.as_deref())
    }
}

/// Graph `dateTimeTimeZone`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDateTime {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLocation {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Graph `recipient` (used for the organizer).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecipient {
    #[serde(default)]
    pub email_address: Option<GraphEmailAddress>,
}

impl GraphRecipient {
    pub fn name(&self) -> &str {
        self.email_address
            .as_ref()
            .and_then(|e| e.name.as_deref())
            .unwrap_or_default()
    }

    pub fn address(&self) -> &str {
        self.email_address
            .as_ref()
            .and_then(|e| e.address.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttendee {
    #[serde(default)]
    pub email_address: Option<GraphEmailAddress>,
    /// `required`, `optional` or `resource`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphAttendee {
    pub fn name(&self) -> &str {
        self.email_address
            .as_ref()
            .and_then(|e| e.name.as_deref())
            .unwrap_or_default()
    }

    pub fn address(&self) -> &str {
        self.email_address
            .as_ref()
            .and_then(|e| e.address.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphResponseStatus {
    #[serde(default)]
    pub response: Option<String>,
}
