//! Output document.
//!
//! The CLI prints a single JSON object to stdout. The `version` field is the
//! schema version; consumers should refuse documents with a version they do
//! not know.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::event::CalendarEvent;
use crate::time::TimeWindow;

/// Current output schema version.
pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

/// Supported output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
}

/// The document written to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliOutput {
    /// Schema version, always [`OUTPUT_SCHEMA_VERSION`] when produced here.
    pub version: u32,
    /// IANA name of the timezone the events are rendered in.
    pub timezone: String,
    /// The queried window.
    pub window: TimeWindow,
    /// Events ordered by start time.
    pub events: Vec<CalendarEvent>,
}

impl CliOutput {
    pub fn new(timezone: impl Into<String>, window: TimeWindow, events: Vec<CalendarEvent>) -> Self {
        Self {
            version: OUTPUT_SCHEMA_VERSION,
            timezone: timezone.into(),
            window,
            events,
        }
    }
}

/// Writes `output` as two-space indented JSON followed by a newline.
pub fn write_json<W: Write>(mut writer: W, output: &CliOutput) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, output)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
