//! Core types: calendar events, time windows, output schema, tracing

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{Attendee, AttendeeType, CalendarEvent, Organizer, UnknownAttendeeType};
pub use format::{CliOutput, OUTPUT_SCHEMA_VERSION, OutputFormat, write_json};
pub use time::{TimeWindow, WindowError, WindowKind};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
