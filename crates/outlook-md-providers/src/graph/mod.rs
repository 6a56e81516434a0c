//! Microsoft Graph calendar access.

pub mod client;
pub mod wire;

pub use client::{DEFAULT_TIMEOUT, GRAPH_API_BASE, GraphCalendarClient};
pub use wire::{CalendarViewResponse, GraphEvent};
