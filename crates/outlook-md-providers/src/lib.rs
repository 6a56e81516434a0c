//! Authentication and calendar access for outlook-md.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌────────────────────┐
//! │ TokenLifecycleManager│────▶│ TokenCache (file)  │
//! └──────────┬───────────┘     └────────────────────┘
//!            │ TokenAuthority
//!            ▼
//! ┌──────────────────────────┐
//! │ DeviceCodeAuthenticator  │  login.microsoftonline.com
//! └──────────────────────────┘
//!            │ access token
//!            ▼
//! ┌──────────────────────┐
//! │ GraphCalendarClient  │  graph.microsoft.com /me/calendarView
//! └──────────┬───────────┘
//!            │ GraphEvent
//!            ▼ normalize_events()
//!     ┌───────────────┐
//!     │ CalendarEvent │
//!     └───────────────┘
//! ```

pub mod auth;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod source;

// Re-export main types at crate root
pub use auth::{
    Credential, DeviceAuthorizationGrant, DeviceCodeAuthenticator, TokenAuthority, TokenCache,
    TokenLifecycleManager, TokenRecord, TokenStatus,
};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use graph::GraphCalendarClient;
pub use normalize::{NormalizeOptions, normalize_event, normalize_events};
pub use source::{BoxFuture, CalendarSource};
