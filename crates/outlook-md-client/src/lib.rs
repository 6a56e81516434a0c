//! Command-line interface, configuration and credential lookup
//!
//! This crate provides the `outlook-md` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod secret;
pub mod timezone;

pub use cli::Cli;
pub use context::RunContext;
pub use error::{ClientError, ClientResult};
