//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use outlook_md_core::OutputFormat;

/// Export Outlook calendar events as JSON.
#[derive(Debug, Parser)]
#[command(name = "outlook-md", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short, env = "OUTLOOK_MD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Json, global = true)]
    pub format: FormatArg,

    /// Target timezone (IANA name or "Local") [default: config, then Local]
    #[arg(long, global = true)]
    pub tz: Option<String>,

    /// Use this access token instead of signing in
    #[arg(long, env = "OUTLOOK_MD_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Token cache file [default: ~/.outlook-md/token.json]
    #[arg(long, global = true)]
    pub token_path: Option<PathBuf>,

    /// Drop events you organized that have no attendees
    #[arg(long, global = true)]
    pub skip_solo_events: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Events from local midnight today to tomorrow
    Today,

    /// Events for tomorrow
    Tomorrow,

    /// Events from this Monday to next Monday
    Week,

    /// Events in an explicit range
    Range {
        /// Start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End, exclusive (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end: String,
    },

    /// Manage the cached sign-in
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum AuthAction {
    /// Sign in with a device code and cache the token
    Login,
    /// Delete the cached token
    Logout,
    /// Show the cached token state
    Status,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print config and token cache paths
    Path,
    /// Print the effective configuration
    Dump,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn named_windows() {
        let cli = Cli::try_parse_from(["outlook-md", "week"]).unwrap();
        assert!(matches!(cli.command, Command::Week));
        assert_eq!(cli.format, FormatArg::Json);
        assert!(!cli.skip_solo_events);
    }

    #[test]
    fn global_flags_before_and_after_command() {
        let cli = Cli::try_parse_from(["outlook-md", "--tz", "Europe/Paris", "today"]).unwrap();
        assert_eq!(cli.tz.as_deref(), Some("Europe/Paris"));

        let cli = Cli::try_parse_from(["outlook-md", "tomorrow", "--skip-solo-events"]).unwrap();
        assert!(cli.skip_solo_events);
        assert!(matches!(cli.command, Command::Tomorrow));
    }

    #[test]
    fn range_requires_both_bounds() {
        assert!(Cli::try_parse_from(["outlook-md", "range", "--start", "2026-01-05"]).is_err());
        let cli = Cli::try_parse_from([
            "outlook-md",
            "range",
            "--start",
            "2026-01-05",
            "--end",
            "2026-01-07",
        ])
        .unwrap();
        match cli.command {
            Command::Range { start, end } => {
                assert_eq!(start, "2026-01-05");
                assert_eq!(end, "2026-01-07");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(Cli::try_parse_from(["outlook-md", "--format", "markdown", "today"]).is_err());
    }

    #[test]
    fn auth_subcommands() {
        let cli = Cli::try_parse_from(["outlook-md", "auth", "status"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Auth {
                action: AuthAction::Status
            }
        ));
    }
}
