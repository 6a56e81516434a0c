//! Target timezone resolution.

use std::path::Path;

use chrono_tz::Tz;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Name accepted for "the system zone".
pub const LOCAL: &str = "Local";

const LOCALTIME_LINK: &str = "/etc/localtime";

/// A resolved target zone together with the IANA name reported in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimezone {
    pub tz: Tz,
}

impl ResolvedTimezone {
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }
}

/// Resolves `--tz` / `[calendar] timezone`.
///
/// `Local` (any case) or an empty value means the system zone.
pub fn resolve(name: &str) -> ClientResult<ResolvedTimezone> {
    let name = name.trim();
    let name = if name.is_empty() || name.eq_ignore_ascii_case(LOCAL) {
        system_timezone_name(
            std::env::var("TZ").ok().as_deref(),
            Path::new(LOCALTIME_LINK),
        )
    } else {
        name.to_string()
    };

    let tz: Tz = name
        .parse()
        .map_err(|_| ClientError::Config(format!("invalid timezone '{}'", name)))?;
    debug!(timezone = tz.name(), "resolved target timezone");
    Ok(ResolvedTimezone { tz })
}

/// Finds the system zone name from `$TZ`, then the `/etc/localtime` symlink,
/// falling back to `UTC`.
fn system_timezone_name(tz_env: Option<&str>, localtime: &Path) -> String {
    if let Some(value) = tz_env {
        let value = value.trim_start_matches(':').trim();
        if !value.is_empty() && value.parse::<Tz>().is_ok() {
            return value.to_string();
        }
    }

    if let Ok(target) = std::fs::read_link(localtime) {
        let target = target.to_string_lossy();
        if let Some((_, zone)) = target.split_once("zoneinfo/")
            && zone.parse::<Tz>().is_ok()
        {
            return zone.to_string();
        }
    }

    "UTC".to_string()
}
