//! `auth login`, `auth logout` and `auth status`.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use outlook_md_providers::{TokenAuthority, TokenLifecycleManager, TokenStatus};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::RunContext;
use crate::error::ClientResult;

pub async fn login(ctx: &RunContext) -> ClientResult<()> {
    let manager = ctx.token_manager()?;
    login_with(&manager, ctx.cancel()).await?;
    println!("Signed in. Token cached at {}", manager.cache().path().display());
    Ok(())
}

pub fn logout(ctx: &RunContext) -> ClientResult<()> {
    let manager = ctx.token_manager()?;
    manager.logout()?;
    println!("Removed cached token {}", manager.cache().path().display());
    Ok(())
}

pub fn status(ctx: &RunContext) -> ClientResult<()> {
    let manager = ctx.token_manager()?;
    let status = manager.status()?;
    let stdout = std::io::stdout().lock();
    write_status(stdout, &manager, &status, Utc::now())?;
    Ok(())
}

async fn login_with<A: TokenAuthority>(
    manager: &TokenLifecycleManager<A>,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    manager.login(cancel).await?;
    info!(path = %manager.cache().path().display(), "token cached");
    Ok(())
}

fn write_status<W: Write, A: TokenAuthority>(
    mut out: W,
    manager: &TokenLifecycleManager<A>,
    status: &TokenStatus,
    now: DateTime<Utc>,
) -> std::io::Result<()> {
    writeln!(out, "Token cache: {}", manager.cache().path().display())?;
    if !status.cached {
        writeln!(out, "Status: not signed in")?;
        return Ok(());
    }

    let state = if status.valid { "valid" } else { "expired" };
    writeln!(out, "Status: {}", state)?;
    match status.expiry {
        Some(expiry) => {
            let remaining = expiry - now;
            let when = expiry.to_rfc3339_opts(SecondsFormat::Secs, true);
            if remaining.num_seconds() > 0 {
                writeln!(out, "Expires: {} (in {} min)", when, remaining.num_minutes())?;
            } else {
                writeln!(out, "Expires: {}", when)?;
            }
        }
        None => writeln!(out, "Expires: unknown")?,
    }
    writeln!(
        out,
        "Refresh token: {}",
        if status.has_refresh_token { "yes" } else { "no" }
    )?;
    Ok(())
}
