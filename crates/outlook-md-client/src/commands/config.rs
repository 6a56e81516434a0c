//! Configuration commands.

use std::io::Write;

use crate::context::RunContext;
use crate::error::{ClientError, ClientResult};

/// Prints the loaded configuration as TOML.
pub fn dump(ctx: &RunContext) -> ClientResult<()> {
    let stdout = std::io::stdout().lock();
    write_dump(stdout, ctx)
}

/// Shows where the config file and token cache live.
pub fn path(ctx: &RunContext) -> ClientResult<()> {
    println!("config: {}", ctx.config_path().display());
    println!("token cache: {}", ctx.token_path()?.display());
    Ok(())
}

fn write_dump<W: Write>(mut out: W, ctx: &RunContext) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(ctx.config())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    writeln!(out, "# config.toml ({})", ctx.config_path().display())?;
    writeln!(out, "{}", toml_str)?;
    Ok(())
}
