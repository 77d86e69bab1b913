use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;

pub const SCHEMA_ENV: &str = "ATOMIC_WEAVER_SCHEMA";

/// Schema-root resolution ladder: --schema flag, then the environment
/// variable, then the per-user default directory.
pub fn resolve_schema_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.schema.clone() {
        return Ok(p);
    }

    if let Ok(p) = env::var(SCHEMA_ENV) {
        return Ok(PathBuf::from(p));
    }

    Ok(atomic_weaver_home()?.join("schema"))
}

fn atomic_weaver_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("atomic-weaver"))
}
