//! CLI command implementations

pub mod bans;
pub mod champions;
pub mod matchups;
pub mod status;
pub mod synergies;
pub mod warm;

use std::path::PathBuf;

use anyhow::{Context, Result};
use draftstats_core::DraftStatsContext;

/// Get the draftstats directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DRAFTSTATS_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".draftstats"))
}

/// Load configuration and build the backends it names
pub fn get_context() -> Result<DraftStatsContext> {
    let data_dir = get_data_dir()?;
    DraftStatsContext::new(&data_dir).context("Failed to initialize draftstats context")
}
