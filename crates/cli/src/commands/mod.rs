//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::GuardBlueprint;

use crate::error::CliError;

/// Load a blueprint, failing early with a clear message for a missing file
fn load_blueprint(path: &Path) -> Result<GuardBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
