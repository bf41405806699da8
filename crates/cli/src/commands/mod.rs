//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_server;
pub use validate::run_validate;

use anyhow::{Context, Result};
use contracts::ServerBlueprint;
use std::path::Path;

/// Load a configuration file, or the built-in defaults when none is given
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<ServerBlueprint> {
    let Some(path) = path else {
        return Ok(ServerBlueprint::default());
    };
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
