//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod simulate;
pub mod status;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, ReflectionConfig};
use crate::error::ReflectError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), ReflectError> {
    match cli.command {
        Commands::Validate(args) => validate::run(&args),
        Commands::Simulate(args) => simulate::run(&args).await,
        Commands::Status(args) => status::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads `path`, logging warnings, or falls back to defaults.
fn load_config(path: Option<&Path>) -> Result<Arc<ReflectionConfig>, ReflectError> {
    let Some(path) = path else {
        tracing::info!("no configuration given, using defaults");
        return Ok(Arc::new(ReflectionConfig::default()));
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let result = ConfigLoader::with_defaults().load(path)?;
    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(result.config)
}
