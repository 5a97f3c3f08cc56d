//! `status` command
//!
//! Builds an engine over an empty simulated host and prints its
//! diagnostics snapshot, which summarizes how a configuration resolved.

use std::rc::Rc;

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::clock::SystemClock;
use crate::engine::ReflectionEngine;
use crate::error::ReflectError;
use crate::sim::SimWorld;

/// Print the engine status for a configuration.
///
/// # Errors
///
/// Returns a config error if the configuration does not load.
pub fn run(args: &StatusArgs) -> Result<(), ReflectError> {
    let config = super::load_config(args.config.as_deref())?;
    let world = Rc::new(SimWorld::new());
    let engine = ReflectionEngine::new(config, world.collaborators(Rc::new(SystemClock)));
    let status = engine.status();

    match args.format {
        OutputFormat::Human => println!("{status}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}
