//! `simulate` command
//!
//! Replays a scenario file against an in-memory host and prints what the
//! engine did.

use std::sync::Arc;

use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::error::ReflectError;
use crate::observability::EventEmitter;
use crate::sim::{Scenario, ScenarioRunner, Step};

/// Replay a scenario.
///
/// # Errors
///
/// Returns a config error if the configuration does not load, a scenario
/// error if the scenario does not parse or validate, or an I/O error if
/// the events file or metrics listener cannot be opened.
pub async fn run(args: &SimulateArgs) -> Result<(), ReflectError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = super::load_config(args.config.as_deref())?;

    tracing::info!(scenario = %args.scenario.display(), "loading scenario");
    let scenario = Scenario::load(&args.scenario)?;

    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let mut runner = ScenarioRunner::new(scenario, config, Arc::clone(&events))?;
    let total = runner.steps().len();
    for index in 0..total {
        if args.realtime {
            if let Some(Step::Advance(by)) = runner.steps().get(index) {
                tokio::time::sleep(*by).await;
            }
        }
        if let Some(step) = runner.run_next() {
            tracing::debug!(
                step = step.index,
                tasks = step.tasks_run,
                actions = step.actions.len(),
                "{}",
                step.description
            );
        }
    }
    let report = runner.finish();

    events.flush();
    tracing::info!(events = events.event_count(), "replay complete");

    match args.format {
        OutputFormat::Human => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
