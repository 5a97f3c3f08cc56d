//! Metrics collection.
//!
//! Prometheus-compatible counters and gauges recorded through the `metrics`
//! facade. Without an installed recorder every call is a no-op, so the
//! engine records unconditionally.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ReflectError;
use crate::model::{EscalationKind, PunishMethod, ViolationPath};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `ReflectError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), ReflectError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| ReflectError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "damage_reflection_violations_total",
        "Damage events judged violations, by path"
    );
    describe_counter!(
        "damage_reflection_punishments_total",
        "Punishments dispatched, by first effective method"
    );
    describe_counter!(
        "damage_reflection_escalations_total",
        "Persistent consequences triggered, by kind"
    );
    describe_counter!(
        "damage_reflection_strikes_total",
        "Strikes recorded, by path"
    );
    describe_counter!(
        "damage_reflection_enforcement_failures_total",
        "Kick or ban calls that failed"
    );
    describe_gauge!(
        "damage_reflection_table_entries",
        "Live entries per engine table"
    );
}

/// Records a detected violation.
pub fn record_violation(path: ViolationPath) {
    counter!("damage_reflection_violations_total", "path" => path.as_str()).increment(1);
}

/// Records a dispatched punishment.
pub fn record_punishment(method: PunishMethod) {
    counter!("damage_reflection_punishments_total", "method" => method.as_str()).increment(1);
}

/// Records an escalation.
pub fn record_escalation(kind: EscalationKind) {
    counter!("damage_reflection_escalations_total", "kind" => kind.as_str()).increment(1);
}

/// Records a strike.
pub fn record_strike(path: ViolationPath) {
    counter!("damage_reflection_strikes_total", "path" => path.as_str()).increment(1);
}

/// Records a failed enforcement call.
pub fn record_enforcement_failure(kind: EscalationKind) {
    counter!("damage_reflection_enforcement_failures_total", "kind" => kind.as_str())
        .increment(1);
}

/// Sets the live entry count of an engine table.
///
/// `table` is one of a fixed set of names chosen by the engine.
#[allow(clippy::cast_precision_loss)]
pub fn set_table_entries(table: &'static str, entries: usize) {
    gauge!("damage_reflection_table_entries", "table" => table).set(entries as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_violation(ViolationPath::Pvp);
        record_punishment(PunishMethod::Hurt);
        record_escalation(EscalationKind::Ban);
        record_strike(ViolationPath::Structure);
        record_enforcement_failure(EscalationKind::Kick);
        set_table_entries("bypass_tokens", 3);
    }
}
