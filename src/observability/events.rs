//! Structured event stream.
//!
//! Discrete, typed events emitted while the engine handles violations.
//! Events are serialized as newline-delimited JSON (JSONL) and carry a
//! monotonically increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{EntityId, EscalationKind, PunishMethod, RaidSeverity, ViolationPath};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted by the engine.
///
/// Each variant is tagged with `"type"` when serialized so consumers can
/// dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A damage event was judged a violation.
    ViolationDetected {
        /// When the violation was detected.
        timestamp: DateTime<Utc>,
        /// Handling path.
        path: ViolationPath,
        /// Offending actor.
        attacker: EntityId,
        /// Damaged actor or structure.
        target: EntityId,
        /// Raw damage magnitude.
        amount: f32,
        /// Raid severity, structure path only.
        #[serde(skip_serializing_if = "Option::is_none")]
        severity: Option<RaidSeverity>,
    },

    /// A strike was recorded against an actor.
    StrikeRecorded {
        /// When the strike was recorded.
        timestamp: DateTime<Utc>,
        /// Ledger the strike went into.
        path: ViolationPath,
        /// Offending actor.
        actor: EntityId,
        /// Count after the strike; `0` when the limit was reached.
        count: u32,
        /// Configured threshold.
        threshold: u32,
        /// Whether this strike reached the threshold.
        limit_reached: bool,
    },

    /// The dispatcher finished a punishment.
    PunishmentApplied {
        /// When the punishment finished.
        timestamp: DateTime<Utc>,
        /// Punished actor.
        attacker: EntityId,
        /// Actor or structure credited.
        victim: EntityId,
        /// Magnitude after the lethal floor.
        magnitude: f32,
        /// First step with a measurable effect.
        method: PunishMethod,
        /// Whether death was predicted.
        lethal: bool,
    },

    /// A persistent consequence was triggered.
    Escalated {
        /// When the escalation fired.
        timestamp: DateTime<Utc>,
        /// Escalated actor.
        actor: EntityId,
        /// Consequence.
        kind: EscalationKind,
        /// Path that triggered it.
        path: ViolationPath,
    },

    /// An enforcement collaborator failed; the consequence was dropped.
    EnforcementFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Actor the enforcement targeted.
        actor: EntityId,
        /// Consequence that failed.
        kind: EscalationKind,
        /// Error reported by the collaborator.
        error: String,
    },

    /// The engine was (re)configured.
    ConfigReloaded {
        /// When the configuration was applied.
        timestamp: DateTime<Utc>,
        /// Resolved include keys.
        included: usize,
        /// Resolved exclude keys.
        excluded: usize,
        /// Raid entries skipped during resolution.
        skipped_entries: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes the underlying
/// writer. Serialization or I/O failures are silently dropped; a broken
/// event sink must never interrupt damage handling.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that appends to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Flushes the underlying writer, ignoring failures.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
