//! Shared integration-test harness: a simulated host wired to an engine,
//! plus helpers for spawning the CLI binary.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex};

use damage_reflection::catalog::EntityKind;
use damage_reflection::clock::ManualClock;
use damage_reflection::config::{ConfigLoader, ReflectionConfig, inline_origin};
use damage_reflection::engine::ReflectionEngine;
use damage_reflection::host::DamageHooks;
use damage_reflection::model::{DamageRecord, EntityId};
use damage_reflection::observability::EventEmitter;
use damage_reflection::sim::{SimAction, SimActor, SimStructure, SimWorld};
use serde_json::Value;

/// Attacker used by most tests.
pub const X: EntityId = EntityId(1);
/// Victim used by most tests.
pub const Y: EntityId = EntityId(2);

/// Parses YAML through the real loader and returns an owned config.
#[allow(clippy::missing_panics_doc)]
pub fn config(yaml: &str) -> ReflectionConfig {
    let result = ConfigLoader::with_defaults()
        .load_str(yaml, &inline_origin())
        .expect("test config should load");
    (*result.config).clone()
}

/// In-memory writer whose contents tests can read back.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    /// Every JSON line written so far.
    #[allow(clippy::missing_panics_doc)]
    pub fn events(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).expect("event line should be JSON"))
            .collect()
    }

    /// Events of one `type`.
    pub fn of_type(&self, ty: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|e| e["type"] == ty)
            .collect()
    }
}

/// A simulated host with an engine attached.
pub struct Harness {
    pub world: Rc<SimWorld>,
    pub clock: ManualClock,
    pub engine: Rc<ReflectionEngine>,
    pub events: SharedBuf,
}

impl Harness {
    /// Builds a harness with `X` and `Y` as 100-health players.
    pub fn new(config: ReflectionConfig) -> Self {
        let world = Rc::new(SimWorld::new());
        let clock = ManualClock::new();
        let events = SharedBuf::default();
        let engine = Rc::new(ReflectionEngine::with_events(
            Arc::new(config),
            world.collaborators(Rc::new(clock.clone())),
            Arc::new(EventEmitter::new(Box::new(events.clone()))),
        ));
        let hooks: Weak<dyn DamageHooks> = Rc::downgrade(&engine) as Weak<dyn DamageHooks>;
        world.attach(hooks);

        world.add_actor(X, SimActor::player("attacker", 100.0));
        world.add_actor(Y, SimActor::player("victim", 100.0));
        Self {
            world,
            clock,
            engine,
            events,
        }
    }

    /// Harness over the default configuration.
    pub fn default_config() -> Self {
        Self::new(ReflectionConfig::default())
    }

    /// Adds a structure owned by `owner` with 500 health.
    pub fn structure(&self, id: u64, kind: EntityKind, owner: EntityId) -> EntityId {
        let id = EntityId(id);
        self.world.add_structure(
            id,
            SimStructure {
                kind,
                prefab: kind.type_name().to_lowercase(),
                owner: Some(owner),
                decays: true,
                health: 500.0,
                authorized: std::iter::once(owner).collect(),
            },
        );
        id
    }

    /// Deals `amount` from `attacker` to `target` and returns what was applied.
    pub fn attack(&self, attacker: EntityId, target: EntityId, amount: f32) -> f32 {
        self.world
            .deal(DamageRecord::new(Some(attacker), target, amount))
    }

    /// Current health of an actor.
    #[allow(clippy::missing_panics_doc)]
    pub fn health(&self, id: EntityId) -> f32 {
        self.world.sim_actor(id).expect("actor exists").health
    }

    /// Current health of a structure.
    #[allow(clippy::missing_panics_doc)]
    pub fn structure_health(&self, id: EntityId) -> f32 {
        self.world.sim_structure(id).expect("structure exists").health
    }

    /// Kicks recorded so far.
    pub fn kicks(&self) -> Vec<SimAction> {
        self.world
            .actions()
            .into_iter()
            .filter(|a| matches!(a, SimAction::Kick { .. }))
            .collect()
    }

    /// Bans recorded so far.
    pub fn bans(&self) -> Vec<SimAction> {
        self.world
            .actions()
            .into_iter()
            .filter(|a| matches!(a, SimAction::Ban { .. }))
            .collect()
    }
}

/// Asserts two healths are equal within a small tolerance.
#[track_caller]
pub fn assert_health(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 0.001,
        "expected health {expected}, got {actual}"
    );
}

/// Path to a file under `tests/fixtures/`.
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the CLI binary to completion.
#[allow(clippy::missing_panics_doc)]
pub fn run_cli(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_damage-reflection"))
        .args(args)
        .env_remove("DAMAGE_REFLECTION_CONFIG")
        .env_remove("DAMAGE_REFLECTION_LOG")
        .env_remove("DAMAGE_REFLECTION_EVENTS_FILE")
        .env_remove("DAMAGE_REFLECTION_METRICS_PORT")
        .output()
        .expect("failed to spawn damage-reflection")
}
