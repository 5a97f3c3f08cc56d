//! Scripted scenarios replayed against a [`SimWorld`].
//!
//! A scenario declares actors, structures and starting zone memberships,
//! then a list of steps. Time only moves on `advance` steps; deferred
//! engine tasks run after every step.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{SimAction, SimActor, SimStructure, SimWorld};
use crate::catalog::EntityKind;
use crate::clock::ManualClock;
use crate::config::ReflectionConfig;
use crate::engine::{EngineStatus, ReflectionEngine, ZoneKind};
use crate::error::ScenarioError;
use crate::host::DamageHooks;
use crate::model::{DamageKind, DamageRecord, EntityId, HitLocation};
use crate::observability::EventEmitter;

// ============================================================================
// Scenario document
// ============================================================================

/// A scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Actors in the world.
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    /// Structures in the world.
    #[serde(default)]
    pub structures: Vec<StructureSpec>,
    /// Zone memberships at start.
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    /// Steps, replayed in order, each written as a single-key map.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

/// Actor declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorSpec {
    /// Entity id.
    pub id: EntityId,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Starting health.
    #[serde(default = "default_health")]
    pub health: f32,
    /// Team id.
    #[serde(default)]
    pub team: Option<u32>,
    /// Non-player actor.
    #[serde(default)]
    pub npc: bool,
    /// Holds the bypass permission.
    #[serde(default)]
    pub bypass: bool,
    /// A third-party rule cancels attributed damage to this actor.
    #[serde(default)]
    pub shielded: bool,
    /// Ignores all damage.
    #[serde(default)]
    pub god: bool,
}

const fn default_health() -> f32 {
    100.0
}

/// Structure declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureSpec {
    /// Entity id.
    pub id: EntityId,
    /// Concrete kind.
    pub kind: EntityKind,
    /// Prefab identifier; defaults to the kind's type name.
    #[serde(default)]
    pub prefab: Option<String>,
    /// Owning actor.
    #[serde(default)]
    pub owner: Option<EntityId>,
    /// Decays when unprotected.
    #[serde(default = "default_true")]
    pub decays: bool,
    /// Starting health.
    #[serde(default = "default_structure_health")]
    pub health: f32,
    /// Actors authorized on the governing hub.
    #[serde(default)]
    pub authorized: BTreeSet<EntityId>,
}

const fn default_true() -> bool {
    true
}

const fn default_structure_health() -> f32 {
    500.0
}

/// Zone membership entry.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneSpec {
    /// Member actor.
    pub actor: EntityId,
    /// Zone kind.
    pub zone: ZoneKind,
}

/// One damage event.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttackStep {
    /// Attacking actor, omitted for environmental damage.
    #[serde(default)]
    pub attacker: Option<EntityId>,
    /// Damaged actor or structure.
    pub target: EntityId,
    /// Raw magnitude.
    pub amount: f32,
    /// Damage type.
    #[serde(default)]
    pub kind: DamageKind,
    /// Called location.
    #[serde(default)]
    pub location: HitLocation,
    /// Weapon prefab.
    #[serde(default)]
    pub weapon: Option<String>,
    /// Projectile prefab or item.
    #[serde(default)]
    pub projectile: Option<String>,
    /// Consumed ammunition item.
    #[serde(default)]
    pub ammo: Option<String>,
    /// Initiating entity prefab.
    #[serde(default)]
    pub initiator: Option<String>,
}

impl AttackStep {
    fn record(&self) -> DamageRecord {
        DamageRecord {
            source: self.attacker,
            target: self.target,
            amount: self.amount,
            kind: self.kind,
            location: self.location,
            weapon: self.weapon.clone(),
            projectile: self.projectile.clone(),
            ammo: self.ammo.clone(),
            initiator_prefab: self.initiator.clone(),
        }
    }
}

/// A scenario step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Run a damage event through the pipeline.
    Attack(AttackStep),
    /// An actor enters a zone.
    ZoneEnter(ZoneSpec),
    /// An actor leaves a zone.
    ZoneExit(ZoneSpec),
    /// Move simulated time forward.
    Advance(#[serde(with = "crate::config::schema::duration")] Duration),
}

impl Step {
    /// Short description for reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Attack(a) => {
                let attacker = a
                    .attacker
                    .map_or_else(|| "environment".to_string(), |id| id.to_string());
                format!("attack {attacker} -> {} ({} {:?})", a.target, a.amount, a.kind)
            }
            Self::ZoneEnter(z) => format!("{} enters {:?}", z.actor, z.zone),
            Self::ZoneExit(z) => format!("{} leaves {:?}", z.actor, z.zone),
            Self::Advance(d) => format!("advance {}", humantime::format_duration(*d)),
        }
    }
}

impl Scenario {
    /// Parses a scenario from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::ParseError` on malformed YAML.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ScenarioError> {
        serde_yaml::from_str(text).map_err(|e| ScenarioError::ParseError {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::ParseError` if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScenarioError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&text, path)
    }

    /// Checks entity references and ids.
    ///
    /// # Errors
    ///
    /// Returns the first duplicate id, unknown reference or invalid step.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut ids = BTreeSet::new();
        for id in self
            .actors
            .iter()
            .map(|a| a.id)
            .chain(self.structures.iter().map(|s| s.id))
        {
            if !ids.insert(id) {
                return Err(ScenarioError::DuplicateEntity(id.0));
            }
        }
        let actors: BTreeSet<EntityId> = self.actors.iter().map(|a| a.id).collect();

        for (step, s) in self.steps.iter().enumerate() {
            match s {
                Step::Attack(a) => {
                    if let Some(attacker) = a.attacker.filter(|id| !ids.contains(id)) {
                        return Err(ScenarioError::UnknownEntity {
                            step,
                            id: attacker.0,
                        });
                    }
                    if !ids.contains(&a.target) {
                        return Err(ScenarioError::UnknownEntity {
                            step,
                            id: a.target.0,
                        });
                    }
                    if !a.amount.is_finite() || a.amount < 0.0 {
                        return Err(ScenarioError::InvalidStep {
                            step,
                            message: "amount must be a non-negative number".to_string(),
                        });
                    }
                }
                Step::ZoneEnter(z) | Step::ZoneExit(z) => {
                    if !actors.contains(&z.actor) {
                        return Err(ScenarioError::UnknownEntity {
                            step,
                            id: z.actor.0,
                        });
                    }
                }
                Step::Advance(_) => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// Runner
// ============================================================================

/// What one step did.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Zero-based index.
    pub index: usize,
    /// Human description.
    pub description: String,
    /// Simulated time after the step.
    pub elapsed_ms: u128,
    /// Damage applied to the target, attack steps only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<f32>,
    /// Deferred tasks that ran after the step.
    pub tasks_run: usize,
    /// Host side effects the step caused.
    pub actions: Vec<SimAction>,
}

/// Outcome of a full replay.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Per-step results.
    pub steps: Vec<StepReport>,
    /// Final actor states.
    pub actors: BTreeMap<EntityId, SimActor>,
    /// Final engine diagnostics.
    pub status: EngineStatus,
}

impl std::fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "scenario: {name}")?;
        }
        for step in &self.steps {
            write!(f, "[{:>6}ms] #{} {}", step.elapsed_ms, step.index, step.description)?;
            if let Some(applied) = step.applied {
                write!(f, " => applied {applied}")?;
            }
            writeln!(f)?;
            for action in &step.actions {
                writeln!(f, "           {}", describe_action(action))?;
            }
        }
        writeln!(f, "actors:")?;
        for (id, actor) in &self.actors {
            writeln!(
                f,
                "  {id} {:<12} health={:<8} alive={} connected={}",
                actor.name, actor.health, actor.alive, actor.connected
            )?;
        }
        writeln!(f, "engine:")?;
        for line in self.status.to_string().lines() {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

fn describe_action(action: &SimAction) -> String {
    match action {
        SimAction::Notify { actor, message } => format!("notify {actor}: {message}"),
        SimAction::Broadcast { message } => format!("broadcast: {message}"),
        SimAction::Kick { actor, reason } => format!("kick {actor}: {reason}"),
        SimAction::Ban {
            actor,
            reason,
            hours,
        } => format!("ban {actor} for {hours}h: {reason}"),
        SimAction::Bleed { actor, amount } => format!("bleed {actor} ({amount})"),
        SimAction::Kill { actor } => format!("kill {actor}"),
    }
}

/// Replays a scenario step by step.
pub struct ScenarioRunner {
    scenario: Scenario,
    world: Rc<SimWorld>,
    clock: ManualClock,
    engine: Rc<ReflectionEngine>,
    reports: Vec<StepReport>,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("steps", &self.scenario.steps.len())
            .field("done", &self.reports.len())
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Builds the world and engine for `scenario`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario does not validate.
    pub fn new(
        scenario: Scenario,
        config: Arc<ReflectionConfig>,
        events: Arc<EventEmitter>,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let world = Rc::new(SimWorld::new());
        for spec in &scenario.actors {
            let mut actor = SimActor::player(
                spec.name.clone().unwrap_or_else(|| spec.id.to_string()),
                spec.health,
            );
            actor.team = spec.team;
            actor.npc = spec.npc;
            actor.bypass = spec.bypass;
            actor.shielded = spec.shielded;
            actor.god = spec.god;
            world.add_actor(spec.id, actor);
        }
        for spec in &scenario.structures {
            world.add_structure(
                spec.id,
                SimStructure {
                    kind: spec.kind,
                    prefab: spec
                        .prefab
                        .clone()
                        .unwrap_or_else(|| spec.kind.type_name().to_string()),
                    owner: spec.owner,
                    decays: spec.decays,
                    health: spec.health,
                    authorized: spec.authorized.clone(),
                },
            );
        }

        let clock = ManualClock::new();
        let engine = Rc::new(ReflectionEngine::with_events(
            config,
            world.collaborators(Rc::new(clock.clone())),
            events,
        ));
        let hooks: Weak<dyn DamageHooks> = Rc::downgrade(&engine) as Weak<dyn DamageHooks>;
        world.attach(hooks);

        for zone in &scenario.zones {
            engine.on_zone_enter(zone.actor, zone.zone);
        }

        Ok(Self {
            scenario,
            world,
            clock,
            engine,
            reports: Vec::new(),
        })
    }

    /// Steps in the scenario.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.scenario.steps
    }

    /// The simulated world.
    #[must_use]
    pub fn world(&self) -> &Rc<SimWorld> {
        &self.world
    }

    /// The engine under test.
    #[must_use]
    pub fn engine(&self) -> &Rc<ReflectionEngine> {
        &self.engine
    }

    /// Runs the next step. Returns `None` once every step has run.
    pub fn run_next(&mut self) -> Option<&StepReport> {
        let index = self.reports.len();
        let step = self.scenario.steps.get(index)?.clone();
        let before = self.world.actions().len();

        let applied = match &step {
            Step::Attack(attack) => Some(self.world.deal(attack.record())),
            Step::ZoneEnter(z) => {
                self.engine.on_zone_enter(z.actor, z.zone);
                None
            }
            Step::ZoneExit(z) => {
                self.engine.on_zone_exit(z.actor, z.zone);
                None
            }
            Step::Advance(by) => {
                self.clock.advance(*by);
                None
            }
        };
        let tasks_run = self.engine.tick();

        let actions = self.world.actions().split_off(before);
        let report = StepReport {
            index,
            description: step.describe(),
            elapsed_ms: self.clock.elapsed().as_millis(),
            applied,
            tasks_run,
            actions,
        };
        info!(step = index, description = %report.description, "step complete");
        self.reports.push(report);
        self.reports.last()
    }

    /// Runs every remaining step and returns the report.
    #[must_use]
    pub fn run_to_end(mut self) -> ScenarioReport {
        while self.run_next().is_some() {}
        self.finish()
    }

    /// Final report for the steps run so far.
    #[must_use]
    pub fn finish(self) -> ScenarioReport {
        ScenarioReport {
            name: self.scenario.name.clone(),
            status: self.engine.status(),
            actors: self.world.actors(),
            steps: self.reports,
        }
    }
}
