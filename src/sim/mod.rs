//! In-memory host for tests and scenario replay.
//!
//! [`SimWorld`] implements every collaborator trait and runs a two-phase
//! damage pipeline the way a real host does: the early hook may deny, the
//! late hook always sees the final record, and damage the engine applies
//! through [`World::hurt`] re-enters both hooks synchronously.

pub mod scenario;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::trace;

use crate::catalog::EntityKind;
use crate::clock::Clock;
use crate::error::EnforceError;
use crate::host::{Collaborators, DamageHooks, Enforcer, Permissions, World};
use crate::model::{ActorState, DamageRecord, EntityId, Hit, StructureState, Verdict};

pub use scenario::{Scenario, ScenarioReport, ScenarioRunner, Step};

/// A simulated actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimActor {
    /// Display name.
    pub name: String,
    /// Remaining health.
    pub health: f32,
    /// Alive flag.
    pub alive: bool,
    /// Connected flag.
    pub connected: bool,
    /// Non-player actor.
    pub npc: bool,
    /// Team id; actors sharing one are allies.
    pub team: Option<u32>,
    /// Holds the bypass permission.
    pub bypass: bool,
    /// A third-party rule cancels attributed damage to this actor.
    pub shielded: bool,
    /// Ignores all damage and forced death.
    pub god: bool,
}

impl SimActor {
    /// A connected, living player with `health`.
    #[must_use]
    pub fn player(name: impl Into<String>, health: f32) -> Self {
        Self {
            name: name.into(),
            health,
            alive: true,
            connected: true,
            npc: false,
            team: None,
            bypass: false,
            shielded: false,
            god: false,
        }
    }

    fn state(&self) -> ActorState {
        ActorState {
            name: self.name.clone(),
            health: self.health,
            alive: self.alive,
            connected: self.connected,
            npc: self.npc,
        }
    }
}

/// A simulated structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimStructure {
    /// Concrete kind.
    pub kind: EntityKind,
    /// Prefab identifier.
    pub prefab: String,
    /// Owner.
    pub owner: Option<EntityId>,
    /// Decays when unprotected.
    pub decays: bool,
    /// Remaining health.
    pub health: f32,
    /// Actors authorized on the governing hub.
    pub authorized: BTreeSet<EntityId>,
}

/// Side effect the engine asked the host for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SimAction {
    /// Message to one actor.
    Notify {
        /// Recipient.
        actor: EntityId,
        /// Rendered text.
        message: String,
    },
    /// Message to everyone.
    Broadcast {
        /// Rendered text.
        message: String,
    },
    /// Disconnect.
    Kick {
        /// Kicked actor.
        actor: EntityId,
        /// Reason.
        reason: String,
    },
    /// Temporary ban.
    Ban {
        /// Banned actor.
        actor: EntityId,
        /// Reason.
        reason: String,
        /// Duration in hours.
        hours: u32,
    },
    /// Continuous degradation started.
    Bleed {
        /// Affected actor.
        actor: EntityId,
        /// Amount.
        amount: f32,
    },
    /// Forced death.
    Kill {
        /// Killed actor.
        actor: EntityId,
    },
}

/// In-memory host world.
#[derive(Default)]
pub struct SimWorld {
    actors: RefCell<BTreeMap<EntityId, SimActor>>,
    structures: RefCell<BTreeMap<EntityId, SimStructure>>,
    hooks: RefCell<Option<Weak<dyn DamageHooks>>>,
    actions: RefCell<Vec<SimAction>>,
    pve: Cell<bool>,
    enforce_failure: RefCell<Option<EnforceError>>,
}

impl std::fmt::Debug for SimWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWorld")
            .field("actors", &self.actors)
            .field("structures", &self.structures)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

impl SimWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborator handles backed by this world.
    #[must_use]
    pub fn collaborators(self: &Rc<Self>, clock: Rc<dyn Clock>) -> Collaborators {
        Collaborators {
            world: Rc::clone(self) as Rc<dyn World>,
            permissions: Rc::clone(self) as Rc<dyn Permissions>,
            enforcer: Rc::clone(self) as Rc<dyn Enforcer>,
            clock,
        }
    }

    /// Routes damage through `hooks`.
    pub fn attach(&self, hooks: Weak<dyn DamageHooks>) {
        *self.hooks.borrow_mut() = Some(hooks);
    }

    /// Adds or replaces an actor.
    pub fn add_actor(&self, id: EntityId, actor: SimActor) {
        self.actors.borrow_mut().insert(id, actor);
    }

    /// Adds or replaces a structure.
    pub fn add_structure(&self, id: EntityId, structure: SimStructure) {
        self.structures.borrow_mut().insert(id, structure);
    }

    /// Mutates an actor in place. Returns `false` if it does not exist.
    pub fn update_actor(&self, id: EntityId, f: impl FnOnce(&mut SimActor)) -> bool {
        self.actors.borrow_mut().get_mut(&id).map(f).is_some()
    }

    /// Makes every PvP hit forbidden by the PvE rule collaborator.
    pub fn set_pve(&self, on: bool) {
        self.pve.set(on);
    }

    /// Makes every kick and ban fail with `error`.
    pub fn fail_enforcement(&self, error: Option<EnforceError>) {
        *self.enforce_failure.borrow_mut() = error;
    }

    /// Copy of an actor.
    #[must_use]
    pub fn sim_actor(&self, id: EntityId) -> Option<SimActor> {
        self.actors.borrow().get(&id).cloned()
    }

    /// Copy of a structure.
    #[must_use]
    pub fn sim_structure(&self, id: EntityId) -> Option<SimStructure> {
        self.structures.borrow().get(&id).cloned()
    }

    /// All actors, ordered by id.
    #[must_use]
    pub fn actors(&self) -> BTreeMap<EntityId, SimActor> {
        self.actors.borrow().clone()
    }

    /// Side effects recorded so far.
    #[must_use]
    pub fn actions(&self) -> Vec<SimAction> {
        self.actions.borrow().clone()
    }

    /// Messages sent to `actor`.
    #[must_use]
    pub fn notifications(&self, actor: EntityId) -> Vec<String> {
        self.actions
            .borrow()
            .iter()
            .filter_map(|a| match a {
                SimAction::Notify { actor: to, message } if *to == actor => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: SimAction) {
        trace!(?action, "sim action");
        self.actions.borrow_mut().push(action);
    }

    fn hooks(&self) -> Option<Rc<dyn DamageHooks>> {
        self.hooks.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Runs one damage event through the pipeline and applies the result.
    ///
    /// Returns the amount actually applied.
    pub fn deal(&self, mut record: DamageRecord) -> f32 {
        if let Some(hooks) = self.hooks() {
            if hooks.on_pre_damage(&record) == Verdict::Deny {
                record.amount = 0.0;
            }
            hooks.on_post_damage(&mut record);
        }

        let amount = record.amount.max(0.0);
        if let Some(actor) = self.actors.borrow_mut().get_mut(&record.target) {
            if !actor.alive || actor.god || (actor.shielded && record.source.is_some()) {
                return 0.0;
            }
            actor.health -= amount;
            if actor.health <= 0.0 {
                actor.health = 0.0;
                actor.alive = false;
            }
            return amount;
        }
        if let Some(structure) = self.structures.borrow_mut().get_mut(&record.target) {
            structure.health = (structure.health - amount).max(0.0);
            return amount;
        }
        0.0
    }

    fn enforce(&self, action: SimAction, actor: EntityId) -> Result<(), EnforceError> {
        if let Some(error) = self.enforce_failure.borrow().clone() {
            return Err(error);
        }
        let connected = self.actors.borrow().get(&actor).is_some_and(|a| a.connected);
        if !connected {
            return Err(EnforceError::NotConnected(actor.0));
        }
        self.update_actor(actor, |a| a.connected = false);
        self.record(action);
        Ok(())
    }
}

impl World for SimWorld {
    fn actor(&self, id: EntityId) -> Option<ActorState> {
        self.actors.borrow().get(&id).map(SimActor::state)
    }

    fn structure(&self, id: EntityId) -> Option<StructureState> {
        self.structures.borrow().get(&id).map(|s| StructureState {
            kind: s.kind,
            prefab: s.prefab.clone(),
            owner: s.owner,
            decays: s.decays,
        })
    }

    fn is_authorized(&self, actor: EntityId, structure: EntityId) -> bool {
        self.structures
            .borrow()
            .get(&structure)
            .is_some_and(|s| s.authorized.contains(&actor))
    }

    fn are_allies(&self, a: EntityId, b: EntityId) -> bool {
        let actors = self.actors.borrow();
        let team = |id: EntityId| actors.get(&id).and_then(|x| x.team);
        matches!((team(a), team(b)), (Some(x), Some(y)) if x == y)
    }

    fn hurt(&self, target: EntityId, hit: Hit) {
        let record = DamageRecord {
            source: hit.attacker,
            target,
            amount: hit.amount,
            kind: hit.kind,
            location: hit.location,
            ..DamageRecord::default()
        };
        self.deal(record);
    }

    fn kill(&self, actor: EntityId) {
        let killed = self
            .actors
            .borrow_mut()
            .get_mut(&actor)
            .filter(|a| a.alive && !a.god)
            .map(|a| {
                a.health = 0.0;
                a.alive = false;
            })
            .is_some();
        if killed {
            self.record(SimAction::Kill { actor });
        }
    }

    fn bleed(&self, actor: EntityId, amount: f32) {
        self.record(SimAction::Bleed { actor, amount });
    }
}

impl Permissions for SimWorld {
    fn has_bypass(&self, actor: EntityId) -> bool {
        self.actors.borrow().get(&actor).is_some_and(|a| a.bypass)
    }

    fn pve_forbids(&self, _attacker: EntityId, _victim: EntityId) -> bool {
        self.pve.get()
    }
}

impl Enforcer for SimWorld {
    fn notify(&self, actor: EntityId, message: &str) {
        self.record(SimAction::Notify {
            actor,
            message: message.to_string(),
        });
    }

    fn broadcast(&self, message: &str) {
        self.record(SimAction::Broadcast {
            message: message.to_string(),
        });
    }

    fn kick(&self, actor: EntityId, reason: &str) -> Result<(), EnforceError> {
        self.enforce(
            SimAction::Kick {
                actor,
                reason: reason.to_string(),
            },
            actor,
        )
    }

    fn temp_ban(&self, actor: EntityId, reason: &str, hours: u32) -> Result<(), EnforceError> {
        self.enforce(
            SimAction::Ban {
                actor,
                reason: reason.to_string(),
                hours,
            },
            actor,
        )
    }
}
