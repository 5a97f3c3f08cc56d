//! Host collaborator traits
//!
//! The engine never owns world state. Everything it reads or changes goes
//! through these traits, implemented by the embedding host (or by
//! [`SimWorld`](crate::sim::SimWorld) in tests and the simulator).
//!
//! All calls happen on the host's simulation thread. [`World::hurt`] and
//! [`World::kill`] may synchronously re-enter the engine through
//! [`DamageHooks`].

use std::rc::Rc;

use crate::clock::Clock;
use crate::error::EnforceError;
use crate::model::{ActorState, DamageRecord, EntityId, Hit, StructureState, Verdict};

/// Read and mutate world state.
pub trait World {
    /// Snapshot of an actor, `None` if it does not exist (anymore).
    fn actor(&self, id: EntityId) -> Option<ActorState>;

    /// Snapshot of a structure, `None` if `id` is not a structure.
    fn structure(&self, id: EntityId) -> Option<StructureState>;

    /// Whether `actor` is authorized on the vital hub governing `structure`.
    fn is_authorized(&self, actor: EntityId, structure: EntityId) -> bool;

    /// Whether two actors are team members or friends.
    fn are_allies(&self, a: EntityId, b: EntityId) -> bool;

    /// Applies damage to an actor through the host's normal damage pipeline.
    fn hurt(&self, target: EntityId, hit: Hit);

    /// Forces an actor's death.
    fn kill(&self, actor: EntityId);

    /// Starts continuous degradation on an actor.
    fn bleed(&self, actor: EntityId, amount: f32);
}

/// Permission and policy queries owned by other plugins.
pub trait Permissions {
    /// Whether the actor holds the bypass permission.
    fn has_bypass(&self, actor: EntityId) -> bool;

    /// Whether an external PvE rule forbids `attacker` damaging `victim`.
    fn pve_forbids(&self, attacker: EntityId, victim: EntityId) -> bool {
        let _ = (attacker, victim);
        false
    }
}

/// Notification and enforcement channels.
pub trait Enforcer {
    /// Sends a message to one actor.
    fn notify(&self, actor: EntityId, message: &str);

    /// Sends a message to everyone.
    fn broadcast(&self, message: &str);

    /// Disconnects an actor.
    ///
    /// # Errors
    ///
    /// Returns an error if the host could not carry out the kick.
    fn kick(&self, actor: EntityId, reason: &str) -> Result<(), EnforceError>;

    /// Bans an actor for `hours`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host could not carry out the ban.
    fn temp_ban(&self, actor: EntityId, reason: &str, hours: u32) -> Result<(), EnforceError>;
}

/// The two damage pipeline entry points.
///
/// Object safe so a host can keep a `Weak<dyn DamageHooks>` and call back
/// into the engine from inside its own damage pipeline.
pub trait DamageHooks {
    /// Early, blocking phase. Can only allow, deny or abstain.
    fn on_pre_damage(&self, record: &DamageRecord) -> Verdict;

    /// Late phase with the final record. May nullify `record.amount`.
    fn on_post_damage(&self, record: &mut DamageRecord);
}

/// Everything the engine borrows from its host.
#[derive(Clone)]
pub struct Collaborators {
    /// World state.
    pub world: Rc<dyn World>,
    /// Permission queries.
    pub permissions: Rc<dyn Permissions>,
    /// Notification and enforcement.
    pub enforcer: Rc<dyn Enforcer>,
    /// Time source.
    pub clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
