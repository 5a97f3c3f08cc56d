//! Core value types shared by every engine component.

use serde::{Deserialize, Serialize};

use crate::catalog::EntityKind;

/// Identifier of any entity the host knows about (actors and structures).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Major damage type carried by a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Untyped damage.
    #[default]
    Generic,
    /// Firearm projectile.
    Bullet,
    /// Bladed melee.
    Slash,
    /// Blunt melee.
    Blunt,
    /// Piercing melee.
    Stab,
    /// Arrows and bolts.
    Arrow,
    /// Explosive blast.
    Explosion,
    /// Fire and incendiary damage.
    Heat,
    /// Degradation applied over time.
    Bleeding,
}

impl DamageKind {
    /// Returns `true` for blast and incendiary damage.
    #[must_use]
    pub const fn is_explosive(self) -> bool {
        matches!(self, Self::Explosion | Self::Heat)
    }
}

/// Body location a hit was registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitLocation {
    /// No specific location.
    #[default]
    None,
    /// Critical hit.
    Head,
    /// Torso.
    Chest,
    /// Arms, legs, hands, feet.
    Limb,
}

/// One inbound harm event as seen by the engine's hooks.
///
/// `weapon`, `projectile`, `ammo` and `initiator_prefab` are only used for
/// explosive detection and logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageRecord {
    /// Acting entity; non-actor sources are ignored.
    #[serde(default)]
    pub source: Option<EntityId>,
    /// Entity receiving the damage.
    pub target: EntityId,
    /// Raw magnitude.
    pub amount: f32,
    /// Damage type.
    #[serde(default)]
    pub kind: DamageKind,
    /// Called location, e.g. a head shot.
    #[serde(default)]
    pub location: HitLocation,
    /// Weapon prefab identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    /// Projectile prefab or backing item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectile: Option<String>,
    /// Consumed ammunition item identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammo: Option<String>,
    /// Prefab of the initiating entity when it is not the actor itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_prefab: Option<String>,
}

impl DamageRecord {
    /// Creates a record with the given source, target and magnitude.
    #[must_use]
    pub fn new(source: Option<EntityId>, target: EntityId, amount: f32) -> Self {
        Self {
            source,
            target,
            amount,
            ..Self::default()
        }
    }

    /// Sets the damage kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: DamageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the hit location.
    #[must_use]
    pub const fn with_location(mut self, location: HitLocation) -> Self {
        self.location = location;
        self
    }

    /// Sets the weapon identifier.
    #[must_use]
    pub fn with_weapon(mut self, weapon: impl Into<String>) -> Self {
        self.weapon = Some(weapon.into());
        self
    }

    /// Sets the consumed ammunition identifier.
    #[must_use]
    pub fn with_ammo(mut self, ammo: impl Into<String>) -> Self {
        self.ammo = Some(ammo.into());
        self
    }
}

/// Answer of the early, blocking hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Force the damage through.
    Allow,
    /// Block the damage.
    Deny,
    /// Let the host decide.
    NoOpinion,
}

/// Classification of an attack on a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidSeverity {
    /// Not raid relevant.
    None,
    /// Tolerated incidental damage.
    Ignore,
    /// Soft escalation through the strike ledger.
    Strike,
    /// Hard escalation.
    Ban,
}

impl std::fmt::Display for RaidSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Ignore => "ignore",
            Self::Strike => "strike",
            Self::Ban => "ban",
        };
        f.write_str(s)
    }
}

/// Which handling path a violation went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPath {
    /// Player-vs-player damage.
    Pvp,
    /// Player-vs-structure damage.
    Structure,
}

impl ViolationPath {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pvp => "pvp",
            Self::Structure => "structure",
        }
    }
}

impl std::fmt::Display for ViolationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Punishment step that produced the first measurable effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishMethod {
    /// Damage attributed to the victim.
    Reflect,
    /// Unattributed damage.
    Hurt,
    /// Forced termination.
    Die,
    /// No step had a measurable effect.
    Fail,
}

impl PunishMethod {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reflect => "reflect",
            Self::Hurt => "hurt",
            Self::Die => "die",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for PunishMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent consequence applied on escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationKind {
    /// Forced lethal reflection.
    DeathPenalty,
    /// Disconnect.
    Kick,
    /// Temporary ban.
    Ban,
}

impl EscalationKind {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeathPenalty => "death_penalty",
            Self::Kick => "kick",
            Self::Ban => "ban",
        }
    }
}

impl std::fmt::Display for EscalationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an actor as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    /// Display name.
    pub name: String,
    /// Remaining health.
    pub health: f32,
    /// Whether the actor is alive.
    pub alive: bool,
    /// Whether the actor is connected.
    pub connected: bool,
    /// Non-player actors are never punished.
    pub npc: bool,
}

impl ActorState {
    /// Returns `true` if the actor can still receive damage.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.alive && self.connected
    }
}

/// Snapshot of a structure as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureState {
    /// Concrete entity kind.
    pub kind: EntityKind,
    /// Prefab identifier.
    pub prefab: String,
    /// Owning actor, if any.
    pub owner: Option<EntityId>,
    /// Whether the structure decays when unprotected.
    pub decays: bool,
}

/// Damage the engine asks the host to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Magnitude to apply.
    pub amount: f32,
    /// Damage type.
    pub kind: DamageKind,
    /// Called location.
    pub location: HitLocation,
    /// Actor credited with the damage, `None` for unattributed damage.
    pub attacker: Option<EntityId>,
}
