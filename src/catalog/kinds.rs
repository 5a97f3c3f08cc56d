//! Closed entity-kind enumeration and its static type hierarchy.
//!
//! Every concrete entity the host can hand the engine is one [`EntityKind`].
//! Configuration refers to kinds by type name, either exactly or together
//! with everything that derives from it, so the hierarchy is kept as a
//! static table of `(name, parent, concrete kind)` rows walked once per
//! configuration build.

use serde::{Deserialize, Serialize};

/// Concrete entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Walls, floors, foundations and other stability blocks.
    BuildingBlock,
    /// Hinged doors and hatches.
    Door,
    /// Free-standing external walls.
    HighWall,
    /// Plain storage box.
    StorageBox,
    /// Access-control hub governing authorization over a base.
    ToolCupboard,
    /// Smelting furnace.
    Furnace,
    /// Respawn point.
    SleepingBag,
    /// Crafting bench.
    Workbench,
    /// Deployable barricade.
    Barricade,
    /// Automated defensive turret.
    AutoTurret,
    /// Small helicopter.
    Minicopter,
    /// Player character.
    Player,
}

impl EntityKind {
    /// All concrete kinds, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::BuildingBlock,
        Self::Door,
        Self::HighWall,
        Self::StorageBox,
        Self::ToolCupboard,
        Self::Furnace,
        Self::SleepingBag,
        Self::Workbench,
        Self::Barricade,
        Self::AutoTurret,
        Self::Minicopter,
        Self::Player,
    ];

    /// Runtime type name of this kind.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        TYPES
            .iter()
            .find(|t| t.kind == Some(self))
            .map_or("BaseEntity", |t| t.name)
    }

    /// Structural building elements (wall, floor, door family).
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(self, Self::BuildingBlock | Self::Door | Self::HighWall)
    }

    /// The access-control hub of a protected structure.
    #[must_use]
    pub const fn is_vital_hub(self) -> bool {
        matches!(self, Self::ToolCupboard)
    }

    /// Player-placed, non-structural items.
    #[must_use]
    pub const fn is_deployable(self) -> bool {
        matches!(
            self,
            Self::StorageBox
                | Self::ToolCupboard
                | Self::Furnace
                | Self::SleepingBag
                | Self::Workbench
                | Self::Barricade
                | Self::AutoTurret
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One row of the type hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// Runtime type name.
    pub name: &'static str,
    /// Base type name, `None` for the root.
    pub parent: Option<&'static str>,
    /// Concrete kind, `None` for abstract types.
    pub kind: Option<EntityKind>,
}

const fn abstract_type(name: &'static str, parent: Option<&'static str>) -> TypeInfo {
    TypeInfo {
        name,
        parent,
        kind: None,
    }
}

const fn concrete(name: &'static str, parent: &'static str, kind: EntityKind) -> TypeInfo {
    TypeInfo {
        name,
        parent: Some(parent),
        kind: Some(kind),
    }
}

/// The full type hierarchy.
pub const TYPES: &[TypeInfo] = &[
    abstract_type("BaseEntity", None),
    abstract_type("BaseCombatEntity", Some("BaseEntity")),
    abstract_type("DecayEntity", Some("BaseCombatEntity")),
    abstract_type("StabilityEntity", Some("DecayEntity")),
    concrete("BuildingBlock", "StabilityEntity", EntityKind::BuildingBlock),
    abstract_type("AnimatedBuildingBlock", Some("StabilityEntity")),
    concrete("Door", "AnimatedBuildingBlock", EntityKind::Door),
    concrete("SimpleBuildingBlock", "StabilityEntity", EntityKind::HighWall),
    abstract_type("StorageContainer", Some("DecayEntity")),
    concrete("BoxStorage", "StorageContainer", EntityKind::StorageBox),
    concrete("BuildingPrivilege", "StorageContainer", EntityKind::ToolCupboard),
    concrete("BaseOven", "StorageContainer", EntityKind::Furnace),
    concrete("SleepingBag", "DecayEntity", EntityKind::SleepingBag),
    concrete("Workbench", "DecayEntity", EntityKind::Workbench),
    concrete("Barricade", "DecayEntity", EntityKind::Barricade),
    concrete("AutoTurret", "BaseCombatEntity", EntityKind::AutoTurret),
    abstract_type("BaseVehicle", Some("BaseCombatEntity")),
    concrete("Minicopter", "BaseVehicle", EntityKind::Minicopter),
    concrete("BasePlayer", "BaseCombatEntity", EntityKind::Player),
];

/// Looks up a type by exact (case-sensitive) name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static TypeInfo> {
    TYPES.iter().find(|t| t.name == name)
}

/// Returns `true` if `info` is `ancestor` or derives from it.
#[must_use]
pub fn derives_from(info: &TypeInfo, ancestor: &str) -> bool {
    let mut current = Some(info);
    while let Some(t) = current {
        if t.name == ancestor {
            return true;
        }
        current = t.parent.and_then(lookup);
    }
    false
}

/// Concrete kinds that are `ancestor` or derive from it.
#[must_use]
pub fn concrete_descendants(ancestor: &str) -> Vec<EntityKind> {
    TYPES
        .iter()
        .filter(|t| derives_from(t, ancestor))
        .filter_map(|t| t.kind)
        .collect()
}

/// Suggests a known type name for a likely typo.
///
/// Returns the closest name if its Damerau-Levenshtein distance is at most 3.
#[must_use]
pub fn suggest_type(input: &str) -> Option<&'static str> {
    TYPES
        .iter()
        .map(|t| (t.name, strsim::damerau_levenshtein(input, t.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}
