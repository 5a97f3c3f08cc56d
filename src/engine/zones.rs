//! Zone membership sets fed by external zone providers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::EntityId;

/// Zones the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Safe or event zone; PvP between two members is forbidden.
    Safe,
    /// Raid-exempt zone; structure damage from members is never punished.
    RaidExempt,
    /// Dynamic PvP zone; PvP between two members is allowed.
    DynamicPvp,
}

/// Actors currently inside each zone kind.
#[derive(Debug, Clone, Default)]
pub struct Zones {
    safe: HashSet<EntityId>,
    raid_exempt: HashSet<EntityId>,
    dynamic_pvp: HashSet<EntityId>,
}

impl Zones {
    fn set(&self, zone: ZoneKind) -> &HashSet<EntityId> {
        match zone {
            ZoneKind::Safe => &self.safe,
            ZoneKind::RaidExempt => &self.raid_exempt,
            ZoneKind::DynamicPvp => &self.dynamic_pvp,
        }
    }

    fn set_mut(&mut self, zone: ZoneKind) -> &mut HashSet<EntityId> {
        match zone {
            ZoneKind::Safe => &mut self.safe,
            ZoneKind::RaidExempt => &mut self.raid_exempt,
            ZoneKind::DynamicPvp => &mut self.dynamic_pvp,
        }
    }

    /// Records that `actor` entered `zone`.
    pub fn enter(&mut self, actor: EntityId, zone: ZoneKind) {
        self.set_mut(zone).insert(actor);
    }

    /// Records that `actor` left `zone`.
    pub fn exit(&mut self, actor: EntityId, zone: ZoneKind) {
        self.set_mut(zone).remove(&actor);
    }

    /// Whether `actor` is inside `zone`.
    #[must_use]
    pub fn contains(&self, actor: EntityId, zone: ZoneKind) -> bool {
        self.set(zone).contains(&actor)
    }

    /// Whether both actors are inside `zone`.
    #[must_use]
    pub fn both_in(&self, a: EntityId, b: EntityId, zone: ZoneKind) -> bool {
        let set = self.set(zone);
        set.contains(&a) && set.contains(&b)
    }

    /// Members of `zone`.
    #[must_use]
    pub fn len(&self, zone: ZoneKind) -> usize {
        self.set(zone).len()
    }

    /// Drops every membership.
    pub fn clear(&mut self) {
        self.safe.clear();
        self.raid_exempt.clear();
        self.dynamic_pvp.clear();
    }
}
