//! Raid severity classification
//!
//! Assigns a [`RaidSeverity`] to damage dealt to a structure. A relevance
//! gate built from the include/exclude lists runs first, then the ordered
//! rule list; the first matching rule wins.

use std::collections::HashSet;

use tracing::trace;

use crate::catalog::{Relevance, TypeMembership};
use crate::config::RaidConfig;
use crate::model::{DamageRecord, RaidSeverity, StructureState};

/// Suffix the host appends to instantiated copies of a prefab.
const CLONE_SUFFIX: &str = "(clone)";

/// Generic entity suffixes stripped before fragment matching.
const ENTITY_SUFFIXES: &[&str] = &[".prefab", ".entity", ".deployed", "_deployed", ".worldmodel"];

/// Classification rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidRule {
    /// Target is the access-control hub.
    VitalHub,
    /// Damage is explosive or incendiary.
    Explosive,
    /// Target is a wall, floor or door; incidental splash is tolerated.
    Structural,
    /// Target is a decaying, player-placed deployable.
    Deployable,
    /// Any other owned target.
    Fallback,
}

impl RaidRule {
    /// Severity the rule assigns.
    #[must_use]
    pub const fn severity(self) -> RaidSeverity {
        match self {
            Self::VitalHub | Self::Explosive => RaidSeverity::Ban,
            Self::Structural => RaidSeverity::Ignore,
            Self::Deployable | Self::Fallback => RaidSeverity::Strike,
        }
    }
}

/// Compiled classifier.
#[derive(Debug, Clone, Default)]
pub struct RaidClassifier {
    membership: TypeMembership,
    explosive_items: HashSet<String>,
    explosive_fragments: Vec<String>,
}

impl RaidClassifier {
    /// Builds a classifier from resolved membership and the explosive lists.
    #[must_use]
    pub fn new(membership: TypeMembership, raid: &RaidConfig) -> Self {
        Self {
            membership,
            explosive_items: raid
                .explosive_items
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            explosive_fragments: raid
                .explosive_fragments
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Resolved membership sets.
    #[must_use]
    pub const fn membership(&self) -> &TypeMembership {
        &self.membership
    }

    /// Classifies damage to `target`.
    #[must_use]
    pub fn classify(&self, target: &StructureState, record: &DamageRecord) -> RaidSeverity {
        self.matching_rule(target, record)
            .map_or(RaidSeverity::None, RaidRule::severity)
    }

    /// The first rule matching damage to `target`, or `None` if the target
    /// is not raid-relevant.
    #[must_use]
    pub fn matching_rule(&self, target: &StructureState, record: &DamageRecord) -> Option<RaidRule> {
        match self.membership.relevance(target.kind, &target.prefab) {
            Relevance::Excluded => return None,
            Relevance::Unlisted if !self.membership.include_is_empty() => return None,
            Relevance::Included | Relevance::Unlisted => {}
        }

        let rule = if target.kind.is_vital_hub() {
            RaidRule::VitalHub
        } else if self.is_explosive(record) {
            RaidRule::Explosive
        } else if target.kind.is_structural() {
            RaidRule::Structural
        } else if target.decays && target.kind.is_deployable() {
            RaidRule::Deployable
        } else {
            RaidRule::Fallback
        };

        trace!(
            kind = %target.kind,
            prefab = %target.prefab,
            decays = target.decays,
            ?rule,
            "classified structure damage"
        );
        Some(rule)
    }

    /// Returns `true` if the damage is explosive or incendiary by any signal.
    #[must_use]
    pub fn is_explosive(&self, record: &DamageRecord) -> bool {
        if record.kind.is_explosive() {
            return true;
        }

        let item_match = [record.ammo.as_deref(), record.projectile.as_deref()]
            .into_iter()
            .flatten()
            .any(|id| self.explosive_items.contains(&id.trim().to_ascii_lowercase()));
        if item_match {
            return true;
        }

        [
            record.weapon.as_deref(),
            record.projectile.as_deref(),
            record.initiator_prefab.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(normalize_identifier)
        .any(|name| self.explosive_fragments.iter().any(|f| name.contains(f.as_str())))
    }
}

/// Normalizes a prefab or item identifier for fragment matching.
///
/// Lowercases, strips the clone suffix, keeps the last path segment and
/// strips generic entity suffixes.
#[must_use]
pub fn normalize_identifier(raw: &str) -> String {
    let mut name = raw.trim().to_ascii_lowercase();

    if let Some(stripped) = name.strip_suffix(CLONE_SUFFIX) {
        name = stripped.trim_end().to_string();
    }
    if let Some(idx) = name.rfind('/') {
        name = name[idx + 1..].to_string();
    }

    loop {
        let Some(stripped) = ENTITY_SUFFIXES
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
        else {
            break;
        };
        name = stripped.to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityKind;
    use crate::model::{DamageKind, EntityId};

    fn classifier(exclude: &[&str], include: &[&str]) -> RaidClassifier {
        let exclude: Vec<String> = exclude.iter().map(ToString::to_string).collect();
        let include: Vec<String> = include.iter().map(ToString::to_string).collect();
        let (membership, _) = TypeMembership::compile(&exclude, &include);
        RaidClassifier::new(membership, &RaidConfig::default())
    }

    fn structure(kind: EntityKind, prefab: &str) -> StructureState {
        StructureState {
            kind,
            prefab: prefab.to_string(),
            owner: Some(EntityId(1)),
            decays: true,
        }
    }

    fn hit() -> DamageRecord {
        DamageRecord::new(Some(EntityId(2)), EntityId(100), 5.0).with_kind(DamageKind::Slash)
    }

    #[test]
    fn vital_hub_bans_without_explosive() {
        let c = classifier(&[], &[]);
        let target = structure(EntityKind::ToolCupboard, "cupboard.tool.deployed");
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::Ban);
    }

    #[test]
    fn explosive_on_structural_block_bans() {
        let c = classifier(&[], &[]);
        let target = structure(EntityKind::BuildingBlock, "wall");
        let record = hit().with_kind(DamageKind::Explosion);
        assert_eq!(c.classify(&target, &record), RaidSeverity::Ban);
    }

    #[test]
    fn melee_on_structural_block_ignored() {
        let c = classifier(&[], &[]);
        let target = structure(EntityKind::Door, "door.hinged.wood");
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::Ignore);
    }

    #[test]
    fn deployable_strikes() {
        let c = classifier(&[], &[]);
        let target = structure(EntityKind::StorageBox, "box.wooden.large");
        assert_eq!(c.matching_rule(&target, &hit()), Some(RaidRule::Deployable));
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::Strike);
    }

    #[test]
    fn non_decaying_deployable_falls_through() {
        let c = classifier(&[], &[]);
        let mut target = structure(EntityKind::Barricade, "barricade.wood");
        target.decays = false;
        assert_eq!(c.matching_rule(&target, &hit()), Some(RaidRule::Fallback));
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::Strike);
    }

    #[test]
    fn non_decaying_target_still_strikes() {
        let c = classifier(&[], &[]);
        let mut target = structure(EntityKind::Minicopter, "minicopter.entity");
        target.decays = false;
        assert_eq!(c.matching_rule(&target, &hit()), Some(RaidRule::Fallback));
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::Strike);
    }

    #[test]
    fn excluded_target_is_not_relevant() {
        let c = classifier(&["Door"], &[]);
        let target = structure(EntityKind::Door, "door.hinged.wood");
        let record = hit().with_kind(DamageKind::Explosion);
        assert_eq!(c.classify(&target, &record), RaidSeverity::None);
    }

    #[test]
    fn include_list_gates_unlisted_targets() {
        let c = classifier(&[], &["StorageContainer*"]);
        assert_eq!(
            c.classify(&structure(EntityKind::Furnace, "furnace"), &hit()),
            RaidSeverity::Strike
        );
        assert_eq!(
            c.classify(&structure(EntityKind::Barricade, "barricade.wood"), &hit()),
            RaidSeverity::None
        );
    }

    #[test]
    fn excluded_prefab_beats_included_type() {
        let c = classifier(&["assets/prefabs/box.wooden.large.prefab"], &["BoxStorage"]);
        let target = structure(EntityKind::StorageBox, "assets/prefabs/box.wooden.large.prefab");
        assert_eq!(c.classify(&target, &hit()), RaidSeverity::None);
    }

    #[test]
    fn explosive_ammo_detected() {
        let c = classifier(&[], &[]);
        let record = hit().with_kind(DamageKind::Bullet).with_ammo("ammo.rifle.explosive");
        assert!(c.is_explosive(&record));
    }

    #[test]
    fn explosive_projectile_item_detected() {
        let c = classifier(&[], &[]);
        let mut record = hit();
        record.projectile = Some("AMMO.ROCKET.HV".to_string());
        assert!(c.is_explosive(&record));
    }

    #[test]
    fn explosive_weapon_fragment_detected() {
        let c = classifier(&[], &[]);
        let record = hit().with_weapon("assets/prefabs/weapons/rocketlauncher/rocket_launcher.entity.prefab(Clone)");
        assert!(c.is_explosive(&record));
    }

    #[test]
    fn initiator_fragment_detected() {
        let c = classifier(&[], &[]);
        let mut record = hit();
        record.initiator_prefab = Some("assets/prefabs/tools/c4/explosive.timed.deployed.prefab".to_string());
        assert!(c.is_explosive(&record));
    }

    #[test]
    fn plain_weapon_is_not_explosive() {
        let c = classifier(&[], &[]);
        let record = hit().with_weapon("assets/prefabs/weapons/knife/knife.entity.prefab");
        assert!(!c.is_explosive(&record));
    }

    #[test]
    fn normalize_strips_clone_path_and_suffixes() {
        assert_eq!(
            normalize_identifier("assets/prefabs/weapons/satchel/Satchel_Deployed.prefab (Clone)"),
            "satchel"
        );
        assert_eq!(normalize_identifier("rocket_basic.entity.prefab"), "rocket_basic");
        assert_eq!(normalize_identifier("knife.worldmodel"), "knife");
        assert_eq!(normalize_identifier("  Hammer  "), "hammer");
    }
}
