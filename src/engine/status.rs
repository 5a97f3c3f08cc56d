//! Read-only diagnostics snapshot.

use serde::Serialize;

use super::ReflectionEngine;
use super::zones::ZoneKind;
use crate::model::{EntityId, ViolationPath};

/// Configuration summary and live table sizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    /// PvP reflection enabled.
    pub pvp_enabled: bool,
    /// PvP reflection percentage.
    pub pvp_reflect_percent: f32,
    /// Structure reflection enabled.
    pub structure_enabled: bool,
    /// Structure reflection percentage.
    pub structure_reflect_percent: f32,
    /// Strike tracking active.
    pub forgiveness_enabled: bool,
    /// Strike threshold.
    pub strike_threshold: u32,
    /// Resolved raid include keys.
    pub raid_included: usize,
    /// Resolved raid exclude keys.
    pub raid_excluded: usize,
    /// Actors with a PvP strike record.
    pub pvp_strikes: usize,
    /// Actors with a structure strike record.
    pub structure_strikes: usize,
    /// Stored bypass tokens.
    pub bypass_tokens: usize,
    /// Stored reflection intents.
    pub reflection_intents: usize,
    /// Actors mid-dispatch.
    pub in_flight: usize,
    /// Deferred tasks waiting to run.
    pub pending_tasks: usize,
    /// Actors under an escalation lock.
    pub escalation_locks: usize,
    /// Actors in safe zones.
    pub safe_zone_members: usize,
    /// Actors in raid-exempt zones.
    pub raid_exempt_members: usize,
    /// Actors in dynamic PvP zones.
    pub dynamic_pvp_members: usize,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let on_off = |b: bool| if b { "on" } else { "off" };
        writeln!(
            f,
            "pvp:        {} ({}%)",
            on_off(self.pvp_enabled),
            self.pvp_reflect_percent
        )?;
        writeln!(
            f,
            "structure:  {} ({}%), raid include={} exclude={}",
            on_off(self.structure_enabled),
            self.structure_reflect_percent,
            self.raid_included,
            self.raid_excluded
        )?;
        writeln!(
            f,
            "forgiveness: {} (threshold {})",
            on_off(self.forgiveness_enabled),
            self.strike_threshold
        )?;
        writeln!(
            f,
            "strikes:    pvp={} structure={}",
            self.pvp_strikes, self.structure_strikes
        )?;
        writeln!(
            f,
            "tables:     tokens={} intents={} in_flight={} tasks={} locks={}",
            self.bypass_tokens,
            self.reflection_intents,
            self.in_flight,
            self.pending_tasks,
            self.escalation_locks
        )?;
        write!(
            f,
            "zones:      safe={} raid_exempt={} dynamic_pvp={}",
            self.safe_zone_members, self.raid_exempt_members, self.dynamic_pvp_members
        )
    }
}

impl ReflectionEngine {
    /// Snapshot of configuration and table sizes. No side effects.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let state = self.state.borrow();
        let config = &state.config;
        let membership = state.classifier.membership();
        EngineStatus {
            pvp_enabled: config.pvp.enabled,
            pvp_reflect_percent: config.pvp.reflect_percent,
            structure_enabled: config.structure.enabled,
            structure_reflect_percent: config.structure.reflect_percent,
            forgiveness_enabled: config.forgiveness.tracks_strikes(),
            strike_threshold: config.forgiveness.threshold,
            raid_included: membership.included_len(),
            raid_excluded: membership.excluded_len(),
            pvp_strikes: state.pvp_strikes.len(),
            structure_strikes: state.structure_strikes.len(),
            bypass_tokens: state.bypass.len(),
            reflection_intents: state.intents.len(),
            in_flight: self.in_flight.len(),
            pending_tasks: state.scheduler.len(),
            escalation_locks: state.escalation_locks.len(),
            safe_zone_members: state.zones.len(ZoneKind::Safe),
            raid_exempt_members: state.zones.len(ZoneKind::RaidExempt),
            dynamic_pvp_members: state.zones.len(ZoneKind::DynamicPvp),
        }
    }

    /// Current strike count for `actor` on one path.
    #[must_use]
    pub fn strike_count(&self, path: ViolationPath, actor: EntityId) -> u32 {
        let now = self.clock.now();
        let state = self.state.borrow();
        match path {
            ViolationPath::Pvp => state.pvp_strikes.count(actor, now),
            ViolationPath::Structure => state.structure_strikes.count(actor, now),
        }
    }
}
