//! Player-vs-player handling.

use tracing::debug;

use super::ReflectionEngine;
use super::dispatch::PunishRequest;
use super::ledger::StrikeOutcome;
use super::zones::ZoneKind;
use crate::config::{MessageArgs, ReflectionConfig};
use crate::model::{ActorState, DamageRecord, EntityId, HitLocation, Verdict, ViolationPath};

impl ReflectionEngine {
    /// Attacker state if `source` hitting `victim` is player-vs-player
    /// damage the engine judges at all.
    fn pvp_attacker(
        &self,
        config: &ReflectionConfig,
        source: EntityId,
        victim: EntityId,
        victim_state: &ActorState,
    ) -> Option<ActorState> {
        if !config.pvp.enabled || source == victim || victim_state.npc {
            return None;
        }
        let attacker = self.world.actor(source).filter(|a| !a.npc)?;
        if self.has_bypass(config, source) {
            debug!(attacker = %source, "bypass permission, pvp ignored");
            return None;
        }
        if self.world.are_allies(source, victim) {
            return None;
        }
        if self.both_in_zone(source, victim, ZoneKind::DynamicPvp) {
            return None;
        }
        Some(attacker)
    }

    pub(super) fn pre_pvp(&self, record: &DamageRecord, source: EntityId) -> Verdict {
        let now = self.clock.now();
        if self.state.borrow().bypass.peek(record.target, source, now) {
            return Verdict::Allow;
        }

        let Some(victim_state) = self.world.actor(record.target) else {
            return Verdict::NoOpinion;
        };
        let config = self.config();
        if self
            .pvp_attacker(&config, source, record.target, &victim_state)
            .is_none()
        {
            return Verdict::NoOpinion;
        }

        let forbidden = config.pvp.block_pvp
            || self.permissions.pve_forbids(source, record.target)
            || self.both_in_zone(source, record.target, ZoneKind::Safe);
        if !forbidden {
            return Verdict::NoOpinion;
        }

        self.store_intent(record, source);
        Verdict::Deny
    }

    pub(super) fn post_pvp(&self, record: &mut DamageRecord, source: EntityId, victim: &ActorState) {
        let config = self.config();
        let Some(attacker) = self.pvp_attacker(&config, source, record.target, victim) else {
            return;
        };
        if record.amount <= 0.0 {
            return;
        }

        self.violation(ViolationPath::Pvp, record, source, None);

        let mut magnitude = record.amount * config.pvp.reflect_percent / 100.0;
        if record.location == HitLocation::Head {
            magnitude *= config.pvp.headshot_multiplier;
        }
        if !config.pvp.damage_victim {
            record.amount = 0.0;
        }

        let f = &config.forgiveness;
        let outcome = f
            .tracks_strikes()
            .then(|| self.record_strike(ViolationPath::Pvp, source));
        let limit_reached = outcome == Some(StrikeOutcome::LimitReached);
        let death_penalty = limit_reached && f.death_penalty;

        let args = MessageArgs {
            attacker: &attacker.name,
            victim: &victim.name,
            count: match outcome {
                Some(StrikeOutcome::Recorded { count }) => count,
                _ => 0,
            },
            threshold: f.threshold,
            hours: f.ban_hours,
        };
        if let Some(StrikeOutcome::Recorded { .. }) = outcome {
            self.notify(source, &config.messages.strike_warning, &args);
        }

        if death_penalty {
            self.announce_death_penalty(source, ViolationPath::Pvp);
        }
        self.punish(PunishRequest {
            attacker: source,
            victim: record.target,
            magnitude,
            kind: record.kind,
            location: record.location,
            force_lethal: death_penalty,
        });
        self.notify(source, &config.messages.pvp_reflected, &args);

        if limit_reached {
            self.escalate(source, &attacker.name, ViolationPath::Pvp);
        }
    }
}
