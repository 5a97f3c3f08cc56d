//! Player-vs-structure handling.

use tracing::debug;

use super::ReflectionEngine;
use super::dispatch::PunishRequest;
use super::ledger::StrikeOutcome;
use super::zones::ZoneKind;
use crate::config::{MessageArgs, ReflectionConfig};
use crate::model::{ActorState, DamageRecord, EntityId, RaidSeverity, StructureState, Verdict, ViolationPath};

impl ReflectionEngine {
    /// Attacker state and raid severity if `source` damaging `target` is
    /// judged at all.
    fn structure_violation(
        &self,
        config: &ReflectionConfig,
        record: &DamageRecord,
        source: EntityId,
        target: &StructureState,
    ) -> Option<(ActorState, RaidSeverity)> {
        if !config.structure.enabled {
            return None;
        }
        let owner = target.owner?;
        let attacker = self.world.actor(source).filter(|a| !a.npc)?;
        if owner == source || self.world.are_allies(source, owner) {
            return None;
        }
        if self.world.is_authorized(source, record.target) {
            return None;
        }
        if self.has_bypass(config, source) {
            debug!(attacker = %source, "bypass permission, structure damage ignored");
            return None;
        }
        if self.in_zone(source, ZoneKind::RaidExempt) {
            debug!(attacker = %source, "attacker in raid-exempt zone");
            return None;
        }

        let severity = self.state.borrow().classifier.classify(target, record);
        (severity != RaidSeverity::None).then_some((attacker, severity))
    }

    pub(super) fn pre_structure(
        &self,
        record: &DamageRecord,
        source: EntityId,
        target: &StructureState,
    ) -> Verdict {
        let config = self.config();
        if self
            .structure_violation(&config, record, source, target)
            .is_none()
        {
            return Verdict::NoOpinion;
        }

        let guard_hub = config.structure.protect_vital_hub && target.kind.is_vital_hub();
        if config.structure.damage_target && !guard_hub {
            return Verdict::NoOpinion;
        }

        self.store_intent(record, source);
        Verdict::Deny
    }

    pub(super) fn post_structure(
        &self,
        record: &mut DamageRecord,
        source: EntityId,
        target: &StructureState,
    ) {
        let config = self.config();
        let Some((attacker, severity)) = self.structure_violation(&config, record, source, target)
        else {
            return;
        };
        if record.amount <= 0.0 {
            return;
        }

        self.violation(ViolationPath::Structure, record, source, Some(severity));

        let magnitude = record.amount * config.structure.reflect_percent / 100.0;
        if !config.structure.damage_target {
            record.amount = 0.0;
        }

        let f = &config.forgiveness;
        let mut args = MessageArgs {
            attacker: &attacker.name,
            victim: &target.prefab,
            threshold: f.threshold,
            hours: f.ban_hours,
            ..MessageArgs::default()
        };

        match severity {
            RaidSeverity::None => {}
            RaidSeverity::Ignore => {
                self.notify(source, &config.messages.structure_tolerated, &args);
            }
            RaidSeverity::Strike => {
                let outcome = f
                    .tracks_strikes()
                    .then(|| self.record_strike(ViolationPath::Structure, source));
                let limit_reached = outcome == Some(StrikeOutcome::LimitReached);
                let death_penalty = limit_reached && f.death_penalty;
                if let Some(StrikeOutcome::Recorded { count }) = outcome {
                    args.count = count;
                    self.notify(source, &config.messages.strike_warning, &args);
                }
                if death_penalty {
                    self.announce_death_penalty(source, ViolationPath::Structure);
                }
                self.reflect_structure(record, source, magnitude, death_penalty);
                self.notify(source, &config.messages.structure_reflected, &args);
                if limit_reached {
                    self.escalate(source, &attacker.name, ViolationPath::Structure);
                }
            }
            RaidSeverity::Ban => {
                self.reflect_structure(record, source, magnitude, false);
                self.notify(source, &config.messages.structure_reflected, &args);
                self.escalate(source, &attacker.name, ViolationPath::Structure);
            }
        }
    }

    fn reflect_structure(&self, record: &DamageRecord, source: EntityId, magnitude: f32, force_lethal: bool) {
        self.punish(PunishRequest {
            attacker: source,
            victim: record.target,
            magnitude,
            kind: record.kind,
            location: record.location,
            force_lethal,
        });
    }
}
