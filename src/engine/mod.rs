//! Damage reflection engine
//!
//! [`ReflectionEngine`] owns every mutable table (strike ledgers, bypass
//! tokens, reflection intents, zone sets, deferred tasks) and implements the
//! host's two damage hooks. All state sits behind `RefCell`s because the
//! engine's own corrective damage re-enters the hooks on the same thread;
//! borrows are always released before calling into the host.

pub mod classify;
pub mod dispatch;
pub mod ledger;
pub mod scheduler;
pub mod status;
pub mod tokens;
pub mod zones;

mod pvp;
mod structure;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::{ResolveWarning, TypeMembership};
use crate::clock::Clock;
use crate::config::{MessageArgs, ReflectionConfig, render};
use crate::error::EnforceError;
use crate::host::{Collaborators, DamageHooks, Enforcer, Permissions, World};
use crate::model::{DamageRecord, EntityId, EscalationKind, RaidSeverity, Verdict, ViolationPath};
use crate::observability::{Event, EventEmitter, metrics};

pub use classify::{RaidClassifier, RaidRule};
pub use dispatch::{PunishOutcome, PunishRequest};
pub use ledger::{StrikeLedger, StrikeOutcome};
pub use scheduler::DeferredTask;
pub use status::EngineStatus;
pub use tokens::{BypassTokens, ReflectionIntent, ReflectionIntents};
pub use zones::ZoneKind;

use dispatch::InFlight;
use scheduler::Scheduler;
use zones::Zones;

/// Mutable engine tables.
#[derive(Debug)]
struct EngineState {
    config: Arc<ReflectionConfig>,
    classifier: RaidClassifier,
    pvp_strikes: StrikeLedger,
    structure_strikes: StrikeLedger,
    bypass: BypassTokens,
    intents: ReflectionIntents,
    zones: Zones,
    scheduler: Scheduler,
    escalation_locks: HashSet<EntityId>,
}

impl EngineState {
    fn new(config: Arc<ReflectionConfig>) -> (Self, Vec<ResolveWarning>) {
        let raid = &config.structure.raid;
        let (membership, warnings) = TypeMembership::build(&raid.exclude, &raid.include);
        let f = &config.forgiveness;
        let b = &config.bypass;
        let state = Self {
            classifier: RaidClassifier::new(membership, raid),
            pvp_strikes: StrikeLedger::new(f.threshold, f.decay),
            structure_strikes: StrikeLedger::new(f.threshold, f.decay),
            bypass: BypassTokens::new(b.token_ttl, b.table_bound),
            intents: ReflectionIntents::new(b.intent_ttl, b.table_bound),
            zones: Zones::default(),
            scheduler: Scheduler::new(),
            escalation_locks: HashSet::new(),
            config,
        };
        (state, warnings)
    }

    fn ledger_mut(&mut self, path: ViolationPath) -> &mut StrikeLedger {
        match path {
            ViolationPath::Pvp => &mut self.pvp_strikes,
            ViolationPath::Structure => &mut self.structure_strikes,
        }
    }
}

/// The damage-interception and punishment engine.
///
/// Construct one per enabled plugin instance; call [`clear`](Self::clear)
/// on disable. Register it with the host as `Weak<dyn DamageHooks>` so
/// corrective damage can re-enter it.
pub struct ReflectionEngine {
    world: Rc<dyn World>,
    permissions: Rc<dyn Permissions>,
    enforcer: Rc<dyn Enforcer>,
    clock: Rc<dyn Clock>,
    events: Arc<EventEmitter>,
    state: RefCell<EngineState>,
    in_flight: InFlight,
}

impl std::fmt::Debug for ReflectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionEngine")
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl ReflectionEngine {
    /// Creates an engine with a no-op event sink.
    #[must_use]
    pub fn new(config: Arc<ReflectionConfig>, host: Collaborators) -> Self {
        Self::with_events(config, host, Arc::new(EventEmitter::noop()))
    }

    /// Creates an engine that emits structured events to `events`.
    #[must_use]
    pub fn with_events(
        config: Arc<ReflectionConfig>,
        host: Collaborators,
        events: Arc<EventEmitter>,
    ) -> Self {
        let (state, warnings) = EngineState::new(config);
        let engine = Self {
            world: host.world,
            permissions: host.permissions,
            enforcer: host.enforcer,
            clock: host.clock,
            events,
            state: RefCell::new(state),
            in_flight: InFlight::default(),
        };
        engine.announce_config(warnings.len());
        engine
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<ReflectionConfig> {
        Arc::clone(&self.state.borrow().config)
    }

    /// Applies a new configuration.
    ///
    /// Membership is rebuilt wholesale; ledgers and tables are retuned and
    /// keep their live entries. Returns the raid entries that were skipped.
    pub fn reload(&self, config: Arc<ReflectionConfig>) -> Vec<ResolveWarning> {
        let raid = &config.structure.raid;
        let (membership, warnings) = TypeMembership::build(&raid.exclude, &raid.include);
        {
            let mut state = self.state.borrow_mut();
            let f = &config.forgiveness;
            let b = &config.bypass;
            state.classifier = RaidClassifier::new(membership, raid);
            state.pvp_strikes.retune(f.threshold, f.decay);
            state.structure_strikes.retune(f.threshold, f.decay);
            state.bypass.retune(b.token_ttl, b.table_bound);
            state.intents.retune(b.intent_ttl, b.table_bound);
            state.config = Arc::clone(&config);
        }
        self.announce_config(warnings.len());
        warnings
    }

    /// Drops all live state: strikes, tokens, intents, zones, locks and
    /// pending tasks.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.pvp_strikes.clear();
        state.structure_strikes.clear();
        state.bypass.clear();
        state.intents.clear();
        state.zones.clear();
        state.scheduler.clear();
        state.escalation_locks.clear();
        drop(state);
        info!("engine state cleared");
    }

    /// Records that `actor` entered `zone`.
    pub fn on_zone_enter(&self, actor: EntityId, zone: ZoneKind) {
        debug!(%actor, ?zone, "zone enter");
        self.state.borrow_mut().zones.enter(actor, zone);
    }

    /// Records that `actor` left `zone`.
    pub fn on_zone_exit(&self, actor: EntityId, zone: ZoneKind) {
        debug!(%actor, ?zone, "zone exit");
        self.state.borrow_mut().zones.exit(actor, zone);
    }

    /// Runs deferred tasks that are due. Call once per host frame.
    ///
    /// Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let now = self.clock.now();
        let mut ran = 0;
        loop {
            let next = self.state.borrow_mut().scheduler.pop_due(now);
            let Some(task) = next else {
                break;
            };
            self.run_task(task);
            ran += 1;
        }
        ran
    }

    fn run_task(&self, task: DeferredTask) {
        match task {
            DeferredTask::VerifyLethal { actor } => {
                let Some(state) = self.world.actor(actor) else {
                    return;
                };
                if state.is_active() {
                    warn!(%actor, health = state.health, "predicted death did not happen, forcing it");
                    self.world.kill(actor);
                }
            }
            DeferredTask::ReleaseEscalation { actor } => {
                if self.state.borrow_mut().escalation_locks.remove(&actor) {
                    debug!(%actor, "escalation lock released");
                }
            }
        }
    }

    // ========================================================================
    // Shared helpers for the pvp and structure paths
    // ========================================================================

    fn in_zone(&self, actor: EntityId, zone: ZoneKind) -> bool {
        self.state.borrow().zones.contains(actor, zone)
    }

    fn both_in_zone(&self, a: EntityId, b: EntityId, zone: ZoneKind) -> bool {
        self.state.borrow().zones.both_in(a, b, zone)
    }

    fn has_bypass(&self, config: &ReflectionConfig, actor: EntityId) -> bool {
        config.bypass.permission && self.permissions.has_bypass(actor)
    }

    fn store_intent(&self, record: &DamageRecord, actor: EntityId) {
        let now = self.clock.now();
        let intent = ReflectionIntent {
            magnitude: record.amount,
            kind: record.kind,
            location: record.location,
        };
        self.state
            .borrow_mut()
            .intents
            .add(record.target, actor, intent, now);
        debug!(target = %record.target, %actor, amount = record.amount, "stored reflection intent");
    }

    /// Rehydrates a zero-magnitude record from a stored intent.
    ///
    /// Returns `false` if there was nothing to recover.
    fn recover_intent(&self, record: &mut DamageRecord, actor: EntityId) -> bool {
        let now = self.clock.now();
        let intent = self
            .state
            .borrow_mut()
            .intents
            .consume(record.target, actor, now);
        let Some(intent) = intent else {
            return false;
        };
        record.amount = intent.magnitude;
        record.kind = intent.kind;
        record.location = intent.location;
        debug!(target = %record.target, %actor, amount = record.amount, "recovered reflection intent");
        true
    }

    fn record_strike(&self, path: ViolationPath, actor: EntityId) -> StrikeOutcome {
        let now = self.clock.now();
        let (outcome, threshold) = {
            let mut state = self.state.borrow_mut();
            let ledger = state.ledger_mut(path);
            (ledger.add_strike(actor, now), ledger.threshold())
        };
        let count = match outcome {
            StrikeOutcome::Recorded { count } => count,
            StrikeOutcome::LimitReached => 0,
        };
        info!(%actor, %path, count, threshold, limit_reached = !outcome.within_limit(), "strike recorded");
        metrics::record_strike(path);
        self.events.emit(Event::StrikeRecorded {
            timestamp: Utc::now(),
            path,
            actor,
            count,
            threshold,
            limit_reached: !outcome.within_limit(),
        });
        outcome
    }

    fn violation(
        &self,
        path: ViolationPath,
        record: &DamageRecord,
        attacker: EntityId,
        severity: Option<RaidSeverity>,
    ) {
        metrics::record_violation(path);
        self.events.emit(Event::ViolationDetected {
            timestamp: Utc::now(),
            path,
            attacker,
            target: record.target,
            amount: record.amount,
            severity,
        });
    }

    fn notify(&self, actor: EntityId, template: &str, args: &MessageArgs<'_>) {
        if template.is_empty() {
            return;
        }
        self.enforcer.notify(actor, &render(template, args));
    }

    /// Kicks or bans `actor` per configuration.
    ///
    /// Suppressed while the actor's escalation lock is held; the lock is
    /// taken here and released after `forgiveness.escalation_cooldown`.
    fn escalate(&self, actor: EntityId, attacker_name: &str, path: ViolationPath) {
        let config = self.config();
        let f = &config.forgiveness;
        let kind = if f.auto_ban {
            EscalationKind::Ban
        } else if f.auto_kick {
            EscalationKind::Kick
        } else {
            return;
        };

        let locked = !self.state.borrow_mut().escalation_locks.insert(actor);
        if locked {
            debug!(%actor, %kind, "escalation suppressed by cooldown");
            return;
        }
        let due = self.clock.now() + f.escalation_cooldown;
        self.state
            .borrow_mut()
            .scheduler
            .schedule(due, DeferredTask::ReleaseEscalation { actor });

        let args = MessageArgs {
            attacker: attacker_name,
            hours: f.ban_hours,
            threshold: f.threshold,
            ..MessageArgs::default()
        };
        let result = match kind {
            EscalationKind::Ban => self
                .enforcer
                .temp_ban(actor, &render(&config.messages.ban_reason, &args), f.ban_hours)
                .inspect(|()| {
                    self.enforcer
                        .broadcast(&render(&config.messages.ban_broadcast, &args));
                }),
            _ => self
                .enforcer
                .kick(actor, &render(&config.messages.kick_reason, &args)),
        };
        self.finish_escalation(actor, kind, path, result);
    }

    fn finish_escalation(
        &self,
        actor: EntityId,
        kind: EscalationKind,
        path: ViolationPath,
        result: Result<(), EnforceError>,
    ) {
        match result {
            Ok(()) => {
                info!(%actor, %kind, %path, "escalated");
                metrics::record_escalation(kind);
                self.events.emit(Event::Escalated {
                    timestamp: Utc::now(),
                    actor,
                    kind,
                    path,
                });
            }
            Err(error) => {
                warn!(%actor, %kind, %error, "enforcement failed, consequence dropped");
                metrics::record_enforcement_failure(kind);
                self.events.emit(Event::EnforcementFailed {
                    timestamp: Utc::now(),
                    actor,
                    kind,
                    error: error.to_string(),
                });
            }
        }
    }

    fn announce_death_penalty(&self, actor: EntityId, path: ViolationPath) {
        self.finish_escalation(actor, EscalationKind::DeathPenalty, path, Ok(()));
    }

    fn announce_config(&self, skipped_entries: usize) {
        let (included, excluded) = {
            let state = self.state.borrow();
            let m = state.classifier.membership();
            (m.included_len(), m.excluded_len())
        };
        info!(included, excluded, skipped_entries, "configuration applied");
        self.events.emit(Event::ConfigReloaded {
            timestamp: Utc::now(),
            included,
            excluded,
            skipped_entries,
        });
    }

    fn publish_table_sizes(&self) {
        let state = self.state.borrow();
        metrics::set_table_entries("bypass_tokens", state.bypass.len());
        metrics::set_table_entries("reflection_intents", state.intents.len());
        metrics::set_table_entries("pvp_strikes", state.pvp_strikes.len());
        metrics::set_table_entries("structure_strikes", state.structure_strikes.len());
    }
}

// ============================================================================
// Hook entry points
// ============================================================================

impl DamageHooks for ReflectionEngine {
    fn on_pre_damage(&self, record: &DamageRecord) -> Verdict {
        let Some(source) = record.source else {
            return Verdict::NoOpinion;
        };
        if self.world.actor(record.target).is_some() {
            self.pre_pvp(record, source)
        } else if let Some(target) = self.world.structure(record.target) {
            self.pre_structure(record, source, &target)
        } else {
            Verdict::NoOpinion
        }
    }

    fn on_post_damage(&self, record: &mut DamageRecord) {
        let Some(source) = record.source else {
            return;
        };

        let blocked = record.amount <= 0.0;
        if blocked && !self.recover_intent(record, source) {
            return;
        }

        if let Some(victim) = self.world.actor(record.target) {
            let ours = {
                let now = self.clock.now();
                self.state.borrow_mut().bypass.consume(record.target, source, now)
            };
            if ours {
                debug!(target = %record.target, credited = %source, "own corrective damage, skipping");
            } else {
                self.post_pvp(record, source, &victim);
            }
        } else if let Some(target) = self.world.structure(record.target) {
            self.post_structure(record, source, &target);
        }

        if blocked {
            record.amount = 0.0;
        }
        self.publish_table_sizes();
    }
}
