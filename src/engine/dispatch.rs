//! Punishment dispatch
//!
//! Applies a decided punishment through an ordered ladder of methods,
//! stopping at the first one with a measurable effect:
//!
//! 1. `Reflect`: damage attributed to the victim, announced with a bypass
//!    token so the engine's own hooks let it through.
//! 2. `Hurt`: unattributed damage, only while the attacker is active.
//! 3. `Die`: forced termination, only when the magnitude covers the
//!    attacker's remaining health.
//! 4. `Fail`: nothing worked; logged and not retried.
//!
//! A measurable effect is a health drop larger than `dispatch.epsilon`
//! relative to health before dispatch, or the attacker no longer being
//! alive. `World::hurt` may re-enter the hooks synchronously, so no engine
//! state is borrowed across host calls.

use std::cell::RefCell;
use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::ReflectionEngine;
use super::scheduler::DeferredTask;
use crate::config::DispatchConfig;
use crate::model::{ActorState, DamageKind, EntityId, Hit, HitLocation, PunishMethod};
use crate::observability::{Event, metrics};

/// Steps tried before giving up.
const LADDER: [PunishMethod; 3] = [PunishMethod::Reflect, PunishMethod::Hurt, PunishMethod::Die];

/// A punishment to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunishRequest {
    /// Actor being punished.
    pub attacker: EntityId,
    /// Actor or structure credited with the reflected damage.
    pub victim: EntityId,
    /// Magnitude before the lethal floor.
    pub magnitude: f32,
    /// Damage type of the reflected hit.
    pub kind: DamageKind,
    /// Called location of the reflected hit.
    pub location: HitLocation,
    /// Treat the punishment as lethal regardless of health.
    pub force_lethal: bool,
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunishOutcome {
    /// First step with a measurable effect, or `Fail`.
    pub method: PunishMethod,
    /// Magnitude after the lethal floor.
    pub magnitude: f32,
    /// Whether death was predicted.
    pub lethal: bool,
    /// Attacker health before dispatch.
    pub health_before: f32,
    /// Attacker health after dispatch, `None` if the actor vanished.
    pub health_after: Option<f32>,
}

/// Magnitude used for a punishment, inflated to a guaranteed-lethal value
/// when death is predicted. Returns the magnitude and whether it was lethal.
#[must_use]
pub fn lethal_magnitude(magnitude: f32, health: f32, force: bool, cfg: &DispatchConfig) -> (f32, bool) {
    if force || health - magnitude <= 0.0 {
        (cfg.lethal_floor.max(health * cfg.lethal_multiplier), true)
    } else {
        (magnitude, false)
    }
}

/// Actors currently being punished.
///
/// Entering fails while either party is already in flight; the returned
/// guard releases both on drop.
#[derive(Debug, Default)]
pub struct InFlight {
    actors: RefCell<HashSet<EntityId>>,
}

impl InFlight {
    /// Marks both parties in flight unless either already is.
    #[must_use]
    pub fn enter(&self, attacker: EntityId, victim: EntityId) -> Option<InFlightGuard<'_>> {
        let mut actors = self.actors.borrow_mut();
        if actors.contains(&attacker) || actors.contains(&victim) {
            return None;
        }
        actors.insert(attacker);
        actors.insert(victim);
        Some(InFlightGuard {
            owner: self,
            attacker,
            victim,
        })
    }

    /// Actors currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.borrow().len()
    }

    /// Returns `true` if no dispatch is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.borrow().is_empty()
    }
}

/// Releases an [`InFlight`] entry on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    attacker: EntityId,
    victim: EntityId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut actors = self.owner.actors.borrow_mut();
        actors.remove(&self.attacker);
        actors.remove(&self.victim);
    }
}

impl ReflectionEngine {
    /// Applies a punishment.
    ///
    /// Returns `None` without touching the world if either party is already
    /// being punished or the attacker is not a live actor.
    pub fn punish(&self, req: PunishRequest) -> Option<PunishOutcome> {
        let Some(_guard) = self.in_flight.enter(req.attacker, req.victim) else {
            debug!(attacker = %req.attacker, victim = %req.victim, "dispatch already in flight, skipping");
            return None;
        };

        let before = self.world.actor(req.attacker).filter(|a| a.alive)?;
        let config = self.config();
        let dispatch = &config.dispatch;

        let (magnitude, lethal) =
            lethal_magnitude(req.magnitude, before.health, req.force_lethal, dispatch);

        let mut method = PunishMethod::Fail;
        for step in LADDER {
            if self.attempt(step, &req, magnitude, &before)
                && self.measurable(req.attacker, before.health, dispatch.epsilon)
            {
                method = step;
                break;
            }
        }

        let after = self.world.actor(req.attacker);
        let survived = after.as_ref().is_some_and(|a| a.alive);

        if survived && method != PunishMethod::Fail && config.bleed.enabled {
            self.world.bleed(req.attacker, config.bleed.amount);
        }
        if survived && lethal {
            let due = self.clock.now() + dispatch.verify_delay;
            self.state
                .borrow_mut()
                .scheduler
                .schedule(due, DeferredTask::VerifyLethal { actor: req.attacker });
        }

        if method == PunishMethod::Fail {
            warn!(
                attacker = %req.attacker,
                victim = %req.victim,
                magnitude,
                "no punishment method had a measurable effect"
            );
        } else {
            info!(
                attacker = %req.attacker,
                victim = %req.victim,
                magnitude,
                %method,
                lethal,
                "punishment applied"
            );
        }
        metrics::record_punishment(method);
        self.events.emit(Event::PunishmentApplied {
            timestamp: Utc::now(),
            attacker: req.attacker,
            victim: req.victim,
            magnitude,
            method,
            lethal,
        });

        Some(PunishOutcome {
            method,
            magnitude,
            lethal,
            health_before: before.health,
            health_after: after.map(|a| a.health),
        })
    }

    /// Runs one ladder step. Returns `false` if its precondition failed.
    fn attempt(&self, step: PunishMethod, req: &PunishRequest, magnitude: f32, before: &ActorState) -> bool {
        match step {
            PunishMethod::Reflect => {
                let now = self.clock.now();
                self.state.borrow_mut().bypass.add(req.attacker, req.victim, now);
                self.world.hurt(
                    req.attacker,
                    Hit {
                        amount: magnitude,
                        kind: req.kind,
                        location: req.location,
                        attacker: Some(req.victim),
                    },
                );
                // A hit the host dropped never reached the post hook
                self.state.borrow_mut().bypass.consume(req.attacker, req.victim, now);
                true
            }
            PunishMethod::Hurt => {
                let active = self.world.actor(req.attacker).is_some_and(|a| a.is_active());
                if active {
                    self.world.hurt(
                        req.attacker,
                        Hit {
                            amount: magnitude,
                            kind: req.kind,
                            location: req.location,
                            attacker: None,
                        },
                    );
                }
                active
            }
            PunishMethod::Die => {
                if magnitude >= before.health {
                    self.world.kill(req.attacker);
                    true
                } else {
                    false
                }
            }
            PunishMethod::Fail => false,
        }
    }

    fn measurable(&self, actor: EntityId, health_before: f32, epsilon: f32) -> bool {
        self.world
            .actor(actor)
            .is_none_or(|now| !now.alive || health_before - now.health > epsilon)
    }
}
