//! Punishment ladder, reentrancy and deferred verification.

mod common;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use common::{Harness, X, Y, assert_health, config};
use damage_reflection::clock::ManualClock;
use damage_reflection::config::ReflectionConfig;
use damage_reflection::engine::{PunishOutcome, PunishRequest, ReflectionEngine};
use damage_reflection::host::{Collaborators, DamageHooks, World};
use damage_reflection::model::{
    ActorState, DamageKind, DamageRecord, EntityId, Hit, HitLocation, PunishMethod, StructureState,
};
use damage_reflection::sim::{SimAction, SimActor, SimWorld};

fn request(magnitude: f32) -> PunishRequest {
    PunishRequest {
        attacker: X,
        victim: Y,
        magnitude,
        kind: DamageKind::Generic,
        location: HitLocation::None,
        force_lethal: false,
    }
}

// ============================================================================
// Ladder
// ============================================================================

#[test]
fn reflected_hit_does_not_bounce_back() {
    let h = Harness::default_config();

    h.attack(X, Y, 25.0);

    assert_health(h.health(X), 75.0);
    assert_health(h.health(Y), 100.0);
    assert_eq!(h.events.of_type("ViolationDetected").len(), 1);
    assert_eq!(h.events.of_type("PunishmentApplied").len(), 1);
    let status = h.engine.status();
    assert_eq!(status.bypass_tokens, 0);
    assert_eq!(status.in_flight, 0);
}

#[test]
fn suppressed_reflection_falls_back_to_hurt() {
    let h = Harness::default_config();
    h.world.update_actor(X, |a| a.shielded = true);

    h.attack(X, Y, 30.0);

    assert_health(h.health(X), 70.0);
    assert_eq!(h.events.of_type("PunishmentApplied")[0]["method"], "hurt");
}

#[test]
fn unkillable_attacker_records_fail() {
    let h = Harness::default_config();
    h.world.update_actor(X, |a| a.god = true);

    let outcome = h.engine.punish(request(30.0)).unwrap();

    assert_eq!(outcome.method, PunishMethod::Fail);
    assert_health(h.health(X), 100.0);
    assert_eq!(h.engine.status().pending_tasks, 0);
}

#[test]
fn die_step_used_when_damage_cannot_land() {
    let h = Harness::default_config();
    // Disconnected actors are not active, so Hurt is skipped
    h.world.update_actor(X, |a| {
        a.shielded = true;
        a.connected = false;
        a.health = 20.0;
    });

    let outcome = h.engine.punish(request(50.0)).unwrap();

    assert_eq!(outcome.method, PunishMethod::Die);
    assert!(outcome.lethal);
    assert!(!h.world.sim_actor(X).unwrap().alive);
    assert!(h.world.actions().contains(&SimAction::Kill { actor: X }));
}

#[test]
fn dead_attacker_is_not_punished() {
    let h = Harness::default_config();
    h.world.update_actor(X, |a| a.alive = false);

    assert!(h.engine.punish(request(10.0)).is_none());
    assert!(h.events.of_type("PunishmentApplied").is_empty());
}

// ============================================================================
// Measurable effect threshold
// ============================================================================

#[test]
fn drop_below_epsilon_is_not_measurable() {
    let h = Harness::default_config();

    let outcome: PunishOutcome = h.engine.punish(request(0.004)).unwrap();

    // Reflect and Hurt each land 0.004, together still under 0.01
    assert_eq!(outcome.method, PunishMethod::Fail);
    assert!(outcome.health_after.unwrap() < 100.0);
}

#[test]
fn drop_above_epsilon_is_measurable() {
    let h = Harness::default_config();

    let outcome = h.engine.punish(request(0.02)).unwrap();

    assert_eq!(outcome.method, PunishMethod::Reflect);
}

#[test]
fn epsilon_is_configurable() {
    let h = Harness::new(config("dispatch:\n  epsilon: 0.001\n"));

    let outcome = h.engine.punish(request(0.004)).unwrap();

    assert_eq!(outcome.method, PunishMethod::Reflect);
}

// ============================================================================
// Side effects
// ============================================================================

#[test]
fn surviving_attacker_bleeds() {
    let h = Harness::new(config("bleed:\n  enabled: true\n  amount: 5\n"));

    h.attack(X, Y, 10.0);

    assert!(
        h.world
            .actions()
            .contains(&SimAction::Bleed { actor: X, amount: 5.0 })
    );
}

#[test]
fn killed_attacker_does_not_bleed() {
    let h = Harness::new(config("bleed:\n  enabled: true\n"));
    h.world.update_actor(X, |a| a.health = 5.0);

    h.attack(X, Y, 10.0);

    assert!(
        !h.world
            .actions()
            .iter()
            .any(|a| matches!(a, SimAction::Bleed { .. }))
    );
}

#[test]
fn predicted_death_is_verified_later() {
    let h = Harness::default_config();
    h.world.update_actor(X, |a| {
        a.god = true;
        a.health = 20.0;
    });

    let outcome = h.engine.punish(request(40.0)).unwrap();
    assert_eq!(outcome.method, PunishMethod::Fail);
    assert_eq!(h.engine.status().pending_tasks, 1);

    h.world.update_actor(X, |a| a.god = false);
    assert_eq!(h.engine.tick(), 0);
    h.clock.advance(Duration::from_secs(2));
    assert_eq!(h.engine.tick(), 1);

    assert!(!h.world.sim_actor(X).unwrap().alive);
    assert_eq!(h.engine.status().pending_tasks, 0);
}

#[test]
fn verification_skips_disconnected_actor() {
    let h = Harness::default_config();
    h.world.update_actor(X, |a| {
        a.god = true;
        a.health = 20.0;
    });

    h.engine.punish(request(40.0));
    h.world.update_actor(X, |a| {
        a.god = false;
        a.connected = false;
    });
    h.clock.advance(Duration::from_secs(5));

    assert_eq!(h.engine.tick(), 1);
    assert!(h.world.sim_actor(X).unwrap().alive);
}

// ============================================================================
// Reentrancy
// ============================================================================

/// Host whose damage application triggers another punishment of the same
/// actor, as a second violation processed mid-dispatch would.
struct Reentrant {
    sim: Rc<SimWorld>,
    engine: RefCell<Weak<ReflectionEngine>>,
    nested: RefCell<Vec<Option<PunishOutcome>>>,
}

impl World for Reentrant {
    fn actor(&self, id: EntityId) -> Option<ActorState> {
        self.sim.actor(id)
    }

    fn structure(&self, id: EntityId) -> Option<StructureState> {
        self.sim.structure(id)
    }

    fn is_authorized(&self, actor: EntityId, structure: EntityId) -> bool {
        self.sim.is_authorized(actor, structure)
    }

    fn are_allies(&self, a: EntityId, b: EntityId) -> bool {
        self.sim.are_allies(a, b)
    }

    fn hurt(&self, target: EntityId, hit: Hit) {
        let engine = self.engine.borrow().upgrade();
        if let Some(engine) = engine {
            let nested = engine.punish(PunishRequest {
                attacker: target,
                victim: EntityId(3),
                magnitude: 5.0,
                kind: DamageKind::Generic,
                location: HitLocation::None,
                force_lethal: false,
            });
            self.nested.borrow_mut().push(nested);
        }
        self.sim.hurt(target, hit);
    }

    fn kill(&self, actor: EntityId) {
        self.sim.kill(actor);
    }

    fn bleed(&self, actor: EntityId, amount: f32) {
        self.sim.bleed(actor, amount);
    }
}

#[test]
fn in_flight_guard_blocks_nested_dispatch() {
    let sim = Rc::new(SimWorld::new());
    sim.add_actor(X, SimActor::player("attacker", 100.0));
    sim.add_actor(Y, SimActor::player("victim", 100.0));
    sim.add_actor(EntityId(3), SimActor::player("bystander", 100.0));

    let world = Rc::new(Reentrant {
        sim: Rc::clone(&sim),
        engine: RefCell::new(Weak::new()),
        nested: RefCell::new(Vec::new()),
    });
    let base = sim.collaborators(Rc::new(ManualClock::new()));
    let engine = Rc::new(ReflectionEngine::new(
        Arc::new(ReflectionConfig::default()),
        Collaborators {
            world: Rc::clone(&world) as Rc<dyn World>,
            ..base
        },
    ));
    *world.engine.borrow_mut() = Rc::downgrade(&engine);
    sim.attach(Rc::downgrade(&engine) as Weak<dyn DamageHooks>);

    let outcome = engine.punish(request(10.0)).unwrap();

    assert_eq!(outcome.method, PunishMethod::Reflect);
    let nested = world.nested.borrow();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(Option::is_none));
    assert_health(sim.sim_actor(X).unwrap().health, 90.0);
    assert_eq!(engine.status().in_flight, 0);
}

/// Host where another rule cancels every attributed hit before the late
/// damage phase runs.
struct DropsAttributed {
    sim: Rc<SimWorld>,
}

impl World for DropsAttributed {
    fn actor(&self, id: EntityId) -> Option<ActorState> {
        self.sim.actor(id)
    }

    fn structure(&self, id: EntityId) -> Option<StructureState> {
        self.sim.structure(id)
    }

    fn is_authorized(&self, actor: EntityId, structure: EntityId) -> bool {
        self.sim.is_authorized(actor, structure)
    }

    fn are_allies(&self, a: EntityId, b: EntityId) -> bool {
        self.sim.are_allies(a, b)
    }

    fn hurt(&self, target: EntityId, hit: Hit) {
        if hit.attacker.is_none() {
            self.sim.hurt(target, hit);
        }
    }

    fn kill(&self, actor: EntityId) {
        self.sim.kill(actor);
    }

    fn bleed(&self, actor: EntityId, amount: f32) {
        self.sim.bleed(actor, amount);
    }
}

#[test]
fn cancelled_reflection_leaves_no_bypass_token() {
    let sim = Rc::new(SimWorld::new());
    sim.add_actor(X, SimActor::player("attacker", 100.0));
    sim.add_actor(Y, SimActor::player("victim", 100.0));

    let base = sim.collaborators(Rc::new(ManualClock::new()));
    let engine = Rc::new(ReflectionEngine::new(
        Arc::new(ReflectionConfig::default()),
        Collaborators {
            world: Rc::new(DropsAttributed {
                sim: Rc::clone(&sim),
            }) as Rc<dyn World>,
            ..base
        },
    ));
    sim.attach(Rc::downgrade(&engine) as Weak<dyn DamageHooks>);

    sim.deal(DamageRecord::new(Some(X), Y, 20.0));
    assert_health(sim.sim_actor(X).unwrap().health, 80.0);
    assert_eq!(engine.status().bypass_tokens, 0);

    // The victim hitting back in the same tick is a violation of its own
    let applied = sim.deal(DamageRecord::new(Some(Y), X, 30.0));

    assert_health(applied, 0.0);
    assert_health(sim.sim_actor(X).unwrap().health, 80.0);
    assert_health(sim.sim_actor(Y).unwrap().health, 70.0);
    assert_eq!(engine.status().bypass_tokens, 0);
}
