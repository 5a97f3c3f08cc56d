//! Anti-loop token tables
//!
//! Two short-lived keyed tables with the same shape:
//!
//! - [`BypassTokens`] mark the engine's own corrective damage so the hooks
//!   it re-enters let it through instead of classifying it again.
//! - [`ReflectionIntents`] carry the context of an event the early hook
//!   blocked over to the late hook, which only then sees a zero-magnitude
//!   record.
//!
//! Expired entries are treated as absent on read and swept in one linear
//! pass once a table grows past its bound.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::model::{DamageKind, EntityId, HitLocation};

/// Keyed values that expire after a fixed TTL.
#[derive(Debug, Clone)]
pub struct ExpiringTable<K, V> {
    ttl: Duration,
    bound: usize,
    entries: HashMap<K, (V, Instant)>,
}

impl<K: Eq + Hash, V> ExpiringTable<K, V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new(ttl: Duration, bound: usize) -> Self {
        Self {
            ttl,
            bound,
            entries: HashMap::new(),
        }
    }

    /// Lifetime of new entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Changes TTL and bound; existing entries keep their expiry.
    pub fn retune(&mut self, ttl: Duration, bound: usize) {
        self.ttl = ttl;
        self.bound = bound;
    }

    /// Inserts or replaces a value, sweeping expired entries first if the
    /// table is over its bound.
    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        if self.entries.len() >= self.bound {
            self.sweep(now);
        }
        self.entries.insert(key, (value, now + self.ttl));
    }

    /// Returns the live value for `key` without consuming it.
    #[must_use]
    pub fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(v, _)| v)
    }

    /// Removes and returns the live value for `key`.
    ///
    /// An expired entry is removed as well but reported as absent.
    pub fn take(&mut self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .remove(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(v, _)| v)
    }

    /// Removes every expired entry; returns how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| now < *expires_at);
        before - self.entries.len()
    }

    /// Entries currently stored, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Bypass tokens
// ============================================================================

/// One-shot passes for the engine's own corrective damage.
///
/// Keyed by `(affected actor, credited actor)`.
#[derive(Debug, Clone)]
pub struct BypassTokens {
    table: ExpiringTable<(EntityId, EntityId), ()>,
}

impl BypassTokens {
    /// Creates an empty token table.
    #[must_use]
    pub fn new(ttl: Duration, bound: usize) -> Self {
        Self {
            table: ExpiringTable::new(ttl, bound),
        }
    }

    /// Issues a token letting damage to `affected` credited to `credited`
    /// through once.
    pub fn add(&mut self, affected: EntityId, credited: EntityId, now: Instant) {
        self.table.insert((affected, credited), (), now);
    }

    /// Returns `true` if a live token exists.
    #[must_use]
    pub fn peek(&self, affected: EntityId, credited: EntityId, now: Instant) -> bool {
        self.table.peek(&(affected, credited), now).is_some()
    }

    /// Consumes a live token. A second consume returns `false`.
    pub fn consume(&mut self, affected: EntityId, credited: EntityId, now: Instant) -> bool {
        self.table.take(&(affected, credited), now).is_some()
    }

    /// Stored tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Changes TTL and bound.
    pub fn retune(&mut self, ttl: Duration, bound: usize) {
        self.table.retune(ttl, bound);
    }

    /// Drops every token.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

// ============================================================================
// Reflection intents
// ============================================================================

/// Context of a blocked event, kept for the late hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionIntent {
    /// Magnitude of the original damage.
    pub magnitude: f32,
    /// Damage type.
    pub kind: DamageKind,
    /// Called location.
    pub location: HitLocation,
}

/// Intents keyed by `(target, source actor)`, consumed at most once.
#[derive(Debug, Clone)]
pub struct ReflectionIntents {
    table: ExpiringTable<(EntityId, EntityId), ReflectionIntent>,
}

impl ReflectionIntents {
    /// Creates an empty intent table.
    #[must_use]
    pub fn new(ttl: Duration, bound: usize) -> Self {
        Self {
            table: ExpiringTable::new(ttl, bound),
        }
    }

    /// Stores an intent, replacing any earlier one for the same pair.
    pub fn add(&mut self, target: EntityId, actor: EntityId, intent: ReflectionIntent, now: Instant) {
        self.table.insert((target, actor), intent, now);
    }

    /// Consumes the live intent for the pair, if any.
    pub fn consume(&mut self, target: EntityId, actor: EntityId, now: Instant) -> Option<ReflectionIntent> {
        self.table.take(&(target, actor), now)
    }

    /// Stored intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no intents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Changes TTL and bound.
    pub fn retune(&mut self, ttl: Duration, bound: usize) {
        self.table.retune(ttl, bound);
    }

    /// Drops every intent.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_millis(250);
    const V: EntityId = EntityId(1);
    const A: EntityId = EntityId(2);

    #[test]
    fn bypass_round_trip_consumes_once() {
        let now = Instant::now();
        let mut tokens = BypassTokens::new(TTL, 256);
        tokens.add(V, A, now);
        assert!(tokens.peek(V, A, now));
        assert!(tokens.consume(V, A, now));
        assert!(!tokens.consume(V, A, now));
        assert!(!tokens.peek(V, A, now));
    }

    #[test]
    fn bypass_key_is_directional() {
        let now = Instant::now();
        let mut tokens = BypassTokens::new(TTL, 256);
        tokens.add(V, A, now);
        assert!(!tokens.peek(A, V, now));
    }

    #[test]
    fn expired_token_is_absent() {
        let now = Instant::now();
        let mut tokens = BypassTokens::new(TTL, 256);
        tokens.add(V, A, now);
        assert!(!tokens.peek(V, A, now + TTL));
        assert!(!tokens.consume(V, A, now + TTL));
        assert!(tokens.is_empty());
    }

    #[test]
    fn intent_round_trip_within_ttl() {
        let now = Instant::now();
        let mut intents = ReflectionIntents::new(TTL, 256);
        let intent = ReflectionIntent {
            magnitude: 50.0,
            kind: DamageKind::Generic,
            location: HitLocation::None,
        };
        intents.add(V, A, intent, now);
        let got = intents.consume(V, A, now + Duration::from_millis(100)).unwrap();
        assert!((got.magnitude - 50.0).abs() < f32::EPSILON);
        assert!(intents.consume(V, A, now).is_none());
    }

    #[test]
    fn intent_absent_after_ttl() {
        let now = Instant::now();
        let mut intents = ReflectionIntents::new(TTL, 256);
        intents.add(
            V,
            A,
            ReflectionIntent {
                magnitude: 50.0,
                kind: DamageKind::Generic,
                location: HitLocation::None,
            },
            now,
        );
        assert!(intents.consume(V, A, now + TTL).is_none());
    }

    #[test]
    fn sweep_runs_once_over_bound() {
        let t0 = Instant::now();
        let mut table: ExpiringTable<u32, ()> = ExpiringTable::new(TTL, 4);
        for k in 0..4 {
            table.insert(k, (), t0);
        }
        assert_eq!(table.len(), 4);
        // All four are expired by now, so the bound-triggered sweep clears them.
        table.insert(99, (), t0 + TTL);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn live_entries_survive_sweep() {
        let t0 = Instant::now();
        let mut table: ExpiringTable<u32, ()> = ExpiringTable::new(TTL, 2);
        table.insert(1, (), t0);
        table.insert(2, (), t0);
        table.insert(3, (), t0 + Duration::from_millis(10));
        assert_eq!(table.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_table_never_exceeds_bound_plus_live(
            bound in 1usize..32,
            gaps in prop::collection::vec(0u64..400, 1..200),
        ) {
            let t0 = Instant::now();
            let mut table: ExpiringTable<usize, ()> = ExpiringTable::new(TTL, bound);
            let mut elapsed = 0u64;
            for (i, gap) in gaps.iter().enumerate() {
                elapsed += gap;
                let now = t0 + Duration::from_millis(elapsed);
                table.insert(i, (), now);
                let live = (0..=i).filter(|k| table.peek(k, now).is_some()).count();
                prop_assert!(table.len() <= bound.max(live) + 1);
            }
        }

        #[test]
        fn prop_consume_succeeds_exactly_once(
            pairs in prop::collection::btree_set((0u64..8, 0u64..8), 1..16),
        ) {
            let now = Instant::now();
            let mut tokens = BypassTokens::new(TTL, 256);
            for (v, a) in &pairs {
                tokens.add(EntityId(*v), EntityId(*a), now);
            }
            for (v, a) in &pairs {
                prop_assert!(tokens.consume(EntityId(*v), EntityId(*a), now));
                prop_assert!(!tokens.consume(EntityId(*v), EntityId(*a), now));
            }
            prop_assert!(tokens.is_empty());
        }
    }
}
