//! Strike ledger
//!
//! Per-actor strike counter with lazy time decay. A count never reaches the
//! threshold: the strike that would reach it resets the counter to zero and
//! reports the limit in the same call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::EntityId;

/// Strike state of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeRecord {
    /// Strikes recorded since the last reset, always below the threshold.
    pub count: u32,
    /// When the last strike was recorded.
    pub last_strike_at: Instant,
}

/// Outcome of [`StrikeLedger::add_strike`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    /// Strike recorded; the actor is still below the threshold.
    Recorded {
        /// Count after this strike.
        count: u32,
    },
    /// The threshold was reached and the counter reset to zero.
    LimitReached,
}

impl StrikeOutcome {
    /// `true` while still within forgiveness, `false` once the limit is hit.
    #[must_use]
    pub const fn within_limit(self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

/// Per-actor strike counters.
#[derive(Debug, Clone)]
pub struct StrikeLedger {
    threshold: u32,
    decay: Option<Duration>,
    records: HashMap<EntityId, StrikeRecord>,
}

impl StrikeLedger {
    /// Creates a ledger. A threshold of zero means callers must not record
    /// strikes at all.
    #[must_use]
    pub fn new(threshold: u32, decay: Option<Duration>) -> Self {
        Self {
            threshold,
            decay,
            records: HashMap::new(),
        }
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Retunes threshold and decay, keeping recorded strikes.
    ///
    /// Counts at or above a lowered threshold are clamped so the count
    /// invariant keeps holding.
    pub fn retune(&mut self, threshold: u32, decay: Option<Duration>) {
        self.threshold = threshold;
        self.decay = decay;
        let cap = threshold.saturating_sub(1);
        for record in self.records.values_mut() {
            record.count = record.count.min(cap);
        }
    }

    /// Records a strike against `actor`.
    ///
    /// Decay is applied first: if the previous strike is at least one decay
    /// window old the count restarts from zero.
    pub fn add_strike(&mut self, actor: EntityId, now: Instant) -> StrikeOutcome {
        let decay = self.decay;
        let threshold = self.threshold;
        let record = self.records.entry(actor).or_insert(StrikeRecord {
            count: 0,
            last_strike_at: now,
        });

        if record.count > 0 && is_decayed(record.last_strike_at, decay, now) {
            record.count = 0;
        }

        record.last_strike_at = now;
        let next = record.count.saturating_add(1);
        if next >= threshold {
            record.count = 0;
            StrikeOutcome::LimitReached
        } else {
            record.count = next;
            StrikeOutcome::Recorded { count: next }
        }
    }

    /// Current count for `actor`, reading a decayed counter as zero.
    #[must_use]
    pub fn count(&self, actor: EntityId, now: Instant) -> u32 {
        self.records.get(&actor).map_or(0, |r| {
            if is_decayed(r.last_strike_at, self.decay, now) {
                0
            } else {
                r.count
            }
        })
    }

    /// Raw record for `actor`, without decay applied.
    #[must_use]
    pub fn record(&self, actor: EntityId) -> Option<&StrikeRecord> {
        self.records.get(&actor)
    }

    /// Number of actors with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no actor has a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

fn is_decayed(last: Instant, decay: Option<Duration>, now: Instant) -> bool {
    decay.is_some_and(|window| now.saturating_duration_since(last) >= window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ACTOR: EntityId = EntityId(7);

    #[test]
    fn limit_reached_on_threshold() {
        let now = Instant::now();
        let mut ledger = StrikeLedger::new(3, None);
        assert_eq!(ledger.add_strike(ACTOR, now), StrikeOutcome::Recorded { count: 1 });
        assert_eq!(ledger.add_strike(ACTOR, now), StrikeOutcome::Recorded { count: 2 });
        assert_eq!(ledger.add_strike(ACTOR, now), StrikeOutcome::LimitReached);
        assert_eq!(ledger.count(ACTOR, now), 0);
    }

    #[test]
    fn threshold_one_always_reaches_limit() {
        let now = Instant::now();
        let mut ledger = StrikeLedger::new(1, None);
        assert!(!ledger.add_strike(ACTOR, now).within_limit());
        assert!(!ledger.add_strike(ACTOR, now).within_limit());
    }

    #[test]
    fn decay_resets_before_increment() {
        let t0 = Instant::now();
        let window = Duration::from_secs(60);
        let mut ledger = StrikeLedger::new(3, Some(window));
        ledger.add_strike(ACTOR, t0);
        ledger.add_strike(ACTOR, t0);
        let later = t0 + window;
        assert_eq!(ledger.count(ACTOR, later), 0);
        assert_eq!(
            ledger.add_strike(ACTOR, later),
            StrikeOutcome::Recorded { count: 1 }
        );
    }

    #[test]
    fn no_decay_just_before_window() {
        let t0 = Instant::now();
        let window = Duration::from_secs(60);
        let mut ledger = StrikeLedger::new(3, Some(window));
        ledger.add_strike(ACTOR, t0);
        let almost = t0 + window - Duration::from_millis(1);
        assert_eq!(
            ledger.add_strike(ACTOR, almost),
            StrikeOutcome::Recorded { count: 2 }
        );
    }

    #[test]
    fn actors_are_independent() {
        let now = Instant::now();
        let mut ledger = StrikeLedger::new(2, None);
        ledger.add_strike(EntityId(1), now);
        assert_eq!(
            ledger.add_strike(EntityId(2), now),
            StrikeOutcome::Recorded { count: 1 }
        );
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn retune_clamps_counts() {
        let now = Instant::now();
        let mut ledger = StrikeLedger::new(5, None);
        for _ in 0..4 {
            ledger.add_strike(ACTOR, now);
        }
        ledger.retune(3, None);
        assert_eq!(ledger.count(ACTOR, now), 2);
        assert_eq!(ledger.add_strike(ACTOR, now), StrikeOutcome::LimitReached);
    }

    proptest! {
        #[test]
        fn prop_nth_strike_hits_limit_exactly_at_threshold(threshold in 1u32..50) {
            let now = Instant::now();
            let mut ledger = StrikeLedger::new(threshold, None);
            for n in 1..threshold {
                prop_assert!(ledger.add_strike(ACTOR, now).within_limit(), "strike {} of {}", n, threshold);
                prop_assert!(ledger.count(ACTOR, now) < threshold);
            }
            prop_assert!(!ledger.add_strike(ACTOR, now).within_limit());
            prop_assert_eq!(ledger.count(ACTOR, now), 0);
        }

        #[test]
        fn prop_decayed_counter_behaves_as_fresh(
            threshold in 2u32..20,
            prior in 1u32..20,
            window_secs in 1u64..3600,
            extra_secs in 0u64..3600,
        ) {
            let prior = prior.min(threshold - 1);
            let t0 = Instant::now();
            let window = Duration::from_secs(window_secs);
            let mut ledger = StrikeLedger::new(threshold, Some(window));
            for _ in 0..prior {
                ledger.add_strike(ACTOR, t0);
            }
            let later = t0 + window + Duration::from_secs(extra_secs);
            prop_assert_eq!(
                ledger.add_strike(ACTOR, later),
                StrikeOutcome::Recorded { count: 1 }
            );
        }
    }
}
