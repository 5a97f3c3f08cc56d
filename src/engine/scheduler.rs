//! Deferred one-shot tasks.
//!
//! Tasks are queued with a due instant and handed back by
//! [`Scheduler::pop_due`] once that instant has passed. Tasks due at the
//! same instant come back in insertion order. There is no cancellation: a
//! task re-checks its actor when it runs and does nothing if the actor is
//! gone.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

use serde::Serialize;

use crate::model::EntityId;

/// Work the engine defers to a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum DeferredTask {
    /// Force termination if a predicted death did not happen.
    VerifyLethal {
        /// Punished actor.
        actor: EntityId,
    },
    /// Lift the per-actor escalation lock.
    ReleaseEscalation {
        /// Escalated actor.
        actor: EntityId,
    },
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    task: DeferredTask,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of deferred tasks.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` to run at or after `due`.
    pub fn schedule(&mut self, due: Instant, task: DeferredTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { due, seq, task }));
    }

    /// Removes and returns the earliest task due at `now`, if any.
    pub fn pop_due(&mut self, now: Instant) -> Option<DeferredTask> {
        match self.queue.peek() {
            Some(Reverse(next)) if next.due <= now => {
                self.queue.pop().map(|Reverse(s)| s.task)
            }
            _ => None,
        }
    }

    /// Pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every pending task.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn nothing_due_before_instant() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(t0 + Duration::from_secs(2), DeferredTask::VerifyLethal { actor: EntityId(1) });
        assert!(s.pop_due(t0).is_none());
        assert_eq!(s.len(), 1);
        assert_eq!(
            s.pop_due(t0 + Duration::from_secs(2)),
            Some(DeferredTask::VerifyLethal { actor: EntityId(1) })
        );
        assert!(s.is_empty());
    }

    #[test]
    fn earliest_first_then_insertion_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        let late = DeferredTask::ReleaseEscalation { actor: EntityId(9) };
        let a = DeferredTask::VerifyLethal { actor: EntityId(1) };
        let b = DeferredTask::VerifyLethal { actor: EntityId(2) };
        s.schedule(t0 + Duration::from_secs(5), late);
        s.schedule(t0 + Duration::from_secs(1), a);
        s.schedule(t0 + Duration::from_secs(1), b);

        let now = t0 + Duration::from_secs(10);
        assert_eq!(s.pop_due(now), Some(a));
        assert_eq!(s.pop_due(now), Some(b));
        assert_eq!(s.pop_due(now), Some(late));
        assert_eq!(s.pop_due(now), None);
    }
}
