//! Deferred cascade marker spawns.
//!
//! Upstream markers of a spike appear in staggered waves. Instead of
//! free-running timers, each wave is an entry in a queue owned by the
//! engine, fired by the tick driver once its due time has passed and
//! cancelled wholesale by a reset.

use crate::effect::CascadeEffect;
use crate::fixed::Millis;
use crate::id::TaskId;
use serde::{Deserialize, Serialize};

/// A marker waiting for its due time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSpawn {
    pub id: TaskId,
    pub due: Millis,
    pub effect: CascadeEffect,
}

/// Pending spawns ordered by due time.
///
/// Entries with equal due times keep their scheduling order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnScheduler {
    pending: Vec<ScheduledSpawn>,
    next_id: u64,
}

impl SpawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `effect` to spawn at `due`.
    pub fn schedule(&mut self, due: Millis, effect: CascadeEffect) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let at = self.pending.partition_point(|s| s.due <= due);
        self.pending.insert(at, ScheduledSpawn { id, due, effect });
        id
    }

    /// Drop one pending spawn. Returns whether it was still queued.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.id != id);
        self.pending.len() != before
    }

    /// Drop every pending spawn. Returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Remove and return every spawn due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Millis) -> Vec<ScheduledSpawn> {
        let split = self.pending.partition_point(|s| s.due <= now);
        self.pending.drain(..split).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Due time of the earliest pending spawn.
    pub fn next_due(&self) -> Option<Millis> {
        self.pending.first().map(|s| s.due)
    }

    pub fn pending(&self) -> &[ScheduledSpawn] {
        &self.pending
    }
}
