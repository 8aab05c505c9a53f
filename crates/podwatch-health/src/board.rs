//! Shared status board.
//!
//! One slot per target, each behind its own lock: a target's loop takes the
//! write lock only to apply an outcome, and readers copy a snapshot out
//! under the read lock. There is no lock spanning targets.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use podwatch_spec::TargetConfig;

use crate::executor::CheckOutcome;
use crate::tracker::{HealthStatus, HealthTracker};

/// The last error a target ran into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeError {
    pub message: String,
    /// Unix timestamp (milliseconds) of the failed check.
    pub timestamp: u64,
}

/// Point-in-time copy of one target's health, as served on `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetSnapshot {
    pub name: String,
    pub status: HealthStatus,
    /// Retained outcomes, oldest first.
    pub states: Vec<CheckOutcome>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub checks: u64,
    pub latest_error: Option<ProbeError>,
}

struct TargetSlot {
    id: String,
    tracker: RwLock<HealthTracker>,
}

/// Health state of every target, in spec order.
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct StatusBoard {
    slots: Arc<Vec<TargetSlot>>,
}

impl StatusBoard {
    /// Create a board with one `Starting` slot per target, whose
    /// start-periods begin now.
    pub fn new(targets: &[TargetConfig]) -> Self {
        Self::started_at(targets, Instant::now())
    }

    /// Create a board whose start-periods begin at `started_at`.
    pub fn started_at(targets: &[TargetConfig], started_at: Instant) -> Self {
        let slots = targets
            .iter()
            .map(|target| TargetSlot {
                id: target.id.clone(),
                tracker: RwLock::new(HealthTracker::new(target, started_at)),
            })
            .collect();
        Self {
            slots: Arc::new(slots),
        }
    }

    /// Number of targets on the board.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `target_id` has a slot.
    pub fn contains(&self, target_id: &str) -> bool {
        self.slot(target_id).is_some()
    }

    /// Apply an outcome to a target. Returns the previous and new status,
    /// or `None` for an unknown target.
    pub async fn record(
        &self,
        target_id: &str,
        outcome: CheckOutcome,
    ) -> Option<(HealthStatus, HealthStatus)> {
        let slot = self.slot(target_id)?;
        let mut tracker = slot.tracker.write().await;
        let previous = tracker.status();
        let current = tracker.record(outcome);
        Some((previous, current))
    }

    /// Aggregate health: true iff every target counts as healthy.
    pub async fn healthy(&self) -> bool {
        for slot in self.slots.iter() {
            if !slot.tracker.read().await.counts_as_healthy() {
                return false;
            }
        }
        true
    }

    /// Snapshot of every target, in spec order.
    pub async fn snapshot(&self) -> Vec<TargetSnapshot> {
        let mut snapshots = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            snapshots.push(snapshot_of(slot).await);
        }
        snapshots
    }

    /// Snapshot of a single target.
    pub async fn target(&self, target_id: &str) -> Option<TargetSnapshot> {
        let slot = self.slot(target_id)?;
        Some(snapshot_of(slot).await)
    }

    fn slot(&self, target_id: &str) -> Option<&TargetSlot> {
        self.slots.iter().find(|slot| slot.id == target_id)
    }
}

async fn snapshot_of(slot: &TargetSlot) -> TargetSnapshot {
    let tracker = slot.tracker.read().await;
    TargetSnapshot {
        name: slot.id.clone(),
        status: tracker.status(),
        states: tracker.history().iter().cloned().collect(),
        consecutive_failures: tracker.consecutive_failures(),
        consecutive_successes: tracker.consecutive_successes(),
        checks: tracker.checks(),
        latest_error: tracker.latest_failure().map(|outcome| ProbeError {
            message: outcome.output.clone(),
            timestamp: outcome.timestamp,
        }),
    }
}
