// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Debounced persistence of the hierarchy table.
//!
//! Time is passed in by the host (`Instant`), so the synchronizer never
//! spawns timers of its own: the host calls [`PersistenceSynchronizer::poll`]
//! on each tick and a due save fires then, with the table as of that moment.

use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::model::HierarchyTable;
use crate::storage::{KeyValueStore, StorageError, StorageGateway};

/// Cancellable one-shot deadline. Re-arming replaces the previous deadline.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    /// Timer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Pending deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// (Re)start the quiet period at `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Drop the pending deadline.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Disarm and return `true` when the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Outcome of the most recent save attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceStatus {
    /// Time of the last successful save (or of the data loaded at open).
    pub last_saved: Option<OffsetDateTime>,
    /// Message of the last failed save; cleared by the next success.
    pub last_error: Option<String>,
    /// Whether a debounced save is waiting to fire.
    pub pending: bool,
}

/// Debounces table saves through a [`StorageGateway`].
#[derive(Debug, Clone)]
pub struct PersistenceSynchronizer {
    timer: DebounceTimer,
    status: PersistenceStatus,
    dirty: bool,
}

impl PersistenceSynchronizer {
    /// Synchronizer with the given debounce delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            timer: DebounceTimer::new(delay),
            status: PersistenceStatus::default(),
            dirty: false,
        }
    }

    /// Current status.
    pub fn status(&self) -> &PersistenceStatus {
        &self.status
    }

    /// Pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// True from the first scheduled save until one succeeds, and before
    /// anything has been saved at all. A failed save leaves it set.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty || self.status.pending || self.status.last_saved.is_none()
    }

    /// Record that storage already holds the current table (after a load).
    pub fn mark_synced(&mut self, at: OffsetDateTime) {
        self.timer.cancel();
        self.dirty = false;
        self.status = PersistenceStatus {
            last_saved: Some(at),
            last_error: None,
            pending: false,
        };
    }

    /// Request a save; bursts inside the delay collapse into one.
    pub fn schedule(&mut self, now: Instant) {
        self.timer.arm(now);
        self.status.pending = true;
        self.dirty = true;
    }

    /// Drop a pending save without writing. Used when storage is wiped, so
    /// the dropped edits no longer count as unsaved.
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.status.pending = false;
        self.dirty = false;
    }

    /// Fire the pending save when its deadline has passed.
    ///
    /// Returns `None` when nothing fired, otherwise the save outcome.
    pub fn poll<S, C>(
        &mut self,
        now: Instant,
        table: &HierarchyTable,
        gateway: &StorageGateway<S, C>,
    ) -> Option<Result<(), StorageError>>
    where
        S: KeyValueStore,
        C: Clock,
    {
        if !self.timer.fire_if_due(now) {
            return None;
        }
        debug!(version = table.version(), "debounced save firing");
        Some(self.save(table, gateway))
    }

    /// Save immediately, cancelling any pending deadline.
    pub fn flush<S, C>(
        &mut self,
        table: &HierarchyTable,
        gateway: &StorageGateway<S, C>,
    ) -> Result<(), StorageError>
    where
        S: KeyValueStore,
        C: Clock,
    {
        self.timer.cancel();
        self.save(table, gateway)
    }

    fn save<S, C>(
        &mut self,
        table: &HierarchyTable,
        gateway: &StorageGateway<S, C>,
    ) -> Result<(), StorageError>
    where
        S: KeyValueStore,
        C: Clock,
    {
        self.status.pending = false;
        match gateway.save(table) {
            Ok(()) => {
                self.dirty = false;
                self.status.last_saved = Some(gateway.clock().now());
                self.status.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "failed to persist organization chart");
                self.status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
