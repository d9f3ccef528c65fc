//! Seed version tracking for polling readers
//!
//! Readers poll the current seed record and hold the last-seen id locally.
//! When the id changes underneath a reader who did not cause the change,
//! the tracker surfaces a conflict with two resolutions: keep conditioning
//! on the image the reader was using (re-pin it as an override) or adopt
//! the new record. This is advisory reconciliation for the reader's own
//! conditioning choice — the durable "current" pointer is never touched and
//! writers are never blocked.

use crate::seed::SeedRecord;

/// Reader synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing observed yet
    Unsynced,
    /// Tracking the current record
    Synced,
    /// The record changed externally; awaiting a resolution
    ConflictPending,
}

/// What a single poll observation amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    FirstSync,
    Unchanged,
    SelfUpdate,
    ExternalUpdate,
}

/// An unresolved external change
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub previous_id: String,
    /// Image the reader was conditioning on before the change
    pub previous_url: String,
    pub next: SeedRecord,
}

/// Per-reader seed tracker; drives the Unsynced -> Synced ->
/// ConflictPending cycle
#[derive(Debug, Default)]
pub struct SeedTracker {
    last_seen_id: Option<String>,
    last_stable_url: Option<String>,
    conflict: Option<Conflict>,
    pinned_override: Option<String>,
}

impl SeedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        if self.last_seen_id.is_none() {
            SyncState::Unsynced
        } else if self.conflict.is_some() {
            SyncState::ConflictPending
        } else {
            SyncState::Synced
        }
    }

    /// Feed one polled record into the tracker. `self_initiated` is true
    /// when this reader submitted the job that produced the record.
    pub fn observe(&mut self, current: &SeedRecord, self_initiated: bool) -> Observation {
        let Some(last_seen) = self.last_seen_id.as_deref() else {
            self.last_seen_id = Some(current.id.clone());
            self.last_stable_url = Some(current.url.clone());
            return Observation::FirstSync;
        };

        if last_seen == current.id {
            return Observation::Unchanged;
        }

        if self_initiated {
            self.last_seen_id = Some(current.id.clone());
            self.last_stable_url = Some(current.url.clone());
            self.pinned_override = None;
            return Observation::SelfUpdate;
        }

        let previous_url = self.last_stable_url.clone().unwrap_or_default();
        let previous_id = match &self.conflict {
            // A second external change before resolution keeps the original
            // "previous" side of the conflict
            Some(existing) => existing.previous_id.clone(),
            None => last_seen.to_string(),
        };

        self.conflict = Some(Conflict {
            previous_id,
            previous_url,
            next: current.clone(),
        });
        self.last_seen_id = Some(current.id.clone());

        Observation::ExternalUpdate
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        self.conflict.as_ref()
    }

    /// Resolve by keeping the seed the reader was using: the previous image
    /// becomes the pinned conditioning override. Returns the pinned URL.
    /// No-op when no conflict is pending.
    pub fn resolve_continue(&mut self) -> Option<String> {
        let conflict = self.conflict.take()?;
        self.pinned_override = Some(conflict.previous_url.clone());
        Some(conflict.previous_url)
    }

    /// Resolve by adopting the new record; any pinned override is dropped.
    pub fn resolve_switch(&mut self) {
        if let Some(conflict) = self.conflict.take() {
            self.last_stable_url = Some(conflict.next.url);
            self.pinned_override = None;
        }
    }

    /// Conditioning override chosen by a previous "continue" resolution
    pub fn pinned_override(&self) -> Option<&str> {
        self.pinned_override.as_deref()
    }

    /// Drop the pinned override (e.g. after it was consumed by a generation)
    pub fn clear_override(&mut self) {
        self.pinned_override = None;
    }
}
