use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, Entry};
use tracing::debug;

use shared::{
    domain::{DeviceId, LockState},
    protocol::{MemoryEntryPayload, MemorySource},
};

/// Process-local record of the last lock state commanded for each device.
///
/// Cloning yields another handle onto the same map. Entries are guarded per
/// shard, so every read-modify-write on one device id is atomic. Nothing is
/// persisted: a fresh process starts with an empty memory.
#[derive(Debug, Clone, Default)]
pub struct CommandMemory {
    entries: Arc<DashMap<DeviceId, MemoryEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEntry {
    pub state: LockState,
    pub source: MemorySource,
    pub updated_at: DateTime<Utc>,
}

impl CommandMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_state(&self, device_id: &DeviceId) -> Option<LockState> {
        self.entries.get(device_id).map(|entry| entry.state)
    }

    /// Remembered state, or unlocked for a device that was never commanded.
    pub fn lock_state_or_default(&self, device_id: &DeviceId) -> LockState {
        self.lock_state(device_id).unwrap_or_default()
    }

    /// Store the state a command is about to put the device in. Returns the
    /// previously remembered state.
    pub fn record_command(&self, device_id: &DeviceId, state: LockState) -> Option<LockState> {
        let previous = self
            .entries
            .insert(
                device_id.clone(),
                MemoryEntry {
                    state,
                    source: MemorySource::Command,
                    updated_at: Utc::now(),
                },
            )
            .map(|entry| entry.state);
        debug!(%device_id, ?state, ?previous, "recorded commanded lock state");
        previous
    }

    /// A moving vehicle cannot be locked: force the entry to unlocked.
    ///
    /// An entry that already says unlocked is left untouched, so repeated
    /// moving polls do not rewrite it. Returns the state before the call.
    pub fn record_motion(&self, device_id: &DeviceId) -> Option<LockState> {
        match self.entries.entry(device_id.clone()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get().state;
                if previous != LockState::Unlocked {
                    slot.insert(MemoryEntry {
                        state: LockState::Unlocked,
                        source: MemorySource::Motion,
                        updated_at: Utc::now(),
                    });
                    debug!(%device_id, "motion overrode remembered lock");
                }
                Some(previous)
            }
            Entry::Vacant(slot) => {
                slot.insert(MemoryEntry {
                    state: LockState::Unlocked,
                    source: MemorySource::Motion,
                    updated_at: Utc::now(),
                });
                None
            }
        }
    }

    pub fn entry(&self, device_id: &DeviceId) -> Option<MemoryEntry> {
        self.entries.get(device_id).map(|entry| *entry)
    }

    /// All remembered entries, sorted by device id.
    pub fn snapshot(&self) -> Vec<MemoryEntryPayload> {
        let mut entries: Vec<MemoryEntryPayload> = self
            .entries
            .iter()
            .map(|item| MemoryEntryPayload {
                device_id: item.key().clone(),
                state: item.state,
                source: item.source,
                updated_at: item.updated_at,
            })
            .collect();
        entries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
