//! Remote encryption-key rotation bookkeeping (spec §4.3 steps 1-6).
//!
//! `fleet-crypto::KeySlots` holds the actual key material for one machine;
//! this module tracks the *rotation-in-progress* status so the operator API
//! can answer `GET /api/fleet/key-rotation-status` and so the janitor can
//! roll back rotations that never get acknowledged.
//!
//! The lock here is a plain `std::sync::RwLock`, not `tokio::sync::RwLock`:
//! every critical section below is a handful of field assignments with no
//! `.await` inside it, so there is nothing to gain from an async-aware lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_crypto::KeySlots;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::MachineId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationRecord {
    pub machine_id: MachineId,
    pub status: RotationStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

struct MachineKeyState {
    slots: KeySlots,
    record: Option<RotationRecord>,
}

/// Tracks the `KeySlots` and in-flight rotation status for every known
/// machine. One instance is shared across the command queue and the HTTP
/// handlers that expose `/api/fleet/rotate-encryption-key` and
/// `/api/fleet/key-rotation-status`.
#[derive(Clone)]
pub struct KeyRotationTracker {
    machines: Arc<RwLock<HashMap<MachineId, MachineKeyState>>>,
}

impl KeyRotationTracker {
    pub fn new() -> Self {
        Self {
            machines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Step 3: `previous <- current`, `current <- new_key`, `pending_ack <- true`.
    pub fn begin_rotation(&self, machine_id: &MachineId, new_key: fleet_crypto::EncryptionKey) {
        let mut machines = self.machines.write().unwrap();
        let entry = machines
            .entry(machine_id.clone())
            .or_insert_with(|| MachineKeyState {
                slots: KeySlots::none(),
                record: None,
            });

        entry.slots.begin_rotation(new_key);
        entry.record = Some(RotationRecord {
            machine_id: machine_id.clone(),
            status: RotationStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
        });

        info!(%machine_id, "key rotation started");
    }

    /// Step 5: the agent's first report under the new key lets `open`
    /// succeed with the `current` slot — call this to clear `pending_ack`.
    pub fn confirm(&self, machine_id: &MachineId) {
        let mut machines = self.machines.write().unwrap();
        if let Some(state) = machines.get_mut(machine_id) {
            state.slots.confirm();
            if let Some(record) = state.record.as_mut() {
                record.status = RotationStatus::Completed;
                record.completed_at = Some(Utc::now());
            }
            info!(%machine_id, "key rotation confirmed");
        }
    }

    /// Step 6: after `T_rotation_timeout`, roll unacknowledged rotations back
    /// to the old key and mark them failed.
    pub fn expire_unacknowledged(&self, timeout: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout).unwrap_or_default();
        let mut machines = self.machines.write().unwrap();
        let mut rolled_back = 0;

        for (machine_id, state) in machines.iter_mut() {
            let still_pending = state
                .record
                .as_ref()
                .map(|r| r.status == RotationStatus::Pending && r.started_at < cutoff)
                .unwrap_or(false);

            if still_pending {
                state.slots.rollback();
                if let Some(record) = state.record.as_mut() {
                    record.status = RotationStatus::Failed;
                    record.completed_at = Some(Utc::now());
                }
                rolled_back += 1;
                warn!(%machine_id, "key rotation timed out, rolled back");
            }
        }

        rolled_back
    }

    pub fn current_key(&self, machine_id: &str) -> Option<fleet_crypto::EncryptionKey> {
        self.machines
            .read()
            .unwrap()
            .get(machine_id)
            .and_then(|s| s.slots.current.clone())
    }

    pub fn previous_key(&self, machine_id: &str) -> Option<fleet_crypto::EncryptionKey> {
        self.machines
            .read()
            .unwrap()
            .get(machine_id)
            .and_then(|s| s.slots.previous.clone())
    }

    pub fn set_initial_key(&self, machine_id: &MachineId, key: fleet_crypto::EncryptionKey) {
        let mut machines = self.machines.write().unwrap();
        machines.insert(
            machine_id.clone(),
            MachineKeyState {
                slots: KeySlots::with_current(key),
                record: None,
            },
        );
    }

    pub fn all_records(&self) -> Vec<RotationRecord> {
        self.machines
            .read()
            .unwrap()
            .values()
            .filter_map(|s| s.record.clone())
            .collect()
    }
}

impl Default for KeyRotationTracker {
    fn default() -> Self {
        Self::new()
    }
}
