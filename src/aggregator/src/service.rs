//! The live aggregator: lock-free per-machine snapshot map in front of
//! durable storage (spec §4.9). Grounded on `kpi_ingestion.rs`'s
//! ingest-then-derive-snapshot shape — a report comes in, gets folded into
//! the current snapshot, and the snapshot is what every read path serves.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use fleet_commands::{Command, CommandAction, CommandQueue, MachineId};
use fleet_crypto::{open, EncryptionKey, OpenedWith};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AggregatorError;
use crate::model::{Machine, MachineDetail, MachineStatus, MachineSummary, ReportAck, ReportPayload, StatusThresholds};
use crate::storage::{CommandStore, MachineStore, SampleStore};

/// Per-machine key material the aggregator needs to open sealed reports.
/// Key rotation bookkeeping (current/previous/pending_ack) lives in
/// `fleet-commands::KeyRotationTracker`; this is just the read-side view the
/// aggregator consults on every report.
pub trait KeyLookup: Send + Sync {
    fn keys_for(&self, machine_id: &str) -> (Option<EncryptionKey>, Option<EncryptionKey>);

    /// Called after a report is opened successfully. The default does
    /// nothing; a rotation-aware implementation uses `OpenedWith::Current`
    /// to clear its `pending_ack` flag (spec §4.3 step 5).
    fn note_opened(&self, _machine_id: &str, _via: OpenedWith) {}
}

/// No-op lookup for deployments running without payload sealing (TLS-only).
pub struct NoEncryption;

impl KeyLookup for NoEncryption {
    fn keys_for(&self, _machine_id: &str) -> (Option<EncryptionKey>, Option<EncryptionKey>) {
        (None, None)
    }
}

pub struct Aggregator {
    machines: Arc<DashMap<MachineId, Machine>>,
    commands: CommandQueue,
    machine_store: Arc<dyn MachineStore>,
    sample_store: Arc<dyn SampleStore>,
    command_store: Arc<dyn CommandStore>,
    keys: Arc<dyn KeyLookup>,
    thresholds: StatusThresholds,
}

impl Aggregator {
    /// Replay durable state into the in-memory snapshot map on startup
    /// (spec §6: survive a restart with at least the latest snapshot and
    /// every retained command).
    pub async fn restore(
        machine_store: Arc<dyn MachineStore>,
        sample_store: Arc<dyn SampleStore>,
        command_store: Arc<dyn CommandStore>,
        keys: Arc<dyn KeyLookup>,
    ) -> Result<Self, AggregatorError> {
        let machines = Arc::new(DashMap::new());
        for mut machine in machine_store.load_all().await? {
            if let Some(sample) = sample_store.recent(&machine.info.machine_id, 1).await?.into_iter().next() {
                machine.latest_sample = Some(sample);
            }
            machines.insert(machine.info.machine_id.clone(), machine);
        }

        let commands = CommandQueue::new();
        for command in command_store.load_all().await? {
            commands.restore(command).await;
        }

        info!(machine_count = machines.len(), "restored aggregator state");
        Ok(Self {
            machines,
            commands,
            machine_store,
            sample_store,
            command_store,
            keys,
            thresholds: StatusThresholds::default(),
        })
    }

    /// Decrypt, upsert the Machine, append the sample, update `last_seen`
    /// (spec §4.9 `on_report`).
    pub async fn on_report(&self, machine_id: &str, sealed: &[u8]) -> Result<ReportAck, AggregatorError> {
        let (current, previous) = self.keys.keys_for(machine_id);
        let (plaintext, via) = open(sealed, current.as_ref(), previous.as_ref())?;
        self.keys.note_opened(machine_id, via);
        let payload: ReportPayload = serde_json::from_slice(&plaintext)?;

        let now = Utc::now();
        let mut entry = self
            .machines
            .entry(machine_id.to_string())
            .or_insert_with(|| {
                let info = payload.info.clone().unwrap_or_else(|| placeholder_info(machine_id));
                Machine::new(info, now)
            });

        if let Some(info) = payload.info {
            entry.info = info;
        }
        entry.latest_sample = Some(payload.sample.clone());
        entry.last_seen = now;

        self.machine_store.upsert(&entry).await?;
        self.sample_store.append(machine_id, &payload.sample).await?;

        Ok(ReportAck { accepted: true })
    }

    pub fn list_machines(&self) -> Vec<MachineSummary> {
        let now = Utc::now();
        self.machines
            .iter()
            .map(|entry| entry.summary(now, &self.thresholds))
            .collect()
    }

    pub fn get_machine(&self, machine_id: &str) -> Result<MachineDetail, AggregatorError> {
        let now = Utc::now();
        self.machines
            .get(machine_id)
            .map(|entry| entry.detail(now, &self.thresholds))
            .ok_or_else(|| AggregatorError::UnknownMachine(machine_id.to_string()))
    }

    pub fn status_of(&self, machine_id: &str) -> Option<MachineStatus> {
        let now = Utc::now();
        self.machines
            .get(machine_id)
            .map(|entry| MachineStatus::derive(entry.last_seen, now, &self.thresholds))
    }

    pub async fn recent_commands(&self, machine_id: &str) -> Vec<Command> {
        self.commands.recent_for_machine(machine_id).await
    }

    /// Operator API: enqueue a command for `machine_id` (spec §4.9).
    pub async fn enqueue_command(&self, machine_id: &str, action: CommandAction) -> Result<Uuid, AggregatorError> {
        if !self.machines.contains_key(machine_id) {
            return Err(AggregatorError::UnknownMachine(machine_id.to_string()));
        }
        let id = self.commands.enqueue(machine_id.to_string(), action).await;
        if let Some(command) = self.commands.get(id).await {
            self.command_store.save(&command).await?;
        }
        Ok(id)
    }

    /// Agent API: the next pending command for `machine_id`, if any (spec
    /// §4.3/§4.9).
    pub async fn next_command(&self, machine_id: &str) -> Result<Option<Command>, AggregatorError> {
        let command = self.commands.next_command(machine_id).await;
        if let Some(command) = &command {
            self.command_store.save(command).await?;
        }
        Ok(command)
    }

    /// Agent API: record the outcome of a command it finished executing.
    pub async fn report_command_result(
        &self,
        command_id: Uuid,
        result: fleet_commands::CommandResult,
    ) -> Result<(), AggregatorError> {
        self.commands.report_result(command_id, result).await?;
        if let Some(command) = self.commands.get(command_id).await {
            self.command_store.save(&command).await?;
        }
        Ok(())
    }

    /// Sweep commands whose `executing` state has outlived its timeout.
    pub async fn expire_stale_commands(&self, timeout: std::time::Duration) -> Result<usize, AggregatorError> {
        let expired = self.commands.expire_stale(timeout).await;
        if expired > 0 {
            warn!(expired, "expired stale commands");
        }
        Ok(expired)
    }

    /// Enforce the §3 retention floor (≥ 7 days) by dropping anything older.
    pub async fn prune_samples(&self, retention: chrono::Duration) -> Result<u64, AggregatorError> {
        let cutoff = Utc::now() - retention;
        self.sample_store.prune_older_than(cutoff).await
    }
}

fn placeholder_info(machine_id: &str) -> fleet_collectors::MachineInfo {
    fleet_collectors::MachineInfo {
        machine_id: machine_id.to_string(),
        hostname: String::new(),
        computer_name: String::new(),
        os: String::new(),
        os_version: String::new(),
        architecture: String::new(),
        processor: String::new(),
        logical_cores: 0,
        physical_cores: 0,
        total_memory_bytes: 0,
        boot_time: Utc::now(),
        local_ip: None,
        disks: Vec::new(),
    }
}
