//! Canonical per-machine snapshot (spec §3, §4.9) layered on top of the
//! `MachineInfo`/`MetricSample` shapes `fleet-collectors` already defines.

use chrono::{DateTime, Utc};
use fleet_collectors::{MachineInfo, MetricSample};
use serde::{Deserialize, Serialize};

pub type MachineId = String;

/// Derived liveness bucket — never stored, always computed from `last_seen`
/// at read time (spec §4.9: "Derived status per machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Online,
    Warning,
    Offline,
}

impl MachineStatus {
    pub fn derive(last_seen: DateTime<Utc>, now: DateTime<Utc>, thresholds: &StatusThresholds) -> Self {
        let age = now - last_seen;
        if age < thresholds.online {
            MachineStatus::Online
        } else if age < thresholds.warning {
            MachineStatus::Warning
        } else {
            MachineStatus::Offline
        }
    }
}

/// `T_online`/`T_warning` (spec §4.9, "e.g. 30s"/"e.g. 5min").
#[derive(Debug, Clone)]
pub struct StatusThresholds {
    pub online: chrono::Duration,
    pub warning: chrono::Duration,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            online: chrono::Duration::seconds(30),
            warning: chrono::Duration::minutes(5),
        }
    }
}

/// The canonical in-memory record for one machine: its static inventory plus
/// the most recent sample. Cheap to clone — `DashMap` hands out owned copies
/// under its per-shard lock rather than long-lived references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub info: MachineInfo,
    pub latest_sample: Option<MetricSample>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Machine {
    pub fn new(info: MachineInfo, now: DateTime<Utc>) -> Self {
        Self {
            info,
            latest_sample: None,
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn summary(&self, now: DateTime<Utc>, thresholds: &StatusThresholds) -> MachineSummary {
        MachineSummary {
            machine_id: self.info.machine_id.clone(),
            hostname: self.info.hostname.clone(),
            os: self.info.os.clone(),
            status: MachineStatus::derive(self.last_seen, now, thresholds),
            last_seen: self.last_seen,
        }
    }

    pub fn detail(&self, now: DateTime<Utc>, thresholds: &StatusThresholds) -> MachineDetail {
        MachineDetail {
            info: self.info.clone(),
            latest_sample: self.latest_sample.clone(),
            status: MachineStatus::derive(self.last_seen, now, thresholds),
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }
}

/// Row shown in a fleet-wide listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSummary {
    pub machine_id: MachineId,
    pub hostname: String,
    pub os: String,
    pub status: MachineStatus,
    pub last_seen: DateTime<Utc>,
}

/// Full per-machine view for the machine detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDetail {
    pub info: MachineInfo,
    pub latest_sample: Option<MetricSample>,
    pub status: MachineStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// The body of a `/fleet/report` POST before sealing is removed: a
/// `MachineInfo` on first contact (or `None` on subsequent reports) plus the
/// current `MetricSample`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<MachineInfo>,
    pub sample: MetricSample,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportAck {
    pub accepted: bool,
}
