//! MetricSample and MachineInfo shapes (spec §3, §4.7). Deliberately a
//! tagged-variant struct per field group rather than a reflected bag of
//! values — see the Design Notes' *Reflection over object fields* flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub machine_id: String,
    pub hostname: String,
    pub computer_name: String,
    pub os: String,
    pub os_version: String,
    pub architecture: String,
    pub processor: String,
    pub logical_cores: usize,
    pub physical_cores: usize,
    pub total_memory_bytes: u64,
    pub boot_time: DateTime<Utc>,
    pub local_ip: Option<String>,
    pub disks: Vec<DiskInventoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInventoryEntry {
    pub mount_point: String,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub percent: f32,
    pub load_1: f64,
    pub load_5: f64,
    pub load_15: f64,
    pub per_core: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub wired_bytes: u64,
    pub swap_used_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskPartition {
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub partitions: Vec<DiskPartition>,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub total: usize,
    pub top_cpu: Vec<ProcessSample>,
    pub top_memory: Vec<ProcessSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatterySnapshot {
    pub percent: f32,
    pub plugged: bool,
    pub time_left_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityPosture {
    pub firewall_enabled: Option<bool>,
    pub filevault_enabled: Option<bool>,
    pub gatekeeper_enabled: Option<bool>,
    pub sip_enabled: Option<bool>,
}

/// One timestamped sample of host state. Every field group is independently
/// optional so a single failing collector only blanks its own section
/// (spec §7: "never fail the whole sample").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub uptime_s: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<ProcessSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatterySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityPosture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart: Option<serde_json::Value>,
}
