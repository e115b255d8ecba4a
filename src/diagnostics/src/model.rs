//! Wire shapes for the OSI probe, traceroute, and slowdown detector
//! (spec §4.4-§4.6). Tagged-variant structs, not a reflected bag of values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Warning,
    Fail,
    Blocked,
    /// Not reached because the probe as a whole hit `T_probe_max` —
    /// distinct from `Blocked`, which is the waterfall rule skipping a
    /// layer after a lower one already failed.
    Unknown,
}

impl TestStatus {
    /// Worst-of reduction used both per-layer (over tests) and for the
    /// waterfall rule (over layers).
    pub fn worst(self, other: Self) -> Self {
        use TestStatus::*;
        match (self, other) {
            (Fail, _) | (_, Fail) => Fail,
            (Blocked, _) | (_, Blocked) => Blocked,
            (Unknown, _) | (_, Unknown) => Unknown,
            (Warning, _) | (_, Warning) => Warning,
            _ => Pass,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: u8,
    pub name: String,
    pub status: TestStatus,
    pub tests: Vec<TestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsiResult {
    pub layers: Vec<LayerResult>,
    pub health_score: f64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortTarget {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomScanRequest {
    #[serde(default)]
    pub ports: Vec<PortTarget>,
    #[serde(default)]
    pub ping_targets: Vec<String>,
    #[serde(default)]
    pub dns_hostnames: Vec<String>,
    #[serde(default)]
    pub http_urls: Vec<String>,
    #[serde(default)]
    pub tls_targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
    pub total: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomScanResult {
    pub results: Vec<TestResult>,
    pub summary: ScanSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    Icmp,
    Udp,
    TcpSyn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub hop: u8,
    pub hostname: Option<String>,
    pub ip: String,
    pub loss_pct: f32,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteResult {
    pub hops: Vec<Hop>,
    pub problem_hops: Vec<u8>,
    pub method: ProbeMethod,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedTestSample {
    pub timestamp: DateTime<Utc>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiSample {
    pub timestamp: DateTime<Utc>,
    pub rssi_dbm: i32,
    pub channel: u32,
    pub snr_db: f64,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    WifiSignal,
    Interference,
    Gateway,
    Internet,
    Event,
    Congestion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factor {
    pub category: FactorCategory,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: String,
    pub before: f64,
    pub after: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: f64,
    pub trigger_factors: Vec<String>,
    pub metric_changes: Vec<MetricChange>,
    pub factors: Vec<Factor>,
    pub recommendations: Vec<String>,
    pub traceroute_snapshots: Vec<TracerouteResult>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncidentThresholds {
    pub t_down_slow_mbps: f64,
    pub t_up_slow_mbps: f64,
    pub t_ping_high_ms: f64,
    pub min_consecutive_samples: usize,
}

impl Default for IncidentThresholds {
    fn default() -> Self {
        Self {
            t_down_slow_mbps: 20.0,
            t_up_slow_mbps: 5.0,
            t_ping_high_ms: 100.0,
            min_consecutive_samples: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentReportStatus {
    Healthy,
    Slowdowns,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub incidents: Vec<Incident>,
    pub thresholds: IncidentThresholds,
    pub status: IncidentReportStatus,
}
