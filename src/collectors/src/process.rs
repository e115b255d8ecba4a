//! Process monitor: top-N selection, stuck/zombie detection, ownership-
//! scoped kill (spec §4.8).
//!
//! Grounded on `system_monitor.rs`'s `HealthCheck` alerting-threshold shape
//! (CPU-over-threshold ⇒ alert) generalized into a per-pid sliding-window
//! CPU tracker, and on the bounded-iteration-with-partial-result discipline
//! used for scheduling in the execution-fabric crate.

use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::{System, Users};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::CollectorError;

const T_ITER_MAX: Duration = Duration::from_secs(5);
const HIGH_CPU_THRESHOLD: f32 = 90.0;
const STUCK_DURATION: Duration = Duration::from_secs(30);
const MAX_TRACKER: usize = 1000;
const MAX_SAMPLES_PER_PID: usize = 20;
const PROTECTED_PID_FLOOR: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Cpu,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub username: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_mb: f64,
    pub status: String,
    pub runtime_human: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProblematicProcesses {
    pub zombie: Vec<ProcessInfo>,
    pub stuck: Vec<ProcessInfo>,
    pub stopped: Vec<ProcessInfo>,
    pub high_cpu: Vec<ProcessInfo>,
    pub summary: ProblematicSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProblematicSummary {
    pub zombie_count: usize,
    pub stuck_count: usize,
    pub stopped_count: usize,
    pub high_cpu_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillResult {
    pub success: bool,
    pub message: String,
}

struct CpuSample {
    percent: f32,
}

struct TrackerEntry {
    start_time: Instant,
    samples: Vec<CpuSample>,
    stuck_since: Option<Instant>,
}

/// Bounded per-pid sliding-window tracker for sustained high-CPU detection.
pub struct ProcessMonitor {
    sys: Mutex<System>,
    tracker: Mutex<HashMap<u32, TrackerEntry>>,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new_all()),
            tracker: Mutex::new(HashMap::new()),
        }
    }

    /// Partial top-K selection over the live process table (O(n log k)),
    /// bounded by `T_iter_max`. On timeout, returns a best-effort subset
    /// drawn from whatever was sampled so far.
    pub async fn top(&self, sort_by: SortBy, limit: usize) -> Vec<ProcessInfo> {
        let limit = limit.min(1000);
        let deadline = Instant::now() + T_ITER_MAX;
        let mut sys = self.sys.lock().await;
        sys.refresh_processes();
        let users = Users::new_with_refreshed_list();

        struct Scored(f64, ProcessInfo);
        impl PartialEq for Scored {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }
        impl Eq for Scored {}
        impl PartialOrd for Scored {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Scored {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // Reversed so the heap's "greatest" is the smallest score,
                // making the heap hold the current top-`limit` by score.
                other
                    .0
                    .partial_cmp(&self.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }
        }

        let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(limit + 1);
        let mut timed_out = false;

        for (pid, process) in sys.processes() {
            if Instant::now() > deadline {
                timed_out = true;
                break;
            }

            let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
            let total_mem = sys.total_memory().max(1) as f64;
            let memory_percent = (process.memory() as f64 / total_mem * 100.0) as f32;

            let info = ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                username: process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                cpu_percent: process.cpu_usage(),
                memory_percent,
                memory_mb,
                status: format!("{:?}", process.status()),
                runtime_human: humanize_seconds(process.run_time()),
            };

            let score = match sort_by {
                SortBy::Cpu => info.cpu_percent as f64,
                SortBy::Memory => info.memory_mb,
            };

            heap.push(Scored(score, info));
            if heap.len() > limit {
                heap.pop();
            }
        }

        if timed_out {
            warn!("process top() exceeded T_iter_max, returning partial results");
        }

        let mut results: Vec<ProcessInfo> = heap.into_iter().map(|s| s.1).collect();
        results.sort_by(|a, b| {
            let (sa, sb) = match sort_by {
                SortBy::Cpu => (a.cpu_percent as f64, b.cpu_percent as f64),
                SortBy::Memory => (a.memory_mb, b.memory_mb),
            };
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    /// Update the sliding-window CPU tracker and classify pathological
    /// processes.
    pub async fn problematic(&self) -> ProblematicProcesses {
        let mut sys = self.sys.lock().await;
        sys.refresh_processes();
        let users = Users::new_with_refreshed_list();
        let now = Instant::now();

        let mut result = ProblematicProcesses::default();
        let mut tracker = self.tracker.lock().await;
        let live_pids: std::collections::HashSet<u32> =
            sys.processes().keys().map(|p| p.as_u32()).collect();

        // Purge entries whose pid disappeared.
        tracker.retain(|pid, _| live_pids.contains(pid));

        for (pid, process) in sys.processes() {
            let pid = pid.as_u32();
            let status_str = format!("{:?}", process.status());

            let info = ProcessInfo {
                pid,
                name: process.name().to_string(),
                username: process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                cpu_percent: process.cpu_usage(),
                memory_percent: 0.0,
                memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
                status: status_str.clone(),
                runtime_human: humanize_seconds(process.run_time()),
            };

            if status_str.to_lowercase().contains("zombie") {
                result.zombie.push(info.clone());
                continue;
            }
            if status_str.to_lowercase().contains("stop") {
                result.stopped.push(info.clone());
                continue;
            }

            let entry = tracker.entry(pid).or_insert_with(|| TrackerEntry {
                start_time: now,
                samples: Vec::new(),
                stuck_since: None,
            });

            entry.samples.push(CpuSample {
                percent: info.cpu_percent,
            });
            if entry.samples.len() > MAX_SAMPLES_PER_PID {
                entry.samples.remove(0);
            }

            let avg: f32 = entry.samples.iter().map(|s| s.percent).sum::<f32>()
                / entry.samples.len() as f32;

            if avg >= HIGH_CPU_THRESHOLD {
                if entry.stuck_since.is_none() {
                    entry.stuck_since = Some(now);
                }
                let elapsed = entry
                    .stuck_since
                    .map(|since| now.duration_since(since))
                    .unwrap_or_default();

                if elapsed >= STUCK_DURATION {
                    result.stuck.push(info);
                } else {
                    result.high_cpu.push(info);
                }
            } else {
                entry.stuck_since = None;
            }
        }

        if tracker.len() > MAX_TRACKER {
            let mut by_start: Vec<(u32, Instant)> =
                tracker.iter().map(|(pid, e)| (*pid, e.start_time)).collect();
            by_start.sort_by_key(|(_, start)| *start);
            let excess = tracker.len() - MAX_TRACKER;
            for (pid, _) in by_start.into_iter().take(excess) {
                tracker.remove(&pid);
            }
        }

        result.summary = ProblematicSummary {
            zombie_count: result.zombie.len(),
            stuck_count: result.stuck.len(),
            stopped_count: result.stopped.len(),
            high_cpu_count: result.high_cpu.len(),
        };

        result
    }

    /// Terminate `pid`, gracefully first (SIGTERM-equivalent), then forcibly
    /// after a 3s grace period. Two safety gates: ownership and PID floor.
    /// Never escalates privilege.
    pub async fn kill(&self, pid: u32) -> Result<KillResult, CollectorError> {
        if pid < PROTECTED_PID_FLOOR {
            return Err(CollectorError::Protected(pid));
        }

        let mut sys = self.sys.lock().await;
        sys.refresh_processes();
        let sys_pid = sysinfo::Pid::from_u32(pid);
        let process = sys
            .process(sys_pid)
            .ok_or(CollectorError::ProcessNotFound(pid))?;

        let owner_uid = process.user_id().cloned();
        let current_uid = sys
            .process(sysinfo::Pid::from_u32(std::process::id()))
            .and_then(|current| current.user_id().cloned());
        if let (Some(owner), Some(current)) = (owner_uid, current_uid) {
            if owner != current {
                return Err(CollectorError::PermissionDenied(pid));
            }
        }

        let name = process.name().to_string();
        let terminated = process.kill_with(sysinfo::Signal::Term).unwrap_or(false);
        if terminated {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        sys.refresh_processes();
        if sys.process(sys_pid).is_some() {
            tokio::time::sleep(Duration::from_secs(3)).await;
            sys.refresh_processes();
            if let Some(process) = sys.process(sys_pid) {
                process.kill();
            }
        }

        Ok(KillResult {
            success: true,
            message: format!("Process {} (PID: {}) terminated successfully", name, pid),
        })
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn humanize_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
