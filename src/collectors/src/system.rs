//! System-metrics collector (spec §4.7). Grounded on
//! `system_monitor.rs`/`data_collector.rs`'s `sysinfo`-backed collection
//! cycle, generalized from health-check polling into one bounded
//! `collect()` call per telemetry tick.

use std::time::Duration;

use chrono::Utc;
use sysinfo::{Disks, Networks, System};
use tokio::time::timeout;
use tracing::warn;

use crate::cache::FreshnessCache;
use crate::model::{
    CpuMetrics, DiskInventoryEntry, DiskMetrics, DiskPartition, MachineInfo, MemoryMetrics,
    MetricSample, NetworkMetrics,
};

/// Platform/virtual mounts that should never appear in partition inventory.
const MOUNT_DENYLIST: &[&str] = &["/proc", "/sys", "/dev", "/run", "/snap", "/boot/efi"];

const T_COLLECT_MAX: Duration = Duration::from_secs(3);
const T_CACHE: Duration = Duration::from_secs(1);

pub struct SystemCollector {
    sys: tokio::sync::Mutex<System>,
    cache: FreshnessCache<MetricSample>,
    machine_info: tokio::sync::OnceCell<MachineInfo>,
}

impl SystemCollector {
    pub fn new() -> Self {
        Self {
            sys: tokio::sync::Mutex::new(System::new_all()),
            cache: FreshnessCache::new(T_CACHE),
            machine_info: tokio::sync::OnceCell::new(),
        }
    }

    /// Static host facts, captured once and never recollected (spec §4.2).
    pub async fn machine_info(&self, machine_id: String) -> MachineInfo {
        self.machine_info
            .get_or_init(|| async {
                let mut sys = self.sys.lock().await;
                sys.refresh_all();
                let disk_list = Disks::new_with_refreshed_list();

                let disks: Vec<DiskInventoryEntry> = disk_list
                    .list()
                    .iter()
                    .filter(|d| {
                        let mount = d.mount_point().to_string_lossy();
                        !MOUNT_DENYLIST.iter().any(|deny| mount.starts_with(deny))
                    })
                    .map(|d| DiskInventoryEntry {
                        mount_point: d.mount_point().to_string_lossy().to_string(),
                        total_bytes: d.total_space(),
                    })
                    .collect();

                MachineInfo {
                    machine_id,
                    hostname: System::host_name().unwrap_or_default(),
                    computer_name: System::name().unwrap_or_default(),
                    os: System::name().unwrap_or_else(|| "unknown".to_string()),
                    os_version: System::os_version().unwrap_or_default(),
                    architecture: std::env::consts::ARCH.to_string(),
                    processor: sys
                        .cpus()
                        .first()
                        .map(|c| c.brand().to_string())
                        .unwrap_or_default(),
                    logical_cores: sys.cpus().len(),
                    physical_cores: sys.physical_core_count().unwrap_or(sys.cpus().len()),
                    total_memory_bytes: sys.total_memory(),
                    boot_time: Utc::now()
                        - chrono::Duration::seconds(System::uptime().min(i64::MAX as u64) as i64),
                    local_ip: None,
                    disks,
                }
            })
            .await
            .clone()
    }

    /// Collect one `MetricSample`, bounded by `T_collect_max`. Returns the
    /// previous sample unchanged if called again within `T_cache` (spec
    /// §4.7's one-second cache, to absorb concurrent endpoint polling).
    pub async fn collect(&self) -> MetricSample {
        if let Some(cached) = self.cache.get().await {
            return cached;
        }

        let sample = match timeout(T_COLLECT_MAX, self.collect_uncached()).await {
            Ok(sample) => sample,
            Err(_) => {
                warn!("metrics collection exceeded T_collect_max, returning partial sample");
                MetricSample {
                    timestamp: Utc::now(),
                    uptime_s: 0,
                    cpu: None,
                    memory: None,
                    disk: None,
                    network: None,
                    processes: None,
                    battery: None,
                    security: None,
                    smart: None,
                }
            }
        };

        self.cache.store(sample.clone()).await;
        sample
    }

    async fn collect_uncached(&self) -> MetricSample {
        let mut sys = self.sys.lock().await;
        sys.refresh_cpu();
        sys.refresh_memory();
        let disk_list = Disks::new_with_refreshed_list();
        let network_list = Networks::new_with_refreshed_list();

        let cpu = Some(CpuMetrics {
            percent: sys.global_cpu_info().cpu_usage(),
            load_1: System::load_average().one,
            load_5: System::load_average().five,
            load_15: System::load_average().fifteen,
            per_core: sys.cpus().iter().map(|c| c.cpu_usage()).collect(),
        });

        let memory = Some(MemoryMetrics {
            total_bytes: sys.total_memory(),
            used_bytes: sys.used_memory(),
            available_bytes: sys.available_memory(),
            wired_bytes: 0,
            swap_used_bytes: sys.used_swap(),
        });

        let partitions: Vec<DiskPartition> = disk_list
            .list()
            .iter()
            .filter(|d| {
                let mount = d.mount_point().to_string_lossy();
                !MOUNT_DENYLIST.iter().any(|deny| mount.starts_with(deny))
            })
            .map(|d| DiskPartition {
                mount_point: d.mount_point().to_string_lossy().to_string(),
                total_bytes: d.total_space(),
                used_bytes: d.total_space().saturating_sub(d.available_space()),
            })
            .collect();
        let disk = Some(DiskMetrics {
            partitions: dedupe_apfs(partitions),
            io_read_bytes: 0,
            io_write_bytes: 0,
        });

        let (bytes_sent, bytes_received, packets_sent, packets_received, errors) = network_list
            .list()
            .iter()
            .fold((0, 0, 0, 0, 0), |acc, (_, data)| {
                (
                    acc.0 + data.total_transmitted(),
                    acc.1 + data.total_received(),
                    acc.2 + data.total_packets_transmitted(),
                    acc.3 + data.total_packets_received(),
                    acc.4 + data.total_errors_on_transmitted() + data.total_errors_on_received(),
                )
            });
        let network = Some(NetworkMetrics {
            bytes_sent,
            bytes_received,
            packets_sent,
            packets_received,
            errors,
        });

        MetricSample {
            timestamp: Utc::now(),
            uptime_s: System::uptime(),
            cpu,
            memory,
            disk,
            network,
            processes: None,
            battery: None,
            security: None,
            smart: None,
        }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the Data volume over the system root when both are APFS mounts of
/// the same container (spec §4.7). Heuristic: when a `/System/Volumes/Data`
/// style mount exists alongside `/`, drop `/`.
fn dedupe_apfs(mut partitions: Vec<DiskPartition>) -> Vec<DiskPartition> {
    let has_data_volume = partitions
        .iter()
        .any(|p| p.mount_point.contains("/System/Volumes/Data"));
    if has_data_volume {
        partitions.retain(|p| p.mount_point != "/");
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apfs_dedup_drops_root_when_data_volume_present() {
        let partitions = vec![
            DiskPartition {
                mount_point: "/".to_string(),
                total_bytes: 100,
                used_bytes: 10,
            },
            DiskPartition {
                mount_point: "/System/Volumes/Data".to_string(),
                total_bytes: 100,
                used_bytes: 20,
            },
        ];
        let result = dedupe_apfs(partitions);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].mount_point, "/System/Volumes/Data");
    }

    #[tokio::test]
    async fn collect_is_cached_within_ttl() {
        let collector = SystemCollector::new();
        let first = collector.collect().await;
        let second = collector.collect().await;
        assert_eq!(first.timestamp, second.timestamp);
    }
}
