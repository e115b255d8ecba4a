//! SMART disk-health collector (spec §4.9). Shells out to `smartctl -j`,
//! best-effort: absence of the binary or a non-zero exit is not an error,
//! it just means no SMART data this cycle.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::cache::FreshnessCache;

const T_SMART_CACHE: Duration = Duration::from_secs(30);
const T_SMART_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SmartCollector {
    cache: FreshnessCache<Value>,
}

impl SmartCollector {
    pub fn new() -> Self {
        Self {
            cache: FreshnessCache::new(T_SMART_CACHE),
        }
    }

    /// Returns `None` when `smartctl` is unavailable or fails — never an
    /// error, per spec §4.9's "never block a telemetry cycle on SMART".
    pub async fn collect(&self, device: &str) -> Option<Value> {
        if let Some(cached) = self.cache.get().await {
            return Some(cached);
        }

        let output = timeout(
            T_SMART_TIMEOUT,
            Command::new("smartctl")
                .arg("-a")
                .arg("-j")
                .arg(device)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .output(),
        )
        .await;

        let value = match output {
            Ok(Ok(out)) if !out.stdout.is_empty() => {
                serde_json::from_slice::<Value>(&out.stdout).ok()
            }
            Ok(Ok(_)) => None,
            Ok(Err(err)) => {
                debug!(%err, "smartctl not available");
                None
            }
            Err(_) => {
                debug!("smartctl timed out");
                None
            }
        };

        if let Some(v) = &value {
            self.cache.store(v.clone()).await;
        }
        value
    }
}

impl Default for SmartCollector {
    fn default() -> Self {
        Self::new()
    }
}
