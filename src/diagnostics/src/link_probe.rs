//! Layer 1 physical-link facts. Object-safe so platform implementations can
//! be swapped the way `DataSource` is in the collectors crate; the only
//! implementation shipped here is a best-effort Linux reader that never
//! panics on an unsupported platform — it reports `unknown` instead.

use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct LinkState {
    pub link_up: Option<bool>,
    pub wifi_rssi_dbm: Option<i32>,
    pub wifi_rate_mbps: Option<f64>,
    pub cable_present: Option<bool>,
}

#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, interface: &str) -> LinkState;
}

pub struct LinuxLinkProbe;

#[async_trait]
impl LinkProbe for LinuxLinkProbe {
    async fn probe(&self, interface: &str) -> LinkState {
        let link_up = tokio::fs::read_to_string(format!("/sys/class/net/{interface}/carrier"))
            .await
            .ok()
            .map(|s| s.trim() == "1");

        let wifi_rssi_dbm = read_wireless_rssi(interface).await;

        LinkState {
            link_up,
            wifi_rssi_dbm,
            wifi_rate_mbps: None,
            cable_present: link_up,
        }
    }
}

async fn read_wireless_rssi(interface: &str) -> Option<i32> {
    let content = tokio::fs::read_to_string("/proc/net/wireless").await.ok()?;
    for line in content.lines().skip(2) {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?.trim_end_matches(':');
        if iface != interface {
            continue;
        }
        // level is the 3rd numeric field (status, link, level).
        let level: f64 = fields.nth(1)?.parse().ok()?;
        return Some(level as i32);
    }
    None
}
