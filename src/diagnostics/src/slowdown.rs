//! Slowdown incident detector (spec §4.5): scans historical speed-test, WiFi,
//! and diagnostic samples for degraded-throughput windows and explains why.
//!
//! Grounded on `pattern_recognition.rs`'s windowed-comparison-over-a-series
//! shape and `feedback_loop.rs`'s threshold→factor→recommendation pipeline,
//! generalized from KPI/AB-test drift detection to network-throughput drift
//! detection.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::{
    DiagnosticEvent, Factor, FactorCategory, Incident, IncidentReport, IncidentReportStatus,
    IncidentThresholds, MetricChange, Severity, SpeedTestSample, TracerouteResult, WifiSample,
};

const PRE_WINDOW_MINUTES: i64 = 5;
const RSSI_DROP_SIGNIFICANT_DB: i32 = 10;
const SNR_DROP_SIGNIFICANT_DB: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FactorKey {
    WifiSignalCritical,
    WifiSignalWarning,
    InterferenceCritical,
    InterferenceWarning,
    GatewayWarning,
    InternetWarning,
    CongestionWarning,
}

static RECOMMENDATIONS: Lazy<HashMap<FactorKey, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        FactorKey::WifiSignalCritical,
        "Move closer to the access point or add a repeater; signal dropped sharply before the incident.",
    );
    m.insert(
        FactorKey::WifiSignalWarning,
        "Monitor WiFi signal strength; a moderate RSSI drop preceded this incident.",
    );
    m.insert(
        FactorKey::InterferenceCritical,
        "Check for microwave/Bluetooth co-channel sources or switch to a less congested channel.",
    );
    m.insert(
        FactorKey::InterferenceWarning,
        "Consider a wireless site survey; SNR degraded moderately before the incident.",
    );
    m.insert(
        FactorKey::GatewayWarning,
        "Restart or inspect the gateway/router; a disconnect event was observed.",
    );
    m.insert(
        FactorKey::InternetWarning,
        "Contact the ISP; upstream throughput degraded independent of local WiFi quality.",
    );
    m.insert(
        FactorKey::CongestionWarning,
        "Schedule large transfers outside this window; concurrent usage may be saturating the link.",
    );
    m
});

pub struct SlowdownDetector {
    thresholds: IncidentThresholds,
}

impl SlowdownDetector {
    pub fn new(thresholds: IncidentThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect_incidents(
        &self,
        speed_samples: &[SpeedTestSample],
        wifi_samples: &[WifiSample],
        events: &[DiagnosticEvent],
        traceroutes: &[(DateTime<Utc>, TracerouteResult)],
        window_end: DateTime<Utc>,
    ) -> IncidentReport {
        let mut samples = speed_samples.to_vec();
        samples.sort_by_key(|s| s.timestamp);

        let mut incidents = Vec::new();
        let mut run_start: Option<usize> = None;
        let mut consecutive = 0usize;

        let mut i = 0;
        while i < samples.len() {
            let below = samples[i].download_mbps < self.thresholds.t_down_slow_mbps;
            if below {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                consecutive += 1;
                let is_last = i + 1 == samples.len();
                if consecutive >= self.thresholds.min_consecutive_samples || is_last {
                    // Extend the run until recovery or window end.
                    let mut end_idx = i;
                    while end_idx + 1 < samples.len()
                        && samples[end_idx + 1].download_mbps < self.thresholds.t_down_slow_mbps
                    {
                        end_idx += 1;
                    }
                    let start_idx = run_start.unwrap();
                    if consecutive >= self.thresholds.min_consecutive_samples {
                        let ongoing = end_idx + 1 == samples.len();
                        incidents.push(self.build_incident(
                            &samples,
                            start_idx,
                            end_idx,
                            ongoing,
                            wifi_samples,
                            events,
                            traceroutes,
                        ));
                    }
                    i = end_idx + 1;
                    run_start = None;
                    consecutive = 0;
                    continue;
                }
            } else {
                run_start = None;
                consecutive = 0;
            }
            i += 1;
        }

        let status = if incidents.is_empty() {
            IncidentReportStatus::Healthy
        } else if incidents.iter().any(|inc| inc.end.is_none()) {
            IncidentReportStatus::Degraded
        } else {
            IncidentReportStatus::Slowdowns
        };
        let _ = window_end;

        IncidentReport {
            incidents,
            thresholds: self.thresholds,
            status,
        }
    }

    fn build_incident(
        &self,
        samples: &[SpeedTestSample],
        start_idx: usize,
        end_idx: usize,
        ongoing: bool,
        wifi_samples: &[WifiSample],
        events: &[DiagnosticEvent],
        traceroutes: &[(DateTime<Utc>, TracerouteResult)],
    ) -> Incident {
        let window = &samples[start_idx..=end_idx];
        let start = window.first().unwrap().timestamp;
        let end = if ongoing {
            None
        } else {
            Some(samples.get(end_idx + 1).map(|s| s.timestamp).unwrap_or(start))
        };

        let duration_minutes = end
            .unwrap_or(window.last().unwrap().timestamp)
            .signed_duration_since(start)
            .num_seconds() as f64
            / 60.0;

        let avg_download = avg(window.iter().map(|s| s.download_mbps));
        let avg_upload = avg(window.iter().map(|s| s.upload_mbps));
        let avg_ping = avg(window.iter().map(|s| s.ping_ms));

        let pre_window_start = start - ChronoDuration::minutes(PRE_WINDOW_MINUTES);
        let trigger_factors = self.trigger_factors(pre_window_start, start, wifi_samples, events);

        let in_window_5min_end = start + ChronoDuration::minutes(PRE_WINDOW_MINUTES);
        let metric_changes = self.metric_changes(
            pre_window_start,
            start,
            start,
            in_window_5min_end,
            samples,
            wifi_samples,
        );

        let factors = self.broader_factors(&trigger_factors, &metric_changes, events, pre_window_start, start);
        let recommendations = self.recommend(&factors);

        let traceroute_snapshots: Vec<TracerouteResult> = traceroutes
            .iter()
            .filter(|(ts, _)| *ts >= start && end.map_or(true, |e| *ts <= e))
            .map(|(_, tr)| tr.clone())
            .collect();

        Incident {
            start,
            end,
            duration_minutes,
            avg_download,
            avg_upload,
            avg_ping,
            trigger_factors,
            metric_changes,
            factors,
            recommendations,
            traceroute_snapshots,
        }
    }

    fn trigger_factors(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        wifi_samples: &[WifiSample],
        events: &[DiagnosticEvent],
    ) -> Vec<String> {
        let mut factors = Vec::new();
        let in_window: Vec<&WifiSample> = wifi_samples
            .iter()
            .filter(|s| s.timestamp >= window_start && s.timestamp < window_end)
            .collect();

        if let (Some(first), Some(last)) = (in_window.first(), in_window.last()) {
            let rssi_drop = first.rssi_dbm - last.rssi_dbm;
            if rssi_drop >= RSSI_DROP_SIGNIFICANT_DB {
                factors.push(format!("WiFi RSSI dropped {rssi_drop} dB in the preceding window"));
            }
            if first.channel != last.channel {
                factors.push(format!(
                    "WiFi channel changed from {} to {}",
                    first.channel, last.channel
                ));
            }
            let snr_drop = first.snr_db - last.snr_db;
            if snr_drop >= SNR_DROP_SIGNIFICANT_DB {
                factors.push(format!("WiFi SNR degraded by {snr_drop:.1} dB"));
            }
            if last.connected != first.connected && !last.connected {
                factors.push("WiFi disconnect event observed".to_string());
            }
        }

        for event in events.iter().filter(|e| e.timestamp >= window_start && e.timestamp < window_end) {
            if event.kind == "wifi_disconnect" {
                factors.push(format!("WiFi disconnect event: {}", event.detail));
            }
        }

        factors
    }

    fn metric_changes(
        &self,
        pre_start: DateTime<Utc>,
        pre_end: DateTime<Utc>,
        in_start: DateTime<Utc>,
        in_end: DateTime<Utc>,
        samples: &[SpeedTestSample],
        wifi_samples: &[WifiSample],
    ) -> Vec<MetricChange> {
        let pre_speed: Vec<&SpeedTestSample> = samples
            .iter()
            .filter(|s| s.timestamp >= pre_start && s.timestamp < pre_end)
            .collect();
        let in_speed: Vec<&SpeedTestSample> = samples
            .iter()
            .filter(|s| s.timestamp >= in_start && s.timestamp < in_end)
            .collect();

        let mut changes = Vec::new();
        changes.push(metric_change(
            "download_mbps",
            avg(pre_speed.iter().map(|s| s.download_mbps)),
            avg(in_speed.iter().map(|s| s.download_mbps)),
            1.0,
        ));
        changes.push(metric_change(
            "upload_mbps",
            avg(pre_speed.iter().map(|s| s.upload_mbps)),
            avg(in_speed.iter().map(|s| s.upload_mbps)),
            1.0,
        ));
        changes.push(metric_change(
            "ping_ms",
            avg(pre_speed.iter().map(|s| s.ping_ms)),
            avg(in_speed.iter().map(|s| s.ping_ms)),
            10.0,
        ));

        let pre_wifi: Vec<&WifiSample> = wifi_samples
            .iter()
            .filter(|s| s.timestamp >= pre_start && s.timestamp < pre_end)
            .collect();
        let in_wifi: Vec<&WifiSample> = wifi_samples
            .iter()
            .filter(|s| s.timestamp >= in_start && s.timestamp < in_end)
            .collect();
        changes.push(metric_change(
            "wifi_rssi_dbm",
            avg(pre_wifi.iter().map(|s| s.rssi_dbm as f64)),
            avg(in_wifi.iter().map(|s| s.rssi_dbm as f64)),
            5.0,
        ));

        changes
    }

    fn broader_factors(
        &self,
        trigger_factors: &[String],
        metric_changes: &[MetricChange],
        events: &[DiagnosticEvent],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<Factor> {
        let mut factors = Vec::new();

        let rssi_change = metric_changes.iter().find(|m| m.metric == "wifi_rssi_dbm");
        if let Some(change) = rssi_change {
            if change.significant {
                let drop = change.before - change.after;
                let severity = if drop >= RSSI_DROP_SIGNIFICANT_DB as f64 * 1.5 {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                factors.push(Factor {
                    category: FactorCategory::WifiSignal,
                    severity,
                    description: format!("WiFi signal weakened by {drop:.1} dB"),
                });
            }
        }

        if trigger_factors.iter().any(|f| f.contains("SNR")) {
            factors.push(Factor {
                category: FactorCategory::Interference,
                severity: Severity::Warning,
                description: "Signal-to-noise ratio degraded before the incident".to_string(),
            });
        }

        if events
            .iter()
            .any(|e| e.timestamp >= window_start && e.timestamp < window_end && e.kind == "wifi_disconnect")
        {
            factors.push(Factor {
                category: FactorCategory::Gateway,
                severity: Severity::Warning,
                description: "Gateway/access-point disconnect observed".to_string(),
            });
        }

        let ping_change = metric_changes.iter().find(|m| m.metric == "ping_ms");
        if let Some(change) = ping_change {
            if change.significant && change.after > change.before {
                factors.push(Factor {
                    category: FactorCategory::Internet,
                    severity: Severity::Warning,
                    description: "Latency to upstream increased independent of local signal".to_string(),
                });
            }
        }

        factors
    }

    fn recommend(&self, factors: &[Factor]) -> Vec<String> {
        let mut recs = Vec::new();
        for factor in factors {
            let key = match (factor.category, factor.severity) {
                (FactorCategory::WifiSignal, Severity::Critical) => Some(FactorKey::WifiSignalCritical),
                (FactorCategory::WifiSignal, _) => Some(FactorKey::WifiSignalWarning),
                (FactorCategory::Interference, Severity::Critical) => Some(FactorKey::InterferenceCritical),
                (FactorCategory::Interference, _) => Some(FactorKey::InterferenceWarning),
                (FactorCategory::Gateway, _) => Some(FactorKey::GatewayWarning),
                (FactorCategory::Internet, _) => Some(FactorKey::InternetWarning),
                (FactorCategory::Congestion, _) => Some(FactorKey::CongestionWarning),
                _ => None,
            };
            if let Some(key) = key {
                if let Some(text) = RECOMMENDATIONS.get(&key) {
                    let text = text.to_string();
                    if !recs.contains(&text) {
                        recs.push(text);
                    }
                }
            }
        }
        recs
    }
}

fn avg(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn metric_change(name: &str, before: f64, after: f64, significance_threshold: f64) -> MetricChange {
    MetricChange {
        metric: name.to_string(),
        before,
        after,
        significant: (before - after).abs() >= significance_threshold,
    }
}
