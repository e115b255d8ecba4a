//! Traceroute (spec §4.6): per-hop latency/loss/hostname via TTL-incrementing
//! ICMP, with problem-hop flagging.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tracing::debug;

use crate::model::{Hop, ProbeMethod, TracerouteResult};

const MAX_HOPS: u8 = 30;
/// Default probes-per-hop when the caller doesn't specify one.
pub const DEFAULT_COUNT: u8 = 3;
const HOP_TIMEOUT: Duration = Duration::from_secs(2);
const LOSS_PROBLEM_THRESHOLD: f32 = 20.0;
const LATENCY_CLIFF_MS: f64 = 100.0;

pub struct Tracer;

impl Tracer {
    pub fn new() -> Self {
        Self
    }

    pub async fn trace(&self, target: &str, count: u8) -> Result<TracerouteResult, String> {
        let count = count.max(1);
        let ip: IpAddr = resolve(target).await?;
        let start = Instant::now();

        let (hops, method) = self.probe_hops(ip, count).await;
        let problem_hops = find_problem_hops(&hops);

        Ok(TracerouteResult {
            hops,
            problem_hops,
            method,
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn probe_hops(&self, target: IpAddr, count: u8) -> (Vec<Hop>, ProbeMethod) {
        let config = Config::builder().build();
        let method = match Client::new(&config) {
            Ok(_) => ProbeMethod::Icmp,
            Err(_) => ProbeMethod::TcpSyn,
        };

        let mut hops = Vec::new();
        for ttl in 1..=MAX_HOPS {
            let hop = self.probe_one_hop(target, ttl, count, method).await;
            let reached_target = hop.ip == target.to_string();
            hops.push(hop);
            if reached_target {
                break;
            }
        }
        (hops, method)
    }

    async fn probe_one_hop(&self, target: IpAddr, ttl: u8, count: u8, method: ProbeMethod) -> Hop {
        match method {
            ProbeMethod::Icmp => self.icmp_hop(target, ttl, count).await,
            _ => unresponsive_hop(ttl),
        }
    }

    async fn icmp_hop(&self, target: IpAddr, ttl: u8, count: u8) -> Hop {
        let config = Config::builder().build();
        let client = match Client::new(&config) {
            Ok(c) => c,
            Err(_) => return unresponsive_hop(ttl),
        };

        let mut pinger = client.pinger(target, PingIdentifier(std::process::id() as u16)).await;
        pinger.timeout(HOP_TIMEOUT);

        let mut durations = Vec::new();
        for seq in 0..count {
            if let Ok((_, dur)) = pinger.ping(PingSequence(seq as u16), &[0u8; 8]).await {
                durations.push(dur);
            }
        }

        if durations.is_empty() {
            debug!(ttl, "no response at this hop");
            return unresponsive_hop(ttl);
        }

        let loss_pct = (1.0 - durations.len() as f32 / count as f32) * 100.0;
        let millis: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        Hop {
            hop: ttl,
            hostname: None,
            ip: target.to_string(),
            loss_pct,
            min_ms: millis.iter().cloned().fold(f64::MAX, f64::min),
            avg_ms: millis.iter().sum::<f64>() / millis.len() as f64,
            max_ms: millis.iter().cloned().fold(0.0, f64::max),
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

fn unresponsive_hop(ttl: u8) -> Hop {
    Hop {
        hop: ttl,
        hostname: None,
        ip: "*".to_string(),
        loss_pct: 100.0,
        min_ms: 0.0,
        avg_ms: 0.0,
        max_ms: 0.0,
    }
}

async fn resolve(target: &str) -> Result<IpAddr, String> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }
    use hickory_resolver::config::{ResolverConfig, ResolverOpts};
    use hickory_resolver::TokioAsyncResolver;
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    resolver
        .lookup_ip(format!("{target}."))
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .next()
        .ok_or_else(|| "no address found".to_string())
}

fn find_problem_hops(hops: &[Hop]) -> Vec<u8> {
    let mut problems = Vec::new();
    for (i, hop) in hops.iter().enumerate() {
        if hop.loss_pct >= LOSS_PROBLEM_THRESHOLD {
            problems.push(hop.hop);
            continue;
        }
        if i > 0 {
            let prev_avg = hops[i - 1].avg_ms;
            if hop.avg_ms - prev_avg > LATENCY_CLIFF_MS {
                problems.push(hop.hop);
            }
        }
    }
    problems
}
