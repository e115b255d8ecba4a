//! Fleet Agent: telemetry loop, command-poll loop, and a local diagnostics
//! HTTP server (spec §4.2-§4.8).

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use fleet_collectors::{ProcessMonitor, SmartCollector, SortBy, SystemCollector};
use fleet_commands::{Command, CommandAction, CommandResult};
use fleet_crypto::EncryptionKey;
use fleet_diagnostics::{
    DiagnosticEvent, IncidentThresholds, LinkProbe, LinuxLinkProbe, OsiProbe, SlowdownDetector,
    SpeedTestSample, Tracer, TracerouteResult, WifiSample,
};
use fleet_core::{Platform, PlatformConfig, ServiceRegistration};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,
}

const HISTORY_CAPACITY: usize = 24 * 60;
const NETWORK_SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

/// History of samples the slowdown detector reasons over. Nothing here is
/// durable — an agent restart starts with an empty window, same as a fresh
/// install (spec §4.5: "derived, not stored raw").
struct NetworkHistory {
    speed: Mutex<VecDeque<SpeedTestSample>>,
    wifi: Mutex<VecDeque<WifiSample>>,
    events: Mutex<VecDeque<DiagnosticEvent>>,
    traceroutes: Mutex<VecDeque<(chrono::DateTime<Utc>, TracerouteResult)>>,
    thresholds: RwLock<IncidentThresholds>,
}

impl NetworkHistory {
    fn new() -> Self {
        Self {
            speed: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            wifi: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            events: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            traceroutes: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            thresholds: RwLock::new(IncidentThresholds::default()),
        }
    }

    async fn push_speed(&self, sample: SpeedTestSample) {
        let mut buf = self.speed.lock().await;
        if buf.len() == HISTORY_CAPACITY {
            buf.pop_front();
        }
        buf.push_back(sample);
    }

    async fn push_wifi(&self, sample: WifiSample) {
        let mut buf = self.wifi.lock().await;
        if buf.len() == HISTORY_CAPACITY {
            buf.pop_front();
        }
        buf.push_back(sample);
    }
}

struct AgentState {
    client: reqwest::Client,
    server_url: String,
    api_key: Option<String>,
    machine_id: String,
    encryption_key: RwLock<Option<EncryptionKey>>,
    system: Arc<SystemCollector>,
    processes: Arc<ProcessMonitor>,
    smart: Arc<SmartCollector>,
    osi: Arc<OsiProbe>,
    tracer: Arc<Tracer>,
    history: Arc<NetworkHistory>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = PlatformConfig::load_from_path(args.config.clone()).context("loading configuration")?;

    let machine_id = config
        .agent
        .machine_id
        .clone()
        .unwrap_or_else(fleet_core::utils::generate_id);

    let encryption_key = config
        .agent
        .encryption_key
        .as_deref()
        .map(EncryptionKey::from_base64)
        .transpose()
        .context("invalid agent.encryption_key")?;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.agent.verify_ssl)
        .build()
        .context("building HTTP client")?;

    let state = Arc::new(AgentState {
        client,
        server_url: config.agent.server_url.clone(),
        api_key: config.agent.api_key.clone(),
        machine_id,
        encryption_key: RwLock::new(encryption_key),
        system: Arc::new(SystemCollector::new()),
        processes: Arc::new(ProcessMonitor::new()),
        smart: Arc::new(SmartCollector::new()),
        osi: Arc::new(OsiProbe::new(Arc::new(LinuxLinkProbe))),
        tracer: Arc::new(Tracer::new()),
        history: Arc::new(NetworkHistory::new()),
    });

    let mut platform = Platform::new(config.clone());
    platform.register_service(telemetry_loop_service(state.clone(), config.agent.report_interval_secs));
    platform.register_service(command_poll_service(state.clone(), config.agent.command_poll_interval_secs));
    platform.register_service(network_history_service(state.clone()));
    platform.register_service(diagnostics_server_service(state.clone(), config.agent.diagnostics_bind_addr.clone()));

    let runtime = platform.start().await?;

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("agent shutting down");
    runtime.shutdown().await
}

fn telemetry_loop_service(state: Arc<AgentState>, interval_secs: u64) -> ServiceRegistration {
    ServiceRegistration::new(
        "telemetry-loop",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            tokio::spawn(async move {
                let info = state.system.machine_info(state.machine_id.clone()).await;
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
                let mut first = true;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let sample = state.system.collect().await;
                            let payload = fleet_aggregator::ReportPayload {
                                info: if first { Some(info.clone()) } else { None },
                                sample,
                            };
                            first = false;

                            if let Err(err) = send_report(&state, &payload).await {
                                warn!(%err, "telemetry report failed, will retry next interval");
                            }
                        }
                    }
                }
                Ok(())
            })
        }),
    )
}

async fn send_report(state: &AgentState, payload: &fleet_aggregator::ReportPayload) -> Result<()> {
    let plaintext = serde_json::to_vec(payload)?;
    let key = state.encryption_key.read().await;
    let sealed = fleet_crypto::seal_payload(&plaintext, key.as_ref())?;
    drop(key);

    let url = format!("{}/fleet/report", state.server_url);
    let mut request = state
        .client
        .post(&url)
        .header("X-Machine-Id", state.machine_id.clone())
        .body(sealed);
    if let Some(api_key) = &state.api_key {
        request = request.header("X-API-Key", api_key.clone());
    }

    let response = request.send().await?;
    match response.status() {
        status if status.is_success() => Ok(()),
        status if status.as_u16() == 401 || status.as_u16() == 403 => {
            error!(%status, "server rejected agent credentials");
            Ok(())
        }
        status => {
            warn!(%status, "server rejected telemetry report");
            Ok(())
        }
    }
}

fn command_poll_service(state: Arc<AgentState>, interval_secs: u64) -> ServiceRegistration {
    ServiceRegistration::new(
        "command-poll-loop",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(err) = poll_and_execute(&state).await {
                                warn!(%err, "command poll failed, will retry next interval");
                            }
                        }
                    }
                }
                Ok(())
            })
        }),
    )
}

async fn poll_and_execute(state: &AgentState) -> Result<()> {
    let url = format!("{}/fleet/commands/{}", state.server_url, state.machine_id);
    let mut request = state.client.get(&url);
    if let Some(api_key) = &state.api_key {
        request = request.header("X-API-Key", api_key.clone());
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Ok(());
    }

    let command: Option<Command> = response.json().await.unwrap_or(None);
    let Some(command) = command else {
        return Ok(());
    };

    let result = execute_command(state, &command.action).await;

    let url = format!("{}/fleet/commands/{}/result", state.server_url, command.command_id);
    let mut request = state.client.post(&url).json(&result);
    if let Some(api_key) = &state.api_key {
        request = request.header("X-API-Key", api_key.clone());
    }
    request.send().await?;
    Ok(())
}

async fn execute_command(state: &AgentState, action: &CommandAction) -> CommandResult {
    match action {
        CommandAction::RestartAgent => {
            info!("restart_agent command received, exiting for supervisor restart");
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                std::process::exit(0);
            });
            CommandResult {
                success: true,
                message: "agent restarting".to_string(),
                data: None,
            }
        }
        CommandAction::ClearDnsCache => clear_dns_cache().await,
        CommandAction::KillProcess { pid } => match state.processes.kill(*pid).await {
            Ok(result) => CommandResult {
                success: result.success,
                message: result.message,
                data: None,
            },
            Err(err) => CommandResult {
                success: false,
                message: err.to_string(),
                data: None,
            },
        },
        CommandAction::RotateEncryptionKey { sealed_new_key } => rotate_encryption_key(state, sealed_new_key).await,
    }
}

async fn clear_dns_cache() -> CommandResult {
    let output = tokio::process::Command::new("resolvectl")
        .arg("flush-caches")
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => CommandResult {
            success: true,
            message: "DNS cache flushed".to_string(),
            data: None,
        },
        Ok(out) => CommandResult {
            success: false,
            message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            data: None,
        },
        Err(err) => CommandResult {
            success: false,
            message: err.to_string(),
            data: None,
        },
    }
}

async fn rotate_encryption_key(state: &AgentState, sealed_new_key: &str) -> CommandResult {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let opened = async {
        let sealed = STANDARD.decode(sealed_new_key).map_err(|e| e.to_string())?;
        let current = state.encryption_key.read().await;
        let (plaintext, _via) =
            fleet_crypto::open(&sealed, current.as_ref(), None).map_err(|e| e.to_string())?;
        Ok::<Vec<u8>, String>(plaintext)
    }
    .await;

    match opened {
        Ok(plaintext) => {
            let key_b64 = String::from_utf8_lossy(&plaintext).to_string();
            match EncryptionKey::from_base64(key_b64.trim()) {
                Ok(new_key) => {
                    *state.encryption_key.write().await = Some(new_key);
                    info!("encryption key rotated");
                    CommandResult {
                        success: true,
                        message: "encryption key rotated".to_string(),
                        data: None,
                    }
                }
                Err(err) => CommandResult {
                    success: false,
                    message: err.to_string(),
                    data: None,
                },
            }
        }
        Err(err) => CommandResult {
            success: false,
            message: err,
            data: None,
        },
    }
}

fn network_history_service(state: Arc<AgentState>) -> ServiceRegistration {
    ServiceRegistration::new(
        "network-history-sampler",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            tokio::spawn(async move {
                let link_probe = LinuxLinkProbe;
                let mut ticker = tokio::time::interval(NETWORK_SAMPLE_INTERVAL);
                let mut last_bytes: Option<(u64, u64, std::time::Instant)> = None;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let sample = state.system.collect().await;
                            if let Some(network) = &sample.network {
                                let now = std::time::Instant::now();
                                if let Some((prev_down, prev_up, prev_at)) = last_bytes {
                                    let elapsed = now.duration_since(prev_at).as_secs_f64().max(1.0);
                                    let down_mbps = (network.bytes_received.saturating_sub(prev_down) as f64 * 8.0)
                                        / elapsed
                                        / 1_000_000.0;
                                    let up_mbps = (network.bytes_sent.saturating_sub(prev_up) as f64 * 8.0)
                                        / elapsed
                                        / 1_000_000.0;
                                    state.history.push_speed(SpeedTestSample {
                                        timestamp: Utc::now(),
                                        download_mbps: down_mbps,
                                        upload_mbps: up_mbps,
                                        ping_ms: 0.0,
                                    }).await;
                                }
                                last_bytes = Some((network.bytes_received, network.bytes_sent, now));
                            }

                            let link = link_probe.probe("eth0").await;
                            state.history.push_wifi(WifiSample {
                                timestamp: Utc::now(),
                                rssi_dbm: link.wifi_rssi_dbm.unwrap_or(0),
                                channel: 0,
                                snr_db: 0.0,
                                connected: link.link_up.unwrap_or(false),
                            }).await;
                        }
                    }
                }
                Ok(())
            })
        }),
    )
}

fn diagnostics_server_service(state: Arc<AgentState>, bind_addr: String) -> ServiceRegistration {
    ServiceRegistration::new(
        "diagnostics-server",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            let bind_addr = bind_addr.clone();
            tokio::spawn(async move {
                let addr: SocketAddr = bind_addr.parse().context("invalid diagnostics_bind_addr")?;
                let app = Router::new()
                    .route("/api/osi-layers", get(osi_layers))
                    .route("/api/osi-layers/test", post(osi_layers_test))
                    .route("/api/osi-layers/custom-scan", post(osi_custom_scan))
                    .route("/api/traceroute", get(traceroute_handler))
                    .route("/api/network/analysis", get(network_analysis))
                    .route("/api/network/analysis/settings", post(network_analysis_settings))
                    .route("/api/processes", get(processes_handler))
                    .route("/api/processes/kill/:pid", post(kill_process_handler))
                    .route("/api/processes/problematic", get(problematic_processes))
                    .route("/api/system/comprehensive", get(system_comprehensive))
                    .with_state(state);

                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!(%addr, "diagnostics server listening");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await?;
                Ok(())
            })
        }),
    )
}

async fn osi_layers(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    Json(state.osi.run().await)
}

async fn osi_layers_test(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    Json(state.osi.run().await)
}

async fn osi_custom_scan(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<fleet_diagnostics::CustomScanRequest>,
) -> impl IntoResponse {
    Json(state.osi.run_custom(request).await)
}

#[derive(Deserialize)]
struct TracerouteQuery {
    target: String,
    count: Option<u8>,
}

async fn traceroute_handler(
    State(state): State<Arc<AgentState>>,
    Query(query): Query<TracerouteQuery>,
) -> impl IntoResponse {
    let count = query.count.unwrap_or(fleet_diagnostics::traceroute::DEFAULT_COUNT);
    match state.tracer.trace(&query.target, count).await {
        Ok(result) => {
            state
                .history
                .traceroutes
                .lock()
                .await
                .push_back((Utc::now(), result.clone()));
            Json(json!(result)).into_response()
        }
        Err(err) => {
            (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response()
        }
    }
}

#[derive(Deserialize)]
struct NetworkAnalysisQuery {
    hours: Option<i64>,
}

async fn network_analysis(
    State(state): State<Arc<AgentState>>,
    Query(query): Query<NetworkAnalysisQuery>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(1).max(1);
    let window_end = Utc::now();
    let window_start = window_end - chrono::Duration::hours(hours);

    let speed: Vec<SpeedTestSample> = state
        .history
        .speed
        .lock()
        .await
        .iter()
        .filter(|s| s.timestamp >= window_start)
        .cloned()
        .collect();
    let wifi: Vec<WifiSample> = state
        .history
        .wifi
        .lock()
        .await
        .iter()
        .filter(|s| s.timestamp >= window_start)
        .cloned()
        .collect();
    let events: Vec<DiagnosticEvent> = state
        .history
        .events
        .lock()
        .await
        .iter()
        .filter(|e| e.timestamp >= window_start)
        .cloned()
        .collect();
    let traceroutes: Vec<(chrono::DateTime<Utc>, TracerouteResult)> = state
        .history
        .traceroutes
        .lock()
        .await
        .iter()
        .filter(|(ts, _)| *ts >= window_start)
        .cloned()
        .collect();

    let thresholds = *state.history.thresholds.read().await;
    let detector = SlowdownDetector::new(thresholds);
    let report = detector.detect_incidents(&speed, &wifi, &events, &traceroutes, window_end);
    Json(report)
}

async fn network_analysis_settings(
    State(state): State<Arc<AgentState>>,
    Json(thresholds): Json<IncidentThresholds>,
) -> impl IntoResponse {
    *state.history.thresholds.write().await = thresholds;
    Json(json!({ "accepted": true }))
}

#[derive(Deserialize)]
struct ProcessesQuery {
    sort: Option<String>,
    limit: Option<usize>,
}

async fn processes_handler(
    State(state): State<Arc<AgentState>>,
    Query(query): Query<ProcessesQuery>,
) -> impl IntoResponse {
    let sort_by = match query.sort.as_deref() {
        Some("memory") => SortBy::Memory,
        _ => SortBy::Cpu,
    };
    let limit = query.limit.unwrap_or(50);
    Json(state.processes.top(sort_by, limit).await)
}

async fn kill_process_handler(
    State(state): State<Arc<AgentState>>,
    AxumPath(pid): AxumPath<u32>,
) -> impl IntoResponse {
    match state.processes.kill(pid).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

async fn problematic_processes(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    Json(state.processes.problematic().await)
}

async fn system_comprehensive(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    let sample = state.system.collect().await;
    let info = state.system.machine_info(state.machine_id.clone()).await;
    let smart = state.smart.collect("/dev/sda").await;
    Json(json!({
        "machine": info,
        "sample": sample,
        "smart": smart,
    }))
}
