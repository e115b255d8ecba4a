//! Fleet Server: the Agent→Server and Operator→Server HTTP surfaces plus the
//! background janitor (spec §4.9, §5, §6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, Path as AxumPath, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use fleet_aggregator::{Aggregator, KeyLookup};
use fleet_commands::{CommandAction, CommandResult, KeyRotationTracker, RotationStatus};
use fleet_core::{Platform, PlatformConfig, ServiceRegistration};
use fleet_crypto::{EncryptionKey, OpenedWith};
use fleet_packager::{BuildSpec, PackageBuilder, PackagerError};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,
}

/// Bridges the aggregator's read-only `KeyLookup` trait to the mutable
/// rotation bookkeeping in `fleet-commands::KeyRotationTracker`.
struct TrackerKeyLookup(Arc<KeyRotationTracker>);

impl KeyLookup for TrackerKeyLookup {
    fn keys_for(&self, machine_id: &str) -> (Option<EncryptionKey>, Option<EncryptionKey>) {
        (self.0.current_key(machine_id), self.0.previous_key(machine_id))
    }

    fn note_opened(&self, machine_id: &str, via: OpenedWith) {
        if via == OpenedWith::Current {
            self.0.confirm(&machine_id.to_string());
        }
    }
}

struct ServerState {
    aggregator: Aggregator,
    tracker: Arc<KeyRotationTracker>,
    command_exec_timeout: Duration,
    rotation_timeout: Duration,
    agent_api_key: Option<String>,
    admin_jwt_secret: Option<String>,
    rate_limiter: Arc<fleet_core::rate_limiting::RateLimiter>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = PlatformConfig::load_from_path(args.config.clone()).context("loading configuration")?;

    let store = Arc::new(
        fleet_aggregator::SqlxStore::connect(&config.server.database_url)
            .await
            .context("connecting to storage backend")?,
    );
    let tracker = Arc::new(KeyRotationTracker::new());
    let aggregator = Aggregator::restore(
        store.clone(),
        store.clone(),
        store,
        Arc::new(TrackerKeyLookup(tracker.clone())),
    )
    .await
    .context("restoring aggregator state")?;

    let rate_limiter = Arc::new(fleet_core::rate_limiting::RateLimiter::from_settings(&config.rate_limiting));

    let state = Arc::new(ServerState {
        aggregator,
        tracker,
        command_exec_timeout: Duration::from_secs(config.server.command_exec_timeout_secs),
        rotation_timeout: Duration::from_secs(config.server.rotation_timeout_secs.max(0) as u64),
        agent_api_key: config.server.agent_api_key.clone(),
        admin_jwt_secret: config.server.admin_jwt_secret.clone(),
        rate_limiter,
    });

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;

    let mut platform = Platform::new(config.clone());
    platform.register_service(http_server_service(
        state.clone(),
        config.server.bind_addr.clone(),
        prometheus_handle,
    ));
    platform.register_service(janitor_service(
        state.clone(),
        Duration::from_secs(config.server.janitor_interval_secs),
        chrono::Duration::days(config.server.sample_retention_days),
    ));

    let runtime = platform.start().await?;
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("server shutting down");
    runtime.shutdown().await
}

fn http_server_service(
    state: Arc<ServerState>,
    bind_addr: String,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> ServiceRegistration {
    ServiceRegistration::new(
        "http-server",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            let bind_addr = bind_addr.clone();
            let prometheus_handle = prometheus_handle.clone();
            tokio::spawn(async move {
                let addr: std::net::SocketAddr = bind_addr.parse().context("invalid server.bind_addr")?;

                let agent_routes = Router::new()
                    .route("/report", post(agent_report))
                    .route("/commands/:machine_id", get(agent_next_command))
                    .route("/commands/:command_id/result", post(agent_report_result))
                    .route_layer(middleware::from_fn_with_state(state.clone(), require_agent_api_key));

                let operator_routes = Router::new()
                    .route("/machines", get(operator_machines))
                    .route("/machine/:id", get(operator_machine_detail))
                    .route("/command/:machine_id", post(operator_enqueue_command))
                    .route("/recent-commands/:machine_id", get(operator_recent_commands))
                    .route("/rotate-encryption-key", post(operator_rotate_key))
                    .route("/key-rotation-status", get(operator_rotation_status))
                    .route("/build-agent-package", post(operator_build_agent_package))
                    .route("/build-standalone-package", post(operator_build_standalone_package))
                    .route("/build-cluster-package", post(operator_build_cluster_package))
                    .route_layer(middleware::from_fn_with_state(state.clone(), operator_auth_and_rate_limit));

                let app = Router::new()
                    .nest("/fleet", agent_routes)
                    .nest("/api/fleet", operator_routes)
                    .route("/metrics", get(move || async move { prometheus_handle.render() }))
                    .with_state(state);

                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!(%addr, "fleet server listening");
                axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await?;
                Ok(())
            })
        }),
    )
}

fn janitor_service(
    state: Arc<ServerState>,
    interval: Duration,
    sample_retention: chrono::Duration,
) -> ServiceRegistration {
    ServiceRegistration::new(
        "janitor",
        Arc::new(move |_ctx, token: CancellationToken| {
            let state = state.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(err) = state.aggregator.expire_stale_commands(state.command_exec_timeout).await {
                                warn!(%err, "janitor: command expiry failed");
                            }
                            if let Err(err) = state.aggregator.prune_samples(sample_retention).await {
                                warn!(%err, "janitor: sample pruning failed");
                            }
                            let rolled_back = state.tracker.expire_unacknowledged(state.rotation_timeout);
                            if rolled_back > 0 {
                                info!(rolled_back, "janitor: rolled back unacknowledged key rotations");
                            }
                        }
                    }
                }
                Ok(())
            })
        }),
    )
}

/// Constant-time equality so a mismatching `X-API-Key` can't be brute-forced
/// via response-timing (spec §7's auth error kind is rejection, not a leak).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn require_agent_api_key(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    if let Some(expected) = &state.agent_api_key {
        let presented = headers.get("X-API-Key").and_then(|v| v.to_str().ok()).unwrap_or("");
        if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            warn!("agent request rejected: invalid or missing X-API-Key");
            return (axum::http::StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid api key" }))).into_response();
        }
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct AdminClaims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// The operator identity attached to a request once the bearer token (if
/// any) verifies, consumed by handlers that write to the audit log.
#[derive(Clone)]
struct AdminIdentity(String);

async fn operator_auth_and_rate_limit(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let mut identity = AdminIdentity("anonymous".to_string());

    if let Some(secret) = &state.admin_jwt_secret {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let Some(token) = token else {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing bearer token" }))).into_response();
        };
        let decoded = jsonwebtoken::decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        );
        match decoded {
            Ok(data) => identity = AdminIdentity(data.claims.sub),
            Err(_) => {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid bearer token" }))).into_response();
            }
        }
    }

    let endpoint = request.uri().path().to_string();
    if let Err(err) = state.rate_limiter.check_rate_limit(addr.ip(), &endpoint) {
        warn!(%err, client = %addr.ip(), endpoint, "operator request rate-limited");
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": err.to_string() }))).into_response();
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn audit_admin_action(identity: &AdminIdentity, action: &str, target: &str, client_ip: SocketAddr) {
    if let Err(err) =
        fleet_core::audit_logging::get_audit_logger().log_admin_action(&identity.0, action, target, Some(client_ip.ip().to_string()))
    {
        warn!(%err, action, target, "failed to write audit log entry");
    }
}

async fn agent_report(
    State(state): State<Arc<ServerState>>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    let Some(machine_id) = headers.get("X-Machine-Id").and_then(|v| v.to_str().ok()) else {
        return (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": "missing X-Machine-Id header" })))
            .into_response();
    };

    match state.aggregator.on_report(machine_id, &body).await {
        Ok(ack) => {
            metrics::counter!("fleet_reports_ingested_total").increment(1);
            Json(ack).into_response()
        }
        Err(err) => {
            warn!(%err, machine_id, "failed to ingest report");
            (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn operator_machines(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.aggregator.list_machines())
}

async fn operator_machine_detail(
    State(state): State<Arc<ServerState>>,
    AxumPath(id): AxumPath<String>,
) -> axum::response::Response {
    match state.aggregator.get_machine(&id) {
        Ok(detail) => Json(detail).into_response(),
        Err(err) => (axum::http::StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

#[derive(Deserialize)]
struct EnqueueCommandRequest {
    action: String,
    #[serde(default)]
    params: serde_json::Value,
}

async fn operator_enqueue_command(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::Extension(identity): axum::Extension<AdminIdentity>,
    AxumPath(machine_id): AxumPath<String>,
    Json(request): Json<EnqueueCommandRequest>,
) -> axum::response::Response {
    let action = match parse_action(&request.action, &request.params) {
        Ok(action) => action,
        Err(err) => {
            return (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response();
        }
    };

    match state.aggregator.enqueue_command(&machine_id, action).await {
        Ok(command_id) => {
            audit_admin_action(&identity, &request.action, &format!("machine:{machine_id}"), addr);
            Json(json!({ "command_id": command_id })).into_response()
        }
        Err(err) => (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

fn parse_action(name: &str, params: &serde_json::Value) -> Result<CommandAction, String> {
    match name {
        "restart_agent" => Ok(CommandAction::RestartAgent),
        "clear_dns_cache" => Ok(CommandAction::ClearDnsCache),
        "kill_process" => {
            let pid = params.get("pid").and_then(|v| v.as_u64()).ok_or("missing pid")? as u32;
            Ok(CommandAction::KillProcess { pid })
        }
        "rotate_encryption_key" => {
            let sealed_new_key = params
                .get("sealed_new_key")
                .and_then(|v| v.as_str())
                .ok_or("missing sealed_new_key")?
                .to_string();
            Ok(CommandAction::RotateEncryptionKey { sealed_new_key })
        }
        other => Err(format!("unsupported action {other}")),
    }
}

async fn operator_recent_commands(
    State(state): State<Arc<ServerState>>,
    AxumPath(machine_id): AxumPath<String>,
) -> impl IntoResponse {
    Json(json!({ "commands": state.aggregator.recent_commands(&machine_id).await }))
}

#[derive(Deserialize)]
struct RotateKeyRequest {
    #[allow(dead_code)]
    password: String,
}

async fn operator_rotate_key(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::Extension(identity): axum::Extension<AdminIdentity>,
    Json(_request): Json<RotateKeyRequest>,
) -> impl IntoResponse {
    let machines = state.aggregator.list_machines();
    let mut agents_queued = 0u32;

    for machine in machines {
        let old_key = state.tracker.current_key(&machine.machine_id);
        let new_key = EncryptionKey::generate();
        let sealed = match fleet_crypto::seal_payload(new_key.to_base64().as_bytes(), old_key.as_ref()) {
            Ok(sealed) => sealed,
            Err(err) => {
                warn!(%err, machine_id = %machine.machine_id, "failed to seal rotation key");
                continue;
            }
        };

        state.tracker.begin_rotation(&machine.machine_id, new_key);

        let action = CommandAction::RotateEncryptionKey {
            sealed_new_key: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sealed),
        };
        if state.aggregator.enqueue_command(&machine.machine_id, action).await.is_ok() {
            agents_queued += 1;
        }
    }

    audit_admin_action(&identity, "rotate_encryption_key", "fleet", addr);
    Json(json!({ "agents_queued": agents_queued }))
}

async fn operator_rotation_status(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let rotations: Vec<serde_json::Value> = state
        .tracker
        .all_records()
        .into_iter()
        .map(|record| {
            let hostname = state
                .aggregator
                .get_machine(&record.machine_id)
                .map(|detail| detail.info.hostname)
                .unwrap_or_default();
            json!({
                "machine_id": record.machine_id,
                "hostname": hostname,
                "status": status_str(record.status),
                "executed_at": record.completed_at,
            })
        })
        .collect();
    Json(json!({ "rotations": rotations }))
}

fn status_str(status: RotationStatus) -> &'static str {
    match status {
        RotationStatus::Pending => "pending",
        RotationStatus::Completed => "completed",
        RotationStatus::Failed => "failed",
    }
}

async fn operator_build_agent_package(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::Extension(identity): axum::Extension<AdminIdentity>,
    Json(spec): Json<BuildSpec>,
) -> axum::response::Response {
    build_package_response(&identity, addr, "build-agent-package", spec)
}

async fn operator_build_standalone_package(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::Extension(identity): axum::Extension<AdminIdentity>,
    Json(spec): Json<BuildSpec>,
) -> axum::response::Response {
    build_package_response(&identity, addr, "build-standalone-package", spec)
}

async fn operator_build_cluster_package(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::Extension(identity): axum::Extension<AdminIdentity>,
    Json(spec): Json<BuildSpec>,
) -> axum::response::Response {
    build_package_response(&identity, addr, "build-cluster-package", spec)
}

fn build_package_response(
    identity: &AdminIdentity,
    addr: SocketAddr,
    action: &str,
    spec: BuildSpec,
) -> axum::response::Response {
    match PackageBuilder::new().build(&spec) {
        Ok(bytes) => {
            audit_admin_action(identity, action, "package", addr);
            (axum::http::StatusCode::OK, bytes).into_response()
        }
        Err(PackagerError::MissingCredentials | PackagerError::UnexpectedCredentials) => {
            (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid package spec" }))).into_response()
        }
        Err(err) => {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn agent_next_command(
    State(state): State<Arc<ServerState>>,
    AxumPath(machine_id): AxumPath<String>,
) -> impl IntoResponse {
    match state.aggregator.next_command(&machine_id).await {
        Ok(Some(command)) => Json(Some(command)).into_response(),
        Ok(None) => Json(serde_json::Value::Null).into_response(),
        Err(err) => (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

async fn agent_report_result(
    State(state): State<Arc<ServerState>>,
    AxumPath(command_id): AxumPath<Uuid>,
    Json(result): Json<CommandResult>,
) -> impl IntoResponse {
    match state.aggregator.report_command_result(command_id, result).await {
        Ok(()) => Json(json!({ "accepted": true })).into_response(),
        Err(err) => (axum::http::StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}
