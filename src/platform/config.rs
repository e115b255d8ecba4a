use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "configs/platform.toml";

/// Ambient + domain configuration for both binaries (spec §6's "Configuration
/// (agent)" table plus the server-side thresholds §4.9/§5 name). Each binary
/// reads the sections relevant to it; the layering itself — file, then
/// `FLEET__`-prefixed env vars — is shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub metadata: MetadataSettings,
    pub observability: ObservabilitySettings,
    pub audit: AuditSettings,
    pub rate_limiting: RateLimitingSettings,
    pub agent: AgentSettings,
    pub server: ServerSettings,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            metadata: MetadataSettings::default(),
            observability: ObservabilitySettings::default(),
            audit: AuditSettings::default(),
            rate_limiting: RateLimitingSettings::default(),
            agent: AgentSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl PlatformConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(PathBuf::from(DEFAULT_CONFIG_PATH))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_ref())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix("FLEET").separator("__"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .context("invalid platform configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub name: String,
    pub environment: String,
    pub cluster: String,
    pub node: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            name: "fleet-platform".to_string(),
            environment: "development".to_string(),
            cluster: "local".to_string(),
            node: "node-0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub metrics_port: u16,
    pub enable_metrics: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: 9090,
            enable_metrics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub log_path: String,
    pub retention_days: u32,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_path: "logs/audit.log".to_string(),
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingSettings {
    pub default: RateLimitRule,
    pub endpoints: HashMap<String, RateLimitRule>,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            default: RateLimitRule::default(),
            endpoints: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitRule {
    pub requests: u32,
    pub window_seconds: u64,
    pub burst: u32,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            requests: 1000,
            window_seconds: 60,
            burst: 100,
        }
    }
}

/// Recognized agent configuration keys (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub server_url: String,
    pub api_key: Option<String>,
    pub encryption_key: Option<String>,
    pub machine_id: Option<String>,
    pub report_interval_secs: u64,
    pub command_poll_interval_secs: u64,
    pub verify_ssl: bool,
    pub diagnostics_bind_addr: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            server_url: "https://localhost:8443".to_string(),
            api_key: None,
            encryption_key: None,
            machine_id: None,
            report_interval_secs: 10,
            command_poll_interval_secs: 30,
            verify_ssl: true,
            diagnostics_bind_addr: "127.0.0.1:8765".to_string(),
        }
    }
}

/// Server-side thresholds and storage location (spec §4.9, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub database_url: String,
    pub online_threshold_secs: i64,
    pub warning_threshold_secs: i64,
    pub command_exec_timeout_secs: u64,
    pub reorder_tolerance_secs: i64,
    pub rotation_timeout_secs: i64,
    pub sample_retention_days: i64,
    pub janitor_interval_secs: u64,
    /// Shared secret agents present via `X-API-Key` on the `/fleet/*`
    /// surface. `None` disables the check (local development only).
    pub agent_api_key: Option<String>,
    /// HS256 secret used to verify operator bearer tokens on `/api/fleet/*`.
    /// Issuing tokens (the login page) is out of scope here; this is only
    /// the verification half. `None` disables the check.
    pub admin_jwt_secret: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8443".to_string(),
            database_url: "sqlite://fleet.db".to_string(),
            online_threshold_secs: 30,
            warning_threshold_secs: 300,
            command_exec_timeout_secs: 300,
            reorder_tolerance_secs: 60,
            rotation_timeout_secs: 300,
            sample_retention_days: 7,
            janitor_interval_secs: 60,
            agent_api_key: None,
            admin_jwt_secret: None,
        }
    }
}
