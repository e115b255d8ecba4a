//! Durable storage behind the in-memory snapshot map (ambient stack; spec §6
//! "a server restart must preserve commands and at least the latest snapshot
//! per machine"). `sqlx` against SQLite for local/dev use — the same
//! `runtime-tokio-rustls` feature set the teacher's `Cargo.toml` already
//! carries also reaches Postgres, but this module's queries target SQLite,
//! the backend this crate actually runs and is tested against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_collectors::{MachineInfo, MetricSample};
use fleet_commands::{Command, CommandAction, CommandResult, CommandStatus, MachineId};
use sqlx::{Row, SqlitePool};

use crate::error::AggregatorError;
use crate::model::Machine;

#[async_trait]
pub trait MachineStore: Send + Sync {
    async fn upsert(&self, machine: &Machine) -> Result<(), AggregatorError>;
    async fn touch_last_seen(&self, id: &str, at: DateTime<Utc>) -> Result<(), AggregatorError>;
    async fn load_all(&self) -> Result<Vec<Machine>, AggregatorError>;
}

#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn append(&self, machine_id: &str, sample: &MetricSample) -> Result<(), AggregatorError>;
    async fn recent(&self, machine_id: &str, limit: i64) -> Result<Vec<MetricSample>, AggregatorError>;
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AggregatorError>;
}

#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn save(&self, command: &Command) -> Result<(), AggregatorError>;
    async fn recent_for_machine(&self, machine_id: &str, limit: i64) -> Result<Vec<Command>, AggregatorError>;
    async fn load_all(&self) -> Result<Vec<Command>, AggregatorError>;
}

/// SQLite-backed implementation of all three repository traits, sharing one
/// pool (cheap to clone — `sqlx::Pool` is itself an `Arc` internally).
#[derive(Clone)]
pub struct SqlxStore {
    pool: SqlitePool,
}

impl SqlxStore {
    pub async fn connect(database_url: &str) -> Result<Self, AggregatorError> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, AggregatorError> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl MachineStore for SqlxStore {
    async fn upsert(&self, machine: &Machine) -> Result<(), AggregatorError> {
        let info = &machine.info;
        let disks_json = serde_json::to_string(&info.disks)?;
        sqlx::query(
            "INSERT INTO machines (machine_id, hostname, computer_name, os, os_version, \
             architecture, processor, logical_cores, physical_cores, total_memory_bytes, \
             boot_time, local_ip, disks_json, first_seen, last_seen) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
             ON CONFLICT(machine_id) DO UPDATE SET \
             hostname = excluded.hostname, computer_name = excluded.computer_name, \
             os = excluded.os, os_version = excluded.os_version, \
             architecture = excluded.architecture, processor = excluded.processor, \
             logical_cores = excluded.logical_cores, physical_cores = excluded.physical_cores, \
             total_memory_bytes = excluded.total_memory_bytes, boot_time = excluded.boot_time, \
             local_ip = excluded.local_ip, disks_json = excluded.disks_json, \
             last_seen = excluded.last_seen",
        )
        .bind(&info.machine_id)
        .bind(&info.hostname)
        .bind(&info.computer_name)
        .bind(&info.os)
        .bind(&info.os_version)
        .bind(&info.architecture)
        .bind(&info.processor)
        .bind(info.logical_cores as i64)
        .bind(info.physical_cores as i64)
        .bind(info.total_memory_bytes as i64)
        .bind(info.boot_time.to_rfc3339())
        .bind(&info.local_ip)
        .bind(disks_json)
        .bind(machine.first_seen.to_rfc3339())
        .bind(machine.last_seen.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_seen(&self, id: &str, at: DateTime<Utc>) -> Result<(), AggregatorError> {
        sqlx::query("UPDATE machines SET last_seen = ?1 WHERE machine_id = ?2")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Machine>, AggregatorError> {
        let rows = sqlx::query("SELECT * FROM machines").fetch_all(&self.pool).await?;
        let mut machines = Vec::with_capacity(rows.len());
        for row in rows {
            let disks_json: String = row.try_get("disks_json")?;
            let info = MachineInfo {
                machine_id: row.try_get("machine_id")?,
                hostname: row.try_get("hostname")?,
                computer_name: row.try_get("computer_name")?,
                os: row.try_get("os")?,
                os_version: row.try_get("os_version")?,
                architecture: row.try_get("architecture")?,
                processor: row.try_get("processor")?,
                logical_cores: row.try_get::<i64, _>("logical_cores")? as usize,
                physical_cores: row.try_get::<i64, _>("physical_cores")? as usize,
                total_memory_bytes: row.try_get::<i64, _>("total_memory_bytes")? as u64,
                boot_time: parse_ts(row.try_get("boot_time")?),
                local_ip: row.try_get("local_ip")?,
                disks: serde_json::from_str(&disks_json)?,
            };
            let first_seen = parse_ts(row.try_get("first_seen")?);
            let last_seen = parse_ts(row.try_get("last_seen")?);
            machines.push(Machine {
                info,
                latest_sample: None,
                first_seen,
                last_seen,
            });
        }
        Ok(machines)
    }
}

#[async_trait]
impl SampleStore for SqlxStore {
    async fn append(&self, machine_id: &str, sample: &MetricSample) -> Result<(), AggregatorError> {
        let sample_json = serde_json::to_string(sample)?;
        sqlx::query(
            "INSERT INTO metric_samples (machine_id, timestamp, sample_json) VALUES (?1, ?2, ?3)",
        )
        .bind(machine_id)
        .bind(sample.timestamp.to_rfc3339())
        .bind(sample_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, machine_id: &str, limit: i64) -> Result<Vec<MetricSample>, AggregatorError> {
        let rows = sqlx::query(
            "SELECT sample_json FROM metric_samples WHERE machine_id = ?1 \
             ORDER BY timestamp DESC LIMIT ?2",
        )
        .bind(machine_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let json: String = row.try_get("sample_json")?;
                Ok(serde_json::from_str(&json)?)
            })
            .collect()
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AggregatorError> {
        let result = sqlx::query("DELETE FROM metric_samples WHERE timestamp < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CommandStore for SqlxStore {
    async fn save(&self, command: &Command) -> Result<(), AggregatorError> {
        let action_json = serde_json::to_string(&command.action)?;
        let result_json = command
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO commands (command_id, machine_id, action_json, status, created_at, \
             executed_at, result_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(command_id) DO UPDATE SET \
             status = excluded.status, executed_at = excluded.executed_at, \
             result_json = excluded.result_json",
        )
        .bind(command.command_id.to_string())
        .bind(&command.machine_id)
        .bind(action_json)
        .bind(status_str(command.status))
        .bind(command.created_at.to_rfc3339())
        .bind(command.executed_at.map(|t| t.to_rfc3339()))
        .bind(result_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_for_machine(&self, machine_id: &str, limit: i64) -> Result<Vec<Command>, AggregatorError> {
        let rows = sqlx::query(
            "SELECT * FROM commands WHERE machine_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(machine_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_command).collect()
    }

    async fn load_all(&self) -> Result<Vec<Command>, AggregatorError> {
        let rows = sqlx::query("SELECT * FROM commands").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_command).collect()
    }
}

fn row_to_command(row: &sqlx::sqlite::SqliteRow) -> Result<Command, AggregatorError> {
    let action_json: String = row.try_get("action_json")?;
    let result_json: Option<String> = row.try_get("result_json")?;
    let executed_at: Option<String> = row.try_get("executed_at")?;
    Ok(Command {
        command_id: row.try_get::<String, _>("command_id")?.parse().map_err(|_| {
            AggregatorError::Storage(sqlx::Error::Protocol("malformed command_id".into()))
        })?,
        machine_id: row.try_get::<String, _>("machine_id")? as MachineId,
        action: serde_json::from_str::<CommandAction>(&action_json)?,
        status: parse_status(&row.try_get::<String, _>("status")?),
        created_at: parse_ts(row.try_get("created_at")?),
        executed_at: executed_at.map(parse_ts),
        result: result_json
            .map(|j| serde_json::from_str::<CommandResult>(&j))
            .transpose()?,
    })
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn status_str(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::Pending => "pending",
        CommandStatus::Executing => "executing",
        CommandStatus::Completed => "completed",
        CommandStatus::Failed => "failed",
        CommandStatus::Expired => "expired",
    }
}

fn parse_status(raw: &str) -> CommandStatus {
    match raw {
        "executing" => CommandStatus::Executing,
        "completed" => CommandStatus::Completed,
        "failed" => CommandStatus::Failed,
        "expired" => CommandStatus::Expired,
        _ => CommandStatus::Pending,
    }
}
