//! Wire and storage types for the command queue (spec §4.3, §3 Command entity).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MachineId = String;

/// A command's lifecycle: pending → executing → {completed|failed|expired}.
/// Transitions are monotonic — there is no path back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Expired,
}

impl CommandStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Expired
        )
    }
}

/// The action vocabulary agents understand. Anything else is rejected by the
/// agent with `{reason: unsupported}` before this type is ever constructed
/// server-side for an unrecognized action string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    RestartAgent,
    ClearDnsCache,
    KillProcess { pid: u32 },
    RotateEncryptionKey { sealed_new_key: String },
}

impl CommandAction {
    pub fn name(&self) -> &'static str {
        match self {
            CommandAction::RestartAgent => "restart_agent",
            CommandAction::ClearDnsCache => "clear_dns_cache",
            CommandAction::KillProcess { .. } => "kill_process",
            CommandAction::RotateEncryptionKey { .. } => "rotate_encryption_key",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: Uuid,
    pub machine_id: MachineId,
    #[serde(flatten)]
    pub action: CommandAction,
    pub status: CommandStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
}

impl Command {
    pub fn new(machine_id: MachineId, action: CommandAction) -> Self {
        Self {
            command_id: Uuid::new_v4(),
            machine_id,
            action,
            status: CommandStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            result: None,
        }
    }
}
