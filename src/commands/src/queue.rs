//! Per-machine command queue with atomic `pending -> executing` transitions
//! and idempotent result reporting (spec §4.3).
//!
//! Grounded on `progress_tracker.rs`'s `Arc<RwLock<HashMap<Uuid, _>>>`
//! status-tracking shape, generalized to a per-machine FIFO of commands with
//! monotonic per-command status transitions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CommandError;
use crate::model::{Command, CommandAction, CommandResult, CommandStatus, MachineId};

#[derive(Default)]
struct QueueState {
    by_machine: HashMap<MachineId, VecDeque<Uuid>>,
    by_id: HashMap<Uuid, Command>,
}

/// The server-side command queue. One instance is shared (via `Arc`) across
/// every HTTP handler and the expiry janitor.
#[derive(Clone)]
pub struct CommandQueue {
    state: Arc<RwLock<QueueState>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(QueueState::default())),
        }
    }

    /// Append a new pending command for `machine_id`. Returns its id.
    pub async fn enqueue(&self, machine_id: MachineId, action: CommandAction) -> Uuid {
        let command = Command::new(machine_id.clone(), action);
        let id = command.command_id;

        let mut state = self.state.write().await;
        state
            .by_machine
            .entry(machine_id)
            .or_default()
            .push_back(id);
        state.by_id.insert(id, command);

        info!(command_id = %id, "command enqueued");
        id
    }

    /// Atomically transition the oldest pending command for `machine_id` to
    /// `executing` and return it. Concurrent callers never observe the same
    /// command twice — the whole read-modify-write happens under one write
    /// lock.
    pub async fn next_command(&self, machine_id: &str) -> Option<Command> {
        let mut state = self.state.write().await;
        let queue = state.by_machine.get(machine_id)?;

        let pending_id = queue.iter().copied().find(|id| {
            state
                .by_id
                .get(id)
                .map(|c| c.status == CommandStatus::Pending)
                .unwrap_or(false)
        })?;

        let command = state.by_id.get_mut(&pending_id)?;
        command.status = CommandStatus::Executing;
        command.executed_at = Some(Utc::now());
        Some(command.clone())
    }

    /// Record the outcome of an `executing` command. Re-invoking on an
    /// already-terminal command is a no-op (idempotent), matching spec §8.
    pub async fn report_result(
        &self,
        command_id: Uuid,
        result: CommandResult,
    ) -> Result<(), CommandError> {
        let mut state = self.state.write().await;
        let command = state
            .by_id
            .get_mut(&command_id)
            .ok_or(CommandError::NotFound(command_id))?;

        if command.status.is_terminal() {
            return Ok(());
        }

        command.status = if result.success {
            CommandStatus::Completed
        } else {
            CommandStatus::Failed
        };
        command.result = Some(result);
        Ok(())
    }

    /// Sweep `executing` commands older than `timeout` into `failed{timeout}`.
    /// Run periodically by the `command-janitor` service.
    pub async fn expire_stale(&self, timeout: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout).unwrap_or_default();
        let mut state = self.state.write().await;
        let mut expired = 0;

        for command in state.by_id.values_mut() {
            if command.status == CommandStatus::Executing {
                if let Some(executed_at) = command.executed_at {
                    if executed_at < cutoff {
                        command.status = CommandStatus::Expired;
                        command.result = Some(CommandResult {
                            success: false,
                            message: "timeout".to_string(),
                            data: None,
                        });
                        expired += 1;
                        warn!(command_id = %command.command_id, "command expired");
                    }
                }
            }
        }

        expired
    }

    /// Re-insert a command loaded from durable storage on startup. Pending
    /// commands rejoin their machine's FIFO so `next_command` can still pull
    /// them; terminal/executing commands are kept for `get`/audit lookups
    /// only (spec §6: a restart must not lose queued work).
    pub async fn restore(&self, command: Command) {
        let mut state = self.state.write().await;
        if command.status == CommandStatus::Pending {
            state
                .by_machine
                .entry(command.machine_id.clone())
                .or_default()
                .push_back(command.command_id);
        }
        state.by_id.insert(command.command_id, command);
    }

    pub async fn get(&self, command_id: Uuid) -> Option<Command> {
        self.state.read().await.by_id.get(&command_id).cloned()
    }

    /// Most recent commands for a machine, newest first.
    pub async fn recent_for_machine(&self, machine_id: &str) -> Vec<Command> {
        let state = self.state.read().await;
        let Some(ids) = state.by_machine.get(machine_id) else {
            return Vec::new();
        };
        let mut commands: Vec<Command> = ids
            .iter()
            .filter_map(|id| state.by_id.get(id).cloned())
            .collect();
        commands.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        commands
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
