//! # fleet-commands
//!
//! Operator-authored command queue and the remote encryption-key rotation
//! protocol (spec §4.3). `fleet-crypto` supplies the seal/open primitive and
//! the `KeySlots` value type; this crate owns *which* command is next for a
//! machine and *which* rotation is in flight.

pub mod error;
pub mod model;
pub mod queue;
pub mod rotation;

pub use error::CommandError;
pub use model::{Command, CommandAction, CommandResult, CommandStatus, MachineId};
pub use queue::CommandQueue;
pub use rotation::{KeyRotationTracker, RotationRecord, RotationStatus};
