//! Server-side fleet aggregation: the canonical per-machine snapshot, durable
//! storage, and command arbitration (spec §4.9).

pub mod error;
pub mod model;
pub mod service;
pub mod storage;

pub use error::AggregatorError;
pub use model::{Machine, MachineDetail, MachineId, MachineStatus, MachineSummary, ReportAck, ReportPayload, StatusThresholds};
pub use service::{Aggregator, KeyLookup, NoEncryption};
pub use storage::{CommandStore, MachineStore, SampleStore, SqlxStore};
