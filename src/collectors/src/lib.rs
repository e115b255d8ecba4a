//! Host-metrics collection: system metrics, process monitoring, and SMART
//! disk health (spec §4.7–§4.9).

pub mod cache;
pub mod error;
pub mod model;
pub mod process;
pub mod smart;
pub mod system;

pub use cache::FreshnessCache;
pub use error::CollectorError;
pub use model::*;
pub use process::{KillResult, ProblematicProcesses, ProcessInfo, ProcessMonitor, SortBy};
pub use smart::SmartCollector;
pub use system::SystemCollector;
