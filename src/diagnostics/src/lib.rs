//! Network diagnostics: the OSI 7-layer probe, traceroute, and the slowdown
//! incident detector (spec §4.4-§4.6).

pub mod error;
pub mod link_probe;
pub mod model;
pub mod osi;
pub mod slowdown;
pub mod traceroute;

pub use error::DiagnosticError;
pub use link_probe::{LinkProbe, LinkState, LinuxLinkProbe};
pub use model::*;
pub use osi::OsiProbe;
pub use slowdown::SlowdownDetector;
pub use traceroute::Tracer;
