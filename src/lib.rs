//! Fleet telemetry and remote-management platform.
//!
//! The domain logic lives in the `fleet-*` workspace crates (crypto,
//! commands, collectors, diagnostics, aggregator, packager); this crate is
//! the ambient runtime shared by the `agent` and `server` binaries —
//! service-lifecycle management, layered configuration, audit logging, and
//! rate limiting — plus small re-exports so a binary only needs one `use`.

pub mod audit_logging;
pub mod platform;
pub mod rate_limiting;
pub mod utils;

pub use platform::{Platform, PlatformConfig, PlatformContext, PlatformRuntime, ServiceRegistration};

pub use fleet_aggregator as aggregator;
pub use fleet_collectors as collectors;
pub use fleet_commands as commands;
pub use fleet_crypto as crypto;
pub use fleet_diagnostics as diagnostics;
pub use fleet_packager as packager;
