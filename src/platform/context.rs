use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audit_logging::AuditLogger;
use crate::platform::config::PlatformConfig;
use crate::rate_limiting::RateLimiter;

/// Ambient handles shared by every service a binary registers: config, audit
/// log, rate limiter, and the root shutdown token. Domain state (the
/// aggregator, the command queue) is NOT carried here — services that need it
/// close over an `Arc` captured at construction, the way `telemetry_service`
/// closes over its settings instead of reading them back out of the context.
#[derive(Clone)]
pub struct PlatformContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    config: PlatformConfig,
    audit_logger: Arc<AuditLogger>,
    rate_limiter: Arc<RateLimiter>,
}

impl PlatformContext {
    pub(crate) fn new(
        config: PlatformConfig,
        audit_logger: Arc<AuditLogger>,
        rate_limiter: Arc<RateLimiter>,
        shutdown: CancellationToken,
    ) -> Self {
        let shared = SharedState {
            config,
            audit_logger,
            rate_limiter,
        };

        Self {
            shared: Arc::new(shared),
            shutdown,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.shared.config
    }

    pub fn audit_logger(&self) -> Arc<AuditLogger> {
        Arc::clone(&self.shared.audit_logger)
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.shared.rate_limiter)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
