use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("probe exceeded its time budget")]
    Timeout,

    #[error("no route to target {0}")]
    Unreachable(String),

    #[error("DNS resolution failed for {0}")]
    DnsFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
