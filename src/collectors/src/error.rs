use thiserror::Error;

/// Collector-boundary failures. Per spec §7 "Collector failure" policy: a
/// single failing field is dropped from the `MetricSample`, never the whole
/// sample — these errors are caught locally by `fleet-collectors::system`
/// and turned into an absent field plus a `warn!` log, not propagated.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collection exceeded its time budget")]
    Timeout,

    #[error("process {0} not found")]
    ProcessNotFound(u32),

    #[error("refused to kill pid {0}: owned by a different user")]
    PermissionDenied(u32),

    #[error("refused to kill pid {0}: protected system process")]
    Protected(u32),

    #[error("platform does not support this probe")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
