//! Failure modes for package assembly (spec §4.10).

#[derive(Debug, thiserror::Error)]
pub enum PackagerError {
    #[error("fleet_linked packages must carry embedded credentials")]
    MissingCredentials,

    #[error("standalone packages must not carry embedded credentials")]
    UnexpectedCredentials,

    #[error("template staging failed: {0}")]
    Template(String),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
