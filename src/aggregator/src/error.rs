//! Error surface for aggregation and durable storage (spec §4.9).

use fleet_commands::CommandError;
use fleet_crypto::CryptoError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("payload rejected: {0}")]
    Crypto(#[from] CryptoError),

    #[error("report body is not valid MetricSample JSON: {0}")]
    MalformedReport(#[from] serde_json::Error),

    #[error("unknown machine {0}")]
    UnknownMachine(String),

    #[error("command error: {0}")]
    Command(#[from] CommandError),

    #[error("command {0} not found")]
    CommandNotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
