use thiserror::Error;

/// Failure modes for the command queue and key-rotation state machine.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command id {0}")]
    NotFound(uuid::Uuid),

    #[error("command {0} is not in a state that allows this transition")]
    InvalidTransition(uuid::Uuid),

    #[error("action {0} is not recognized")]
    UnsupportedAction(String),

    #[error(transparent)]
    Crypto(#[from] fleet_crypto::CryptoError),
}
