use thiserror::Error;

/// Failure modes for `seal`/`open` at the payload-encryption boundary.
///
/// These never propagate as panics across a subsystem boundary (see the
/// "Exceptions across subsystem boundaries" design note) — callers turn
/// `InvalidKey`/`Corrupt` into a dropped sample or a `400` response.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("sealed payload is truncated or malformed")]
    Corrupt,

    #[error("payload does not authenticate under the supplied key")]
    InvalidKey,

    #[error("unrecognized sealing scheme id {0}")]
    UnknownScheme(u8),

    #[error("key material has the wrong length: expected {expected}, got {actual}")]
    BadKeyLength { expected: usize, actual: usize },

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}
