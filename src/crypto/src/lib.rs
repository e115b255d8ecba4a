//! # fleet-crypto
//!
//! Authenticated payload sealing for the agent↔server telemetry channel
//! (spec §4.1) and the key-material primitives the remote key-rotation
//! protocol (spec §4.3, implemented in `fleet-commands`) builds on.
//!
//! Responsibility boundary: this crate knows how to seal/open a byte blob
//! with a single key, and how to generate/encode key material. It has no
//! opinion about *which* key a machine is currently on, or when a rotation
//! should happen — that bookkeeping lives in `fleet-commands`.

pub mod error;
pub mod keygen;
pub mod seal;
pub mod wire;

pub use error::CryptoError;
pub use keygen::{generate_key, generate_key_base64};
pub use seal::{open, seal as seal_payload, OpenedWith};
pub use wire::{EncryptionKey, KeySlots, SchemeId, KEY_LEN, NONCE_LEN};
