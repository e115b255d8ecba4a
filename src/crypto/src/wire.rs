//! Core data structures for the payload-sealing boundary (spec §4.1) and the
//! key-slot bookkeeping that the key-rotation protocol (spec §4.3) builds on.

use serde::{Deserialize, Serialize};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// A 256-bit symmetric key used to seal/open telemetry and command payloads.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptionKey(#[serde(with = "key_b64")] pub [u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, crate::error::CryptoError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let decoded = STANDARD
            .decode(s)
            .map_err(|_| crate::error::CryptoError::Corrupt)?;
        let actual = decoded.len();
        let bytes: [u8; KEY_LEN] =
            decoded
                .try_into()
                .map_err(|_| crate::error::CryptoError::BadKeyLength {
                    expected: KEY_LEN,
                    actual,
                })?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

mod key_b64 {
    use super::KEY_LEN;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; KEY_LEN], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; KEY_LEN], D::Error> {
        let raw = String::deserialize(d)?;
        let decoded = STANDARD
            .decode(raw)
            .map_err(|e| serde::de::Error::custom(e.to_string()))?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("key must be 32 bytes"))
    }
}

/// Identifies the sealing scheme used for a wire payload. `None` means the
/// payload is cleartext JSON — the operator has chosen to rely on TLS alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SchemeId {
    None = 0,
    Aes256Gcm = 1,
}

impl SchemeId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

/// The three logical key slots tracked during a rotation (spec §4.3): the
/// server must be able to decrypt a report sealed with either `current` or
/// `previous` for the duration of the rotation window.
#[derive(Debug, Clone)]
pub struct KeySlots {
    pub current: Option<EncryptionKey>,
    pub previous: Option<EncryptionKey>,
    pub pending_ack: bool,
}

impl KeySlots {
    pub fn none() -> Self {
        Self {
            current: None,
            previous: None,
            pending_ack: false,
        }
    }

    pub fn with_current(key: EncryptionKey) -> Self {
        Self {
            current: Some(key),
            previous: None,
            pending_ack: false,
        }
    }

    /// Begin a rotation: `previous` <- old current, `current` <- new key.
    pub fn begin_rotation(&mut self, new_key: EncryptionKey) {
        self.previous = self.current.take();
        self.current = Some(new_key);
        self.pending_ack = true;
    }

    /// Roll back an unacknowledged rotation after `T_rotation_timeout`.
    pub fn rollback(&mut self) {
        if self.pending_ack {
            self.current = self.previous.take().or_else(|| self.current.take());
            self.pending_ack = false;
        }
    }

    pub fn confirm(&mut self) {
        self.pending_ack = false;
    }
}
