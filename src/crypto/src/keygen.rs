//! Key material generation, matching the wire format produced by the
//! original `fleet-agent/generate_encryption_key.py` helper: a base64
//! encoding of 32 random bytes, suitable for dropping into an agent config
//! file or embedding in a built package (spec §4.10).

use crate::wire::EncryptionKey;

pub fn generate_key() -> EncryptionKey {
    EncryptionKey::generate()
}

pub fn generate_key_base64() -> String {
    generate_key().to_base64()
}
