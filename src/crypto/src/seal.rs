//! `seal`/`open` — authenticated encryption for telemetry and command
//! payloads above the TLS layer (spec §4.1). Wire form is self-describing:
//! a one-byte scheme id, the nonce, then ciphertext+tag. Not JSON — a
//! binary blob carried as base64 (or raw octets) in the HTTP body.

use crate::error::CryptoError;
use crate::wire::{EncryptionKey, SchemeId, NONCE_LEN};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

/// Seal `plaintext` with `key`. When `key` is `None`, payloads pass through
/// as cleartext JSON tagged with `SchemeId::None` — operators choosing this
/// mode accept that TLS alone protects the channel.
pub fn seal(plaintext: &[u8], key: Option<&EncryptionKey>) -> Result<Vec<u8>, CryptoError> {
    let Some(key) = key else {
        let mut out = Vec::with_capacity(1 + plaintext.len());
        out.push(SchemeId::None as u8);
        out.extend_from_slice(plaintext);
        return Ok(out);
    };

    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes()).map_err(|_| {
        CryptoError::BadKeyLength {
            expected: 32,
            actual: key.as_bytes().len(),
        }
    })?;
    let sealing_key = LessSafeKey::new(unbound);

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| CryptoError::Corrupt)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::InvalidKey)?;

    let mut out = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
    out.push(SchemeId::Aes256Gcm as u8);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Open a sealed payload, trying `current` first then `previous` (spec
/// §4.1 rationale: the transition window around a key rotation). Returns
/// which slot succeeded so the caller can confirm the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedWith {
    Current,
    Previous,
    Cleartext,
}

pub fn open(
    sealed: &[u8],
    current: Option<&EncryptionKey>,
    previous: Option<&EncryptionKey>,
) -> Result<(Vec<u8>, OpenedWith), CryptoError> {
    let (&scheme_byte, rest) = sealed.split_first().ok_or(CryptoError::Corrupt)?;
    let scheme = SchemeId::from_u8(scheme_byte).ok_or(CryptoError::UnknownScheme(scheme_byte))?;

    match scheme {
        SchemeId::None => Ok((rest.to_vec(), OpenedWith::Cleartext)),
        SchemeId::Aes256Gcm => {
            if rest.len() < NONCE_LEN {
                return Err(CryptoError::Corrupt);
            }
            let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

            if let Some(key) = current {
                if let Ok(plain) = open_with_key(key, nonce_bytes, ciphertext) {
                    return Ok((plain, OpenedWith::Current));
                }
            }
            if let Some(key) = previous {
                if let Ok(plain) = open_with_key(key, nonce_bytes, ciphertext) {
                    return Ok((plain, OpenedWith::Previous));
                }
            }
            Err(CryptoError::InvalidKey)
        }
    }
}

fn open_with_key(
    key: &EncryptionKey,
    nonce_bytes: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce_arr: [u8; NONCE_LEN] = nonce_bytes.try_into().map_err(|_| CryptoError::Corrupt)?;
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes()).map_err(|_| {
        CryptoError::BadKeyLength {
            expected: 32,
            actual: key.as_bytes().len(),
        }
    })?;
    let opening_key = LessSafeKey::new(unbound);
    let nonce = Nonce::assume_unique_for_key(nonce_arr);

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::InvalidKey)?;
    Ok(plaintext.to_vec())
}
