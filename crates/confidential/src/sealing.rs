// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Sealing of decrypted values to a session public key.
//!
//! A sealed value is `[ephemeral public key: 32][nonce: 12][AES-256-GCM ciphertext]`. The AES key
//! is derived with HKDF-SHA256 from the X25519 shared secret, salted with the ciphertext handle so
//! a sealed payload cannot be replayed under another handle.

use crate::Handle;
use aes_gcm::{aead::Aead, Aes256Gcm, Error as AesError, KeyInit};
use alloy::primitives::U256;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error as ThisError;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

pub const NONCE_BYTE_SIZE: usize = 12;
const EPHEMERAL_KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = EPHEMERAL_KEY_SIZE + NONCE_BYTE_SIZE;
const KDF_INFO: &[u8] = b"ctoken/user-decrypt/v1";

#[derive(Debug, ThisError)]
pub enum SealingError {
    #[error("Sealed payload is too short: {0} bytes")]
    Truncated(usize),
    #[error("Failed to expand key, with error: `{0}`")]
    KeyExpansionFailed(hkdf::InvalidLength),
    #[error("Failed to seal value, with error: `{0}`")]
    EncryptionFailed(AesError),
    #[error("Failed to open sealed value, with error: `{0}`")]
    DecryptionFailed(AesError),
    #[error("Opened value has {0} bytes, expected 32")]
    BadPlaintextLength(usize),
    #[error("Randomness source unavailable: {0}")]
    Randomness(#[from] rand::Error),
}

fn derive_cipher(shared_secret: &SharedSecret, handle: &Handle) -> Result<Aes256Gcm, SealingError> {
    let hkdf = Hkdf::<Sha256>::new(Some(handle.as_slice()), shared_secret.as_bytes());
    let mut symmetric_key = Zeroizing::new([0u8; 32]);
    hkdf.expand(KDF_INFO, symmetric_key.as_mut_slice())
        .map_err(SealingError::KeyExpansionFailed)?;
    Ok(Aes256Gcm::new(&(*symmetric_key).into()))
}

/// Seal `value` for the holder of `recipient_public_key`
pub fn seal_value(
    recipient_public_key: [u8; 32],
    handle: &Handle,
    value: U256,
) -> Result<Vec<u8>, SealingError> {
    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.try_fill_bytes(&mut seed[..])?;
    let ephemeral = StaticSecret::from(*seed);
    let shared_secret = ephemeral.diffie_hellman(&PublicKey::from(recipient_public_key));
    let cipher = derive_cipher(&shared_secret, handle)?;

    let mut nonce = [0u8; NONCE_BYTE_SIZE];
    OsRng.try_fill_bytes(&mut nonce)?;
    let plaintext = Zeroizing::new(value.to_be_bytes::<32>());
    let ciphertext = cipher
        .encrypt(&nonce.into(), plaintext.as_slice())
        .map_err(SealingError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    out.extend_from_slice(PublicKey::from(&ephemeral).as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a value sealed with [`seal_value`]
pub fn open_value(
    secret: &StaticSecret,
    handle: &Handle,
    sealed: &[u8],
) -> Result<U256, SealingError> {
    if sealed.len() <= HEADER_SIZE {
        return Err(SealingError::Truncated(sealed.len()));
    }
    let mut ephemeral_public = [0u8; EPHEMERAL_KEY_SIZE];
    ephemeral_public.copy_from_slice(&sealed[..EPHEMERAL_KEY_SIZE]);
    let nonce = &sealed[EPHEMERAL_KEY_SIZE..HEADER_SIZE];
    let ciphertext = &sealed[HEADER_SIZE..];

    let shared_secret = secret.diffie_hellman(&PublicKey::from(ephemeral_public));
    let cipher = derive_cipher(&shared_secret, handle)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce.into(), ciphertext)
            .map_err(SealingError::DecryptionFailed)?,
    );
    if plaintext.len() != 32 {
        return Err(SealingError::BadPlaintextLength(plaintext.len()));
    }
    Ok(U256::from_be_slice(&plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;
    use alloy::primitives::B256;

    #[test]
    fn test_sealed_value_opens_only_with_matching_key_and_handle() {
        let keypair = Keypair::generate().unwrap();
        let other = Keypair::generate().unwrap();
        let handle = B256::repeat_byte(0x42);
        let value = U256::from(1_000_000u64);

        let sealed = seal_value(keypair.public_key(), &handle, value).unwrap();
        assert_eq!(keypair.open(&handle, &sealed).unwrap(), value);

        assert!(matches!(
            other.open(&handle, &sealed),
            Err(SealingError::DecryptionFailed(_))
        ));
        assert!(matches!(
            keypair.open(&B256::repeat_byte(0x43), &sealed),
            Err(SealingError::DecryptionFailed(_))
        ));
        assert!(matches!(
            keypair.open(&handle, &sealed[..HEADER_SIZE]),
            Err(SealingError::Truncated(_))
        ));
    }
}
