// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::sealing::{open_value, SealingError};
use crate::Handle;
use alloy::primitives::U256;
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ephemeral X25519 keypair owned by a single decryption session.
///
/// The secret is zeroized when the keypair is dropped. Not `Clone`.
pub struct Keypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh keypair from the operating system's randomness source
    pub fn generate() -> Result<Self, rand::Error> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.try_fill_bytes(&mut seed[..])?;
        Ok(Self::from_secret_bytes(*seed))
    }

    pub(crate) fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Secret key bytes, for handing to a decryption backend that opens results itself
    pub fn private_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Open a value the service sealed to this keypair's public key
    pub fn open(&self, handle: &Handle, sealed: &[u8]) -> Result<U256, SealingError> {
        open_value(&self.secret, handle, sealed)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypairs_are_fresh() {
        let a = Keypair::generate().unwrap();
        let b = Keypair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(*a.private_key(), *b.private_key());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let keypair = Keypair::from_secret_bytes([9u8; 32]);
        let printed = format!("{:?}", keypair);
        assert!(printed.contains(&hex::encode(keypair.public_key())));
        assert!(!printed.contains(&hex::encode([9u8; 32])));
    }
}
