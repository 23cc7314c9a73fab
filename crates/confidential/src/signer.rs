// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::UserDecryptAuthorization;
use alloy::primitives::{Address, Signature};
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// A wallet declined or failed to produce a signature
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Wallet side of the typed-data signing scheme.
///
/// Signing may wait on a human or a remote signer. No timeout is applied here.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_authorization(
        &self,
        authorization: &UserDecryptAuthorization,
    ) -> Result<Signature, SignerError>;
}

#[async_trait]
impl TypedDataSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_authorization(
        &self,
        authorization: &UserDecryptAuthorization,
    ) -> Result<Signature, SignerError> {
        self.sign_hash(&authorization.signing_hash())
            .await
            .map_err(|e| SignerError(e.to_string()))
    }
}

#[async_trait]
impl<T: TypedDataSigner + ?Sized> TypedDataSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_authorization(
        &self,
        authorization: &UserDecryptAuthorization,
    ) -> Result<Signature, SignerError> {
        (**self).sign_authorization(authorization).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{AuthorizationWindow, DecryptionDomain};

    #[tokio::test]
    async fn test_signature_recovers_to_signer() -> anyhow::Result<()> {
        let wallet = PrivateKeySigner::random();
        let authorization = UserDecryptAuthorization::new(
            &DecryptionDomain {
                chain_id: 55815,
                verifying_contract: Address::repeat_byte(0xdd),
            },
            &[3u8; 32],
            [Address::repeat_byte(0x0b)],
            AuthorizationWindow {
                start_timestamp: 1_700_000_000,
                duration_days: 10,
            },
        );

        let signature = wallet.sign_authorization(&authorization).await?;
        let recovered = signature.recover_address_from_prehash(&authorization.signing_hash())?;

        assert_eq!(recovered, TypedDataSigner::address(&wallet));
        Ok(())
    }
}
