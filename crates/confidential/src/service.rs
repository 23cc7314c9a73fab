// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::AuthorizationWindow;
use crate::{FheType, Handle};
use alloy::primitives::{Address, Bytes, Signature, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Errors reported by a confidential computation service
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport failure, timeout or a 5xx from the service. Callers may retry.
    #[error("Confidential computation service unavailable: {0}")]
    Unavailable(String),
    /// The service refused the request as malformed
    #[error("Request rejected by the confidential computation service: {0}")]
    Rejected(String),
    #[error("Access denied: {0}")]
    Unauthorized(String),
    #[error("Authorization window expired at {end_timestamp} (now {now})")]
    WindowExpired { end_timestamp: u64, now: u64 },
    #[error("Invalid response from the confidential computation service: {0}")]
    InvalidResponse(String),
}

/// A handle paired with the contract that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

impl HandleContractPair {
    pub fn new(handle: Handle, contract_address: Address) -> Self {
        Self {
            handle,
            contract_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptRequest {
    pub contract_address: Address,
    pub user_address: Address,
    pub chain_id: u64,
    pub values: Vec<(U256, FheType)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptResponse {
    pub handles: Vec<Handle>,
    pub input_proof: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDecryptRequest {
    pub pairs: Vec<HandleContractPair>,
    pub public_key: [u8; 32],
    pub signature: Signature,
    pub contract_addresses: Vec<Address>,
    pub contracts_chain_id: u64,
    pub user_address: Address,
    pub window: AuthorizationWindow,
}

/// A decrypted value sealed to the requesting session's public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    pub handle: Handle,
    pub payload: Bytes,
}

/// The party that holds encryption and decryption capability.
///
/// Implementations are shared between sessions and must accept concurrent requests.
#[async_trait]
pub trait ConfidentialService: Send + Sync {
    /// Encrypt `values` for `contract_address`, returning one handle per value plus a proof bound
    /// to the contract and user of the request
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ServiceError>;

    /// Verify a signed decryption authorization and return the requested values, sealed to the
    /// request's public key. Responses may come back in any order.
    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<Vec<SealedValue>, ServiceError>;
}
