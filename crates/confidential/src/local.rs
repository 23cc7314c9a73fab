// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! In-process coprocessor for local networks and tests.
//!
//! Values are kept in plaintext behind their handles. Input proofs are signed by a locally
//! generated coprocessor key, and user decryption enforces the same checks a real gateway does:
//! signature, validity window, contract set and access control.

use crate::authorization::{
    AuthorizationWindow, Clock, DecryptionDomain, SystemClock, UserDecryptAuthorization,
};
use crate::decrypt::MAX_AUTHORIZED_CONTRACTS;
use crate::handle::{compute_handle, input_hash};
use crate::proof::InputProof;
use crate::sealing::seal_value;
use crate::service::{
    ConfidentialService, EncryptRequest, EncryptResponse, SealedValue, ServiceError,
    UserDecryptRequest,
};
use crate::{FheType, Handle};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

sol! {
    #[derive(Debug)]
    struct CiphertextVerification {
        bytes32[] ctHandles;
        address userAddress;
        address contractAddress;
        uint256 contractChainId;
    }
}

/// Order in which user decryption answers are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrder {
    #[default]
    Requested,
    Reversed,
    Shuffled,
}

#[derive(Default)]
struct State {
    nonce: u64,
    values: HashMap<Handle, (U256, FheType)>,
    acl: HashMap<Handle, HashSet<Address>>,
    decrypt_requests: usize,
}

pub struct LocalCoprocessor {
    chain_id: u64,
    domain: DecryptionDomain,
    coprocessor: PrivateKeySigner,
    clock: Arc<dyn Clock>,
    response_order: ResponseOrder,
    state: RwLock<State>,
}

impl LocalCoprocessor {
    /// Coprocessor for host chain `chain_id`, verifying decryption authorizations on the same chain
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            domain: DecryptionDomain {
                chain_id,
                verifying_contract: Address::ZERO,
            },
            coprocessor: PrivateKeySigner::random(),
            clock: Arc::new(SystemClock),
            response_order: ResponseOrder::default(),
            state: RwLock::new(State::default()),
        }
    }

    pub fn with_domain(mut self, domain: DecryptionDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_response_order(mut self, order: ResponseOrder) -> Self {
        self.response_order = order;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn domain(&self) -> &DecryptionDomain {
        &self.domain
    }

    /// Address whose signatures make an input proof valid
    pub fn coprocessor_address(&self) -> Address {
        self.coprocessor.address()
    }

    fn input_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed("InputVerification")),
            Some(Cow::Borrowed("1")),
            Some(U256::from(self.chain_id)),
            Some(Address::ZERO),
            None,
        )
    }

    fn input_signing_hash(&self, handles: &[Handle], contract: Address, user: Address) -> B256 {
        CiphertextVerification {
            ctHandles: handles.to_vec(),
            userAddress: user,
            contractAddress: contract,
            contractChainId: U256::from(self.chain_id),
        }
        .eip712_signing_hash(&self.input_domain())
    }

    /// Check an input proof the way a contract's `fromExternal` does: the proof must cover
    /// `handles` and be signed for exactly this `(contract, user)` binding.
    pub fn verify_input(
        &self,
        contract: Address,
        user: Address,
        handles: &[Handle],
        proof: &[u8],
    ) -> Result<(), ServiceError> {
        let decoded = InputProof::decode(proof)
            .map_err(|e| ServiceError::Rejected(format!("malformed input proof: {e}")))?;
        if decoded.handles != handles {
            return Err(ServiceError::Rejected(
                "input proof does not cover the submitted handles".to_string(),
            ));
        }
        let hash = self.input_signing_hash(&decoded.handles, contract, user);
        let signed_by_coprocessor = decoded.signatures.iter().any(|signature| {
            signature
                .recover_address_from_prehash(&hash)
                .map(|signer| signer == self.coprocessor.address())
                .unwrap_or(false)
        });
        if !signed_by_coprocessor {
            return Err(ServiceError::Rejected(format!(
                "input proof is not valid for contract {contract} and user {user}"
            )));
        }
        Ok(())
    }

    /// Store `value` under a new handle, as on-chain computation results are
    pub async fn trivial_encrypt(&self, value: U256, ty: FheType) -> Handle {
        let mut state = self.state.write().await;
        state.nonce += 1;
        let hash = input_hash(Address::ZERO, Address::ZERO, self.chain_id, state.nonce);
        let handle = compute_handle(&hash, 0, self.chain_id, ty);
        state.values.insert(handle, (value, ty));
        handle
    }

    pub async fn plaintext(&self, handle: &Handle) -> Option<U256> {
        self.state.read().await.values.get(handle).map(|(v, _)| *v)
    }

    /// Grant `account` access to `handle`
    pub async fn allow(&self, handle: Handle, account: Address) {
        self.state
            .write()
            .await
            .acl
            .entry(handle)
            .or_default()
            .insert(account);
    }

    pub async fn is_allowed(&self, handle: &Handle, account: Address) -> bool {
        self.state
            .read()
            .await
            .acl
            .get(handle)
            .is_some_and(|accounts| accounts.contains(&account))
    }

    /// Number of user decryption requests received
    pub async fn decrypt_requests(&self) -> usize {
        self.state.read().await.decrypt_requests
    }

    fn check_window(&self, window: &AuthorizationWindow) -> Result<(), ServiceError> {
        let now = self.clock.now();
        if now < window.start_timestamp {
            return Err(ServiceError::Rejected(format!(
                "authorization window starts in the future at {}",
                window.start_timestamp
            )));
        }
        if window.duration_days == 0 || !window.contains(now) {
            return Err(ServiceError::WindowExpired {
                end_timestamp: window.end_timestamp(),
                now,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConfidentialService for LocalCoprocessor {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ServiceError> {
        if request.chain_id != self.chain_id {
            return Err(ServiceError::Rejected(format!(
                "chain {} is not served by this coprocessor",
                request.chain_id
            )));
        }
        if request.values.is_empty() || request.values.len() > crate::input::MAX_INPUT_VALUES {
            return Err(ServiceError::Rejected(format!(
                "cannot encrypt {} values in one input",
                request.values.len()
            )));
        }

        let mut state = self.state.write().await;
        state.nonce += 1;
        let hash = input_hash(
            request.contract_address,
            request.user_address,
            self.chain_id,
            state.nonce,
        );
        let handles: Vec<Handle> = request
            .values
            .iter()
            .enumerate()
            .map(|(i, (_, ty))| compute_handle(&hash, i as u8, self.chain_id, *ty))
            .collect();
        for (handle, value) in handles.iter().zip(&request.values) {
            state.values.insert(*handle, *value);
        }
        drop(state);

        let signature = self
            .coprocessor
            .sign_hash_sync(&self.input_signing_hash(
                &handles,
                request.contract_address,
                request.user_address,
            ))
            .map_err(|e| ServiceError::Unavailable(format!("coprocessor signing failed: {e}")))?;
        let input_proof = InputProof {
            handles: handles.clone(),
            signatures: vec![signature],
            extra_data: Bytes::from_static(&[0x00]),
        }
        .encode()
        .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        debug!("Encrypted {} values for {}", handles.len(), request.contract_address);
        Ok(EncryptResponse {
            handles,
            input_proof,
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<Vec<SealedValue>, ServiceError> {
        self.state.write().await.decrypt_requests += 1;
        self.check_window(&request.window)?;

        if request.contract_addresses.is_empty()
            || request.contract_addresses.len() > MAX_AUTHORIZED_CONTRACTS
        {
            return Err(ServiceError::Rejected(format!(
                "{} contracts in authorization",
                request.contract_addresses.len()
            )));
        }
        if request.contracts_chain_id != self.chain_id {
            return Err(ServiceError::Rejected(format!(
                "contracts chain {} is not served by this coprocessor",
                request.contracts_chain_id
            )));
        }

        let authorization = UserDecryptAuthorization::new(
            &self.domain,
            &request.public_key,
            request.contract_addresses.iter().copied(),
            request.window,
        );
        let recovered = request
            .signature
            .recover_address_from_prehash(&authorization.signing_hash())
            .map_err(|e| ServiceError::Unauthorized(format!("unreadable signature: {e}")))?;
        if recovered != request.user_address {
            warn!(
                "Authorization signed by {recovered}, request claims {}",
                request.user_address
            );
            return Err(ServiceError::Unauthorized(
                "authorization was not signed by the requesting user".to_string(),
            ));
        }

        let state = self.state.read().await;
        let mut sealed = Vec::with_capacity(request.pairs.len());
        for pair in &request.pairs {
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(ServiceError::Unauthorized(format!(
                    "contract {} is not part of the authorization",
                    pair.contract_address
                )));
            }
            let allowed = |account: &Address| {
                state
                    .acl
                    .get(&pair.handle)
                    .is_some_and(|accounts| accounts.contains(account))
            };
            if !allowed(&request.user_address) || !allowed(&pair.contract_address) {
                return Err(ServiceError::Unauthorized(format!(
                    "{} may not decrypt {} through {}",
                    request.user_address, pair.handle, pair.contract_address
                )));
            }
            let Some((value, _)) = state.values.get(&pair.handle) else {
                return Err(ServiceError::Rejected(format!("unknown handle {}", pair.handle)));
            };
            let payload = seal_value(request.public_key, &pair.handle, *value)
                .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
            sealed.push(SealedValue {
                handle: pair.handle,
                payload: payload.into(),
            });
        }
        drop(state);

        match self.response_order {
            ResponseOrder::Requested => {}
            ResponseOrder::Reversed => sealed.reverse(),
            ResponseOrder::Shuffled => sealed.shuffle(&mut rand::thread_rng()),
        }
        Ok(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::HandleContractPair;
    use crate::signer::TypedDataSigner;
    use crate::Keypair;

    const CHAIN_ID: u64 = 31337;

    fn request_values() -> EncryptRequest {
        EncryptRequest {
            contract_address: Address::repeat_byte(0xbb),
            user_address: Address::repeat_byte(0xaa),
            chain_id: CHAIN_ID,
            values: vec![(U256::from(1_000_000u64), FheType::Uint64)],
        }
    }

    #[tokio::test]
    async fn test_proof_is_bound_to_contract_and_user() -> anyhow::Result<()> {
        let service = LocalCoprocessor::new(CHAIN_ID);
        let request = request_values();
        let response = service.encrypt(request.clone()).await?;

        service.verify_input(
            request.contract_address,
            request.user_address,
            &response.handles,
            &response.input_proof,
        )?;

        let other_contract = service.verify_input(
            Address::repeat_byte(0x01),
            request.user_address,
            &response.handles,
            &response.input_proof,
        );
        assert!(matches!(other_contract, Err(ServiceError::Rejected(_))));

        let other_user = service.verify_input(
            request.contract_address,
            Address::repeat_byte(0x02),
            &response.handles,
            &response.input_proof,
        );
        assert!(matches!(other_user, Err(ServiceError::Rejected(_))));

        let other_handles = service.verify_input(
            request.contract_address,
            request.user_address,
            &[B256::repeat_byte(0x33)],
            &response.input_proof,
        );
        assert!(matches!(other_handles, Err(ServiceError::Rejected(_))));
        Ok(())
    }

    async fn signed_request(
        wallet: &PrivateKeySigner,
        service: &LocalCoprocessor,
        keypair: &Keypair,
        pairs: Vec<HandleContractPair>,
        contracts: Vec<Address>,
        window: AuthorizationWindow,
    ) -> anyhow::Result<UserDecryptRequest> {
        let authorization = UserDecryptAuthorization::new(
            service.domain(),
            &keypair.public_key(),
            contracts.iter().copied(),
            window,
        );
        let signature = wallet.sign_authorization(&authorization).await?;
        Ok(UserDecryptRequest {
            pairs,
            public_key: keypair.public_key(),
            signature,
            contract_addresses: authorization.contract_addresses().to_vec(),
            contracts_chain_id: CHAIN_ID,
            user_address: TypedDataSigner::address(wallet),
            window,
        })
    }

    #[tokio::test]
    async fn test_elapsed_window_is_expired() -> anyhow::Result<()> {
        let wallet = PrivateKeySigner::random();
        let service = LocalCoprocessor::new(CHAIN_ID);
        let contract = Address::repeat_byte(0xcc);
        let handle = service.trivial_encrypt(U256::from(3), FheType::Uint64).await;
        service.allow(handle, contract).await;
        service.allow(handle, TypedDataSigner::address(&wallet)).await;

        let keypair = Keypair::generate()?;
        let start = SystemClock.now() - 3_600;
        let request = signed_request(
            &wallet,
            &service,
            &keypair,
            vec![HandleContractPair::new(handle, contract)],
            vec![contract],
            AuthorizationWindow {
                start_timestamp: start,
                duration_days: 0,
            },
        )
        .await?;

        assert!(matches!(
            service.user_decrypt(request).await,
            Err(ServiceError::WindowExpired { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_contract_outside_authorization_is_unauthorized() -> anyhow::Result<()> {
        let wallet = PrivateKeySigner::random();
        let service = LocalCoprocessor::new(CHAIN_ID);
        let authorized = Address::repeat_byte(0xcc);
        let other = Address::repeat_byte(0xdd);
        let handle = service.trivial_encrypt(U256::from(3), FheType::Uint64).await;
        service.allow(handle, other).await;
        service.allow(handle, TypedDataSigner::address(&wallet)).await;

        let keypair = Keypair::generate()?;
        let request = signed_request(
            &wallet,
            &service,
            &keypair,
            vec![HandleContractPair::new(handle, other)],
            vec![authorized],
            AuthorizationWindow {
                start_timestamp: SystemClock.now(),
                duration_days: 1,
            },
        )
        .await?;

        assert!(matches!(
            service.user_decrypt(request).await,
            Err(ServiceError::Unauthorized(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_forged_user_is_unauthorized() -> anyhow::Result<()> {
        let wallet = PrivateKeySigner::random();
        let service = LocalCoprocessor::new(CHAIN_ID);
        let contract = Address::repeat_byte(0xcc);
        let handle = service.trivial_encrypt(U256::from(3), FheType::Uint64).await;
        service.allow(handle, contract).await;

        let keypair = Keypair::generate()?;
        let mut request = signed_request(
            &wallet,
            &service,
            &keypair,
            vec![HandleContractPair::new(handle, contract)],
            vec![contract],
            AuthorizationWindow {
                start_timestamp: SystemClock.now(),
                duration_days: 1,
            },
        )
        .await?;
        request.user_address = Address::repeat_byte(0x99);

        assert!(matches!(
            service.user_decrypt(request).await,
            Err(ServiceError::Unauthorized(_))
        ));
        Ok(())
    }
}
