// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::{Clock, DecryptionDomain, SystemClock};
use crate::decrypt::{DecryptError, DecryptOptions, DecryptionClient, DecryptionResult};
use crate::input::EncryptedInput;
use crate::service::{ConfidentialService, HandleContractPair};
use crate::signer::TypedDataSigner;
use alloy::primitives::Address;
use std::sync::Arc;

/// Entry point to the confidential workflow for one host chain.
///
/// Cheap to clone; every clone shares the same service.
#[derive(Clone)]
pub struct ConfidentialClient {
    service: Arc<dyn ConfidentialService>,
    chain_id: u64,
    decryption: DecryptionClient,
}

impl ConfidentialClient {
    pub fn new(
        service: Arc<dyn ConfidentialService>,
        chain_id: u64,
        domain: DecryptionDomain,
    ) -> Self {
        Self::with_clock(service, chain_id, domain, Arc::new(SystemClock))
    }

    pub fn with_clock(
        service: Arc<dyn ConfidentialService>,
        chain_id: u64,
        domain: DecryptionDomain,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let decryption = DecryptionClient::new(service.clone(), domain, chain_id, clock);
        Self {
            service,
            chain_id,
            decryption,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn service(&self) -> &Arc<dyn ConfidentialService> {
        &self.service
    }

    pub fn decryption(&self) -> &DecryptionClient {
        &self.decryption
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.decryption.clock()
    }

    /// Begin an encrypted input for `contract`, to be submitted by `user`
    pub fn create_encrypted_input(&self, contract: Address, user: Address) -> EncryptedInput {
        EncryptedInput::new(self.service.clone(), self.chain_id, contract, user)
    }

    pub async fn user_decrypt(
        &self,
        pairs: impl IntoIterator<Item = HandleContractPair>,
        signer: &dyn TypedDataSigner,
        options: DecryptOptions,
    ) -> Result<DecryptionResult, DecryptError> {
        self.decryption.user_decrypt(pairs, signer, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalCoprocessor;
    use crate::FheType;
    use alloy::primitives::U256;
    use alloy::signers::local::PrivateKeySigner;

    const CHAIN_ID: u64 = 31337;

    fn setup() -> (Arc<LocalCoprocessor>, ConfidentialClient) {
        let service = Arc::new(LocalCoprocessor::new(CHAIN_ID));
        let client = ConfidentialClient::new(service.clone(), CHAIN_ID, *service.domain());
        (service, client)
    }

    /// The contract side of the flow: accept the input, keep its handles and share them with the
    /// submitter
    async fn accept_input(
        service: &LocalCoprocessor,
        contract: Address,
        user: Address,
        handles: &[crate::Handle],
        proof: &[u8],
    ) -> anyhow::Result<()> {
        service.verify_input(contract, user, handles, proof)?;
        for handle in handles {
            service.allow(*handle, contract).await;
            service.allow(*handle, user).await;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_single_value_round_trip() -> anyhow::Result<()> {
        let (service, client) = setup();
        let wallet = PrivateKeySigner::random();
        let token = Address::repeat_byte(0x70);

        let mut input = client.create_encrypted_input(token, wallet.address());
        input.add64(1_000_000)?;
        let payload = input.encrypt().await?;
        assert_eq!(payload.handles.len(), 1);
        accept_input(&service, token, wallet.address(), &payload.handles, &payload.input_proof)
            .await?;

        let result = client
            .user_decrypt(
                [HandleContractPair::new(payload.handles[0], token)],
                &wallet,
                DecryptOptions::default(),
            )
            .await?;
        assert_eq!(result.get(&payload.handles[0]), Some(U256::from(1_000_000u64)));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_round_trip() -> anyhow::Result<()> {
        let (service, client) = setup();
        let wallet = PrivateKeySigner::random();
        let bridge = Address::repeat_byte(0xb1);

        let mut input = client.create_encrypted_input(bridge, wallet.address());
        input.add64(1_000_000)?.add64(990_000)?.add32(421614)?;
        let payload = input.encrypt().await?;

        let types: Vec<_> = payload
            .handles
            .iter()
            .map(|h| crate::handle::handle_type(h))
            .collect();
        assert_eq!(
            types,
            vec![Some(FheType::Uint64), Some(FheType::Uint64), Some(FheType::Uint32)]
        );
        accept_input(&service, bridge, wallet.address(), &payload.handles, &payload.input_proof)
            .await?;

        let result = client
            .user_decrypt(
                payload
                    .handles
                    .iter()
                    .map(|h| HandleContractPair::new(*h, bridge)),
                &wallet,
                DecryptOptions::default(),
            )
            .await?;
        assert_eq!(result.len(), 3);
        assert_eq!(result.get(&payload.handles[0]), Some(U256::from(1_000_000u64)));
        assert_eq!(result.get(&payload.handles[1]), Some(U256::from(990_000u64)));
        assert_eq!(result.get(&payload.handles[2]), Some(U256::from(421614u64)));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_sessions_share_one_service() -> anyhow::Result<()> {
        let (service, client) = setup();
        let token = Address::repeat_byte(0x70);

        let mut tasks = Vec::new();
        for value in 0..8u64 {
            let client = client.clone();
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let wallet = PrivateKeySigner::random();
                let mut input = client.create_encrypted_input(token, wallet.address());
                input.add64(value)?;
                let payload = input.encrypt().await?;
                accept_input(
                    &service,
                    token,
                    wallet.address(),
                    &payload.handles,
                    &payload.input_proof,
                )
                .await?;
                let result = client
                    .user_decrypt(
                        [HandleContractPair::new(payload.handles[0], token)],
                        &wallet,
                        DecryptOptions::default(),
                    )
                    .await?;
                anyhow::Ok(result.get(&payload.handles[0]) == Some(U256::from(value)))
            }));
        }
        for task in tasks {
            assert!(task.await??);
        }
        Ok(())
    }
}
