// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::environment::{Environment, BRIDGE_CONTRACT, DEFAULT_TOKEN};
use crate::transfer::DEFAULT_TRANSFER_AMOUNT;
use alloy::primitives::{Address, TxHash, U256};
use anyhow::{bail, Context, Result};
use ctoken_config::AccountRole;
use ctoken_confidential::FheType;
use ctoken_evm::{peer_from_address, BridgeRequest};
use tracing::{info, instrument};

/// Arbitrum Sepolia
pub const DEFAULT_DESTINATION_CHAIN_ID: u64 = 421614;

#[derive(Debug, Clone, Default)]
pub struct BridgeParams {
    pub bridge: Option<Address>,
    pub input_token: Option<Address>,
    pub output_token: Option<Address>,
    pub destination_chain_id: Option<u64>,
    pub receiver: Option<Address>,
    pub relayer: Option<Address>,
    pub input_amount: Option<U256>,
    pub output_amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub bridge: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub destination_chain_id: u32,
    pub receiver: Address,
    pub relayer: Address,
    pub input_amount: U256,
    pub output_amount: U256,
}

impl BridgeParams {
    pub fn resolve(self, env: &Environment) -> Result<Bridge> {
        let destination = self
            .destination_chain_id
            .unwrap_or(DEFAULT_DESTINATION_CHAIN_ID);
        let Ok(destination_chain_id) = u32::try_from(destination) else {
            bail!("Destination chain id {destination} does not fit in 32 bits");
        };
        let output_token = match self.output_token {
            Some(address) => address,
            None => env.registry().address(destination, DEFAULT_TOKEN)?,
        };
        Ok(Bridge {
            bridge: env.contract_or(self.bridge, BRIDGE_CONTRACT)?,
            input_token: env.contract_or(self.input_token, DEFAULT_TOKEN)?,
            output_token,
            destination_chain_id,
            receiver: self.receiver.unwrap_or(env.signer_address()),
            relayer: env.account_or(self.relayer, AccountRole::Relayer)?,
            input_amount: self
                .input_amount
                .unwrap_or(U256::from(DEFAULT_TRANSFER_AMOUNT)),
            output_amount: self
                .output_amount
                .unwrap_or(U256::from(DEFAULT_TRANSFER_AMOUNT)),
        })
    }
}

impl Bridge {
    /// Encrypt input amount, output amount and destination in one input bound to the bridge,
    /// then submit the order
    #[instrument(skip_all, fields(bridge = %self.bridge, destination = self.destination_chain_id))]
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        let mut input = env
            .client()
            .create_encrypted_input(self.bridge, env.signer_address());
        input
            .add(self.input_amount, FheType::Uint64)?
            .add(self.output_amount, FheType::Uint64)?
            .add32(self.destination_chain_id)?;
        let payload = input
            .encrypt()
            .await
            .context("Could not build the encrypted bridge input")?;
        let Ok(handles) = <[_; 3]>::try_from(payload.handles.as_slice()) else {
            bail!("Expected three handles, got {}", payload.handles.len());
        };

        let tx = env
            .contracts()
            .bridge(self.bridge)
            .bridge(BridgeRequest {
                sender: env.signer_address(),
                receiver: self.receiver,
                relayer: self.relayer,
                input_token: self.input_token,
                output_token: self.output_token,
                handles,
                input_proof: payload.input_proof,
            })
            .await?;
        info!(
            "Bridging {} to chain {} for {}",
            self.input_amount, self.destination_chain_id, self.receiver
        );
        Ok(tx)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetPeerParams {
    pub bridge: Option<Address>,
    pub eid: u32,
    pub peer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPeer {
    pub bridge: Address,
    pub eid: u32,
    pub peer: Address,
}

impl SetPeerParams {
    pub fn resolve(self, env: &Environment) -> Result<SetPeer> {
        Ok(SetPeer {
            bridge: env.contract_or(self.bridge, BRIDGE_CONTRACT)?,
            eid: self.eid,
            peer: self.peer,
        })
    }
}

impl SetPeer {
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        env.contracts()
            .bridge(self.bridge)
            .set_peer(self.eid, peer_from_address(self.peer))
            .await
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetChainIdToEidParams {
    pub bridge: Option<Address>,
    pub chain_id: u64,
    pub eid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetChainIdToEid {
    pub bridge: Address,
    pub chain_id: u64,
    pub eid: u32,
}

impl SetChainIdToEidParams {
    pub fn resolve(self, env: &Environment) -> Result<SetChainIdToEid> {
        Ok(SetChainIdToEid {
            bridge: env.contract_or(self.bridge, BRIDGE_CONTRACT)?,
            chain_id: self.chain_id,
            eid: self.eid,
        })
    }
}

impl SetChainIdToEid {
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        env.contracts()
            .bridge(self.bridge)
            .set_chain_id_to_eid(self.chain_id, self.eid)
            .await
    }
}
