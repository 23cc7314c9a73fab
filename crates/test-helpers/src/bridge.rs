// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::next_tx_hash;
use alloy::primitives::{Address, TxHash, B256, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ctoken_confidential::LocalCoprocessor;
use ctoken_evm::{BridgeRequest, BridgeWrite};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A bridge order with its encrypted arguments resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOrder {
    pub request: BridgeRequest,
    pub input_amount: U256,
    pub output_amount: U256,
    pub destination_chain_id: U256,
}

#[derive(Default)]
struct BridgeState {
    orders: Vec<BridgeOrder>,
    peers: HashMap<u32, B256>,
    chain_eids: HashMap<u64, u32>,
}

pub struct MockBridge {
    address: Address,
    caller: Address,
    coprocessor: Arc<LocalCoprocessor>,
    state: Mutex<BridgeState>,
}

impl MockBridge {
    pub fn new(address: Address, caller: Address, coprocessor: Arc<LocalCoprocessor>) -> Self {
        Self {
            address,
            caller,
            coprocessor,
            state: Mutex::new(BridgeState::default()),
        }
    }

    pub async fn orders(&self) -> Vec<BridgeOrder> {
        self.state.lock().await.orders.clone()
    }

    pub async fn peer(&self, eid: u32) -> Option<B256> {
        self.state.lock().await.peers.get(&eid).copied()
    }

    pub async fn eid_for_chain(&self, chain_id: u64) -> Option<u32> {
        self.state.lock().await.chain_eids.get(&chain_id).copied()
    }

    async fn plaintext(&self, handle: &B256) -> Result<U256> {
        self.coprocessor
            .plaintext(handle)
            .await
            .ok_or_else(|| anyhow!("execution reverted: unknown handle {handle}"))
    }
}

#[async_trait]
impl BridgeWrite for MockBridge {
    fn address(&self) -> Address {
        self.address
    }

    async fn bridge(&self, request: BridgeRequest) -> Result<TxHash> {
        self.coprocessor
            .verify_input(
                self.address,
                self.caller,
                &request.handles,
                &request.input_proof,
            )
            .map_err(|e| anyhow!("execution reverted: {e}"))?;
        let [input, output, destination] = request.handles;
        let order = BridgeOrder {
            input_amount: self.plaintext(&input).await?,
            output_amount: self.plaintext(&output).await?,
            destination_chain_id: self.plaintext(&destination).await?,
            request,
        };
        self.state.lock().await.orders.push(order);
        Ok(next_tx_hash())
    }

    async fn set_peer(&self, eid: u32, peer: B256) -> Result<TxHash> {
        self.state.lock().await.peers.insert(eid, peer);
        Ok(next_tx_hash())
    }

    async fn set_chain_id_to_eid(&self, chain_id: u64, eid: u32) -> Result<TxHash> {
        self.state.lock().await.chain_eids.insert(chain_id, eid);
        Ok(next_tx_hash())
    }
}
