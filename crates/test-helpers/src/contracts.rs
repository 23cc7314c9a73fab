// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::bridge::MockBridge;
use crate::erc20::MockErc20;
use crate::token::MockToken;
use alloy::primitives::Address;
use ctoken_confidential::LocalCoprocessor;
use ctoken_evm::{BridgeWrite, ContractSet, Erc20, TokenWrite};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct Deployed {
    tokens: HashMap<Address, Arc<MockToken>>,
    erc20s: HashMap<Address, Arc<MockErc20>>,
    bridges: HashMap<Address, Arc<MockBridge>>,
}

/// In-memory chain of mock contracts, all called by `caller`.
///
/// Addresses nobody deployed resolve to fresh, empty contracts.
pub struct MockContracts {
    caller: Address,
    coprocessor: Arc<LocalCoprocessor>,
    deployed: Mutex<Deployed>,
}

impl MockContracts {
    pub fn new(caller: Address, coprocessor: Arc<LocalCoprocessor>) -> Self {
        Self {
            caller,
            coprocessor,
            deployed: Mutex::new(Deployed::default()),
        }
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn coprocessor(&self) -> &Arc<LocalCoprocessor> {
        &self.coprocessor
    }

    fn deployed(&self) -> std::sync::MutexGuard<'_, Deployed> {
        self.deployed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deploy a confidential token at `address` wrapping a fresh ERC-20 at `underlying`
    pub fn deploy_token(&self, address: Address, underlying: Address) -> Arc<MockToken> {
        let erc20 = self.deploy_erc20(underlying);
        let token = Arc::new(MockToken::new(
            address,
            self.caller,
            self.coprocessor.clone(),
            erc20,
        ));
        self.deployed().tokens.insert(address, token.clone());
        token
    }

    pub fn deploy_erc20(&self, address: Address) -> Arc<MockErc20> {
        self.deployed()
            .erc20s
            .entry(address)
            .or_insert_with(|| Arc::new(MockErc20::new(address, self.caller)))
            .clone()
    }

    pub fn deploy_bridge(&self, address: Address) -> Arc<MockBridge> {
        self.deployed()
            .bridges
            .entry(address)
            .or_insert_with(|| {
                Arc::new(MockBridge::new(address, self.caller, self.coprocessor.clone()))
            })
            .clone()
    }

    pub fn mock_token(&self, address: Address) -> Option<Arc<MockToken>> {
        self.deployed().tokens.get(&address).cloned()
    }
}

impl ContractSet for MockContracts {
    fn token(&self, address: Address) -> Arc<dyn TokenWrite> {
        if let Some(token) = self.mock_token(address) {
            return token;
        }
        self.deploy_token(address, Address::ZERO)
    }

    fn erc20(&self, address: Address) -> Arc<dyn Erc20> {
        self.deploy_erc20(address)
    }

    fn bridge(&self, address: Address) -> Arc<dyn BridgeWrite> {
        self.deploy_bridge(address)
    }
}
