// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::next_tx_hash;
use alloy::primitives::{Address, TxHash, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use ctoken_evm::Erc20;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Ledger {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    approvals: usize,
}

/// Plaintext ERC-20 called by a single account
pub struct MockErc20 {
    address: Address,
    caller: Address,
    ledger: Mutex<Ledger>,
}

impl MockErc20 {
    pub fn new(address: Address, caller: Address) -> Self {
        Self {
            address,
            caller,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn mint(&self, account: Address, amount: U256) {
        *self
            .ledger
            .lock()
            .await
            .balances
            .entry(account)
            .or_default() += amount;
    }

    pub async fn balance_of(&self, account: Address) -> U256 {
        self.ledger
            .lock()
            .await
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Number of `approve` calls made
    pub async fn approvals(&self) -> usize {
        self.ledger.lock().await.approvals
    }

    /// `transferFrom` as executed by `spender`
    pub async fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        let allowance = ledger
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            bail!("execution reverted: ERC20InsufficientAllowance({spender}, {allowance}, {amount})");
        }
        let balance = ledger.balances.get(&from).copied().unwrap_or_default();
        if balance < amount {
            bail!("execution reverted: ERC20InsufficientBalance({from}, {balance}, {amount})");
        }
        ledger.allowances.insert((from, spender), allowance - amount);
        ledger.balances.insert(from, balance - amount);
        *ledger.balances.entry(to).or_default() += amount;
        Ok(())
    }
}

#[async_trait]
impl Erc20 for MockErc20 {
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .ledger
            .lock()
            .await
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, spender: Address, value: U256) -> Result<TxHash> {
        let mut ledger = self.ledger.lock().await;
        ledger.allowances.insert((self.caller, spender), value);
        ledger.approvals += 1;
        Ok(next_tx_hash())
    }
}
