// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::erc20::MockErc20;
use crate::next_tx_hash;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ctoken_confidential::{Clock, FheType, Handle, LocalCoprocessor, SystemClock};
use ctoken_evm::{TokenRead, TokenWrite};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A state changing call the token accepted, with amounts in plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCall {
    Transfer {
        from: Address,
        to: Address,
        requested: U256,
        transferred: U256,
    },
    TransferAndCall {
        to: Address,
        transferred: U256,
        data: Bytes,
    },
    Unwrap {
        from: Address,
        to: Address,
        amount: U256,
    },
    Wrap {
        to: Address,
        amount: U256,
    },
    SetOperator {
        operator: Address,
        until: u64,
    },
}

#[derive(Default)]
struct TokenState {
    balances: HashMap<Address, U256>,
    handles: HashMap<Address, Handle>,
    operators: HashMap<(Address, Address), u64>,
    calls: Vec<TokenCall>,
}

/// Confidential ERC-20 wrapper whose balances live in a [`LocalCoprocessor`].
///
/// Encrypted amounts must arrive with a proof bound to this token and the calling account.
/// Balance handles are re-issued on every change and readable by the holder and the token.
pub struct MockToken {
    address: Address,
    caller: Address,
    coprocessor: Arc<LocalCoprocessor>,
    underlying: Arc<MockErc20>,
    clock: Arc<dyn Clock>,
    state: Mutex<TokenState>,
}

impl MockToken {
    pub fn new(
        address: Address,
        caller: Address,
        coprocessor: Arc<LocalCoprocessor>,
        underlying: Arc<MockErc20>,
    ) -> Self {
        Self {
            address,
            caller,
            coprocessor,
            underlying,
            clock: Arc::new(SystemClock),
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Credit `amount` to `account` out of thin air
    pub async fn mint(&self, account: Address, amount: U256) {
        let mut state = self.state.lock().await;
        let balance = state.balances.get(&account).copied().unwrap_or_default();
        self.set_balance(&mut state, account, balance + amount).await;
    }

    /// Plaintext balance of `account`
    pub async fn balance(&self, account: Address) -> U256 {
        self.state
            .lock()
            .await
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<TokenCall> {
        self.state.lock().await.calls.clone()
    }

    pub fn underlying_token(&self) -> &Arc<MockErc20> {
        &self.underlying
    }

    async fn set_balance(&self, state: &mut TokenState, account: Address, balance: U256) {
        let handle = self.coprocessor.trivial_encrypt(balance, FheType::Uint64).await;
        self.coprocessor.allow(handle, account).await;
        self.coprocessor.allow(handle, self.address).await;
        state.balances.insert(account, balance);
        state.handles.insert(account, handle);
    }

    /// Resolve an external encrypted amount, as `FHE.fromExternal` does
    async fn from_external(&self, amount: B256, input_proof: &Bytes) -> Result<U256> {
        self.coprocessor
            .verify_input(self.address, self.caller, &[amount], input_proof)
            .map_err(|e| anyhow!("execution reverted: {e}"))?;
        self.coprocessor
            .plaintext(&amount)
            .await
            .ok_or_else(|| anyhow!("execution reverted: unknown handle {amount}"))
    }

    fn is_operator_at(state: &TokenState, holder: Address, spender: Address, now: u64) -> bool {
        holder == spender
            || state
                .operators
                .get(&(holder, spender))
                .is_some_and(|until| *until >= now)
    }

    /// Move up to `amount` from `from` to `to`. An insufficient balance moves nothing.
    async fn move_balance(
        &self,
        state: &mut TokenState,
        from: Address,
        to: Address,
        amount: U256,
    ) -> U256 {
        let from_balance = state.balances.get(&from).copied().unwrap_or_default();
        let transferred = if from_balance >= amount {
            amount
        } else {
            U256::ZERO
        };
        self.set_balance(state, from, from_balance - transferred).await;
        let to_balance = state.balances.get(&to).copied().unwrap_or_default();
        self.set_balance(state, to, to_balance + transferred).await;
        transferred
    }
}

#[async_trait]
impl TokenRead for MockToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn confidential_balance_of(&self, account: Address) -> Result<B256> {
        Ok(self
            .state
            .lock()
            .await
            .handles
            .get(&account)
            .copied()
            .unwrap_or(B256::ZERO))
    }

    async fn underlying(&self) -> Result<Address> {
        Ok(self.underlying.address())
    }

    async fn is_operator(&self, holder: Address, spender: Address) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(Self::is_operator_at(&state, holder, spender, self.clock.now()))
    }
}

#[async_trait]
impl TokenWrite for MockToken {
    async fn confidential_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let requested = self.from_external(amount, &input_proof).await?;
        let mut state = self.state.lock().await;
        if !Self::is_operator_at(&state, from, self.caller, self.clock.now()) {
            bail!("execution reverted: UnauthorizedSpender({from}, {})", self.caller);
        }
        let transferred = self.move_balance(&mut state, from, to, requested).await;
        debug!("transfer {from} -> {to}: {transferred} of {requested}");
        state.calls.push(TokenCall::Transfer {
            from,
            to,
            requested,
            transferred,
        });
        Ok(next_tx_hash())
    }

    async fn confidential_transfer_and_call(
        &self,
        to: Address,
        amount: B256,
        input_proof: Bytes,
        data: Bytes,
    ) -> Result<TxHash> {
        let requested = self.from_external(amount, &input_proof).await?;
        let mut state = self.state.lock().await;
        let transferred = self
            .move_balance(&mut state, self.caller, to, requested)
            .await;
        state.calls.push(TokenCall::TransferAndCall {
            to,
            transferred,
            data,
        });
        Ok(next_tx_hash())
    }

    async fn unwrap(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let amount = self.from_external(amount, &input_proof).await?;
        let mut state = self.state.lock().await;
        if !Self::is_operator_at(&state, from, self.caller, self.clock.now()) {
            bail!("execution reverted: UnauthorizedSpender({from}, {})", self.caller);
        }
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < amount {
            bail!("execution reverted: insufficient confidential balance");
        }
        self.set_balance(&mut state, from, balance - amount).await;
        self.underlying.mint(to, amount).await;
        state.calls.push(TokenCall::Unwrap { from, to, amount });
        Ok(next_tx_hash())
    }

    async fn wrap(&self, to: Address, amount: U256) -> Result<TxHash> {
        self.underlying
            .transfer_from(self.address, self.caller, self.address, amount)
            .await?;
        let mut state = self.state.lock().await;
        let balance = state.balances.get(&to).copied().unwrap_or_default();
        self.set_balance(&mut state, to, balance + amount).await;
        state.calls.push(TokenCall::Wrap { to, amount });
        Ok(next_tx_hash())
    }

    async fn set_operator(&self, operator: Address, until: u64) -> Result<TxHash> {
        let mut state = self.state.lock().await;
        state.operators.insert((self.caller, operator), until);
        state.calls.push(TokenCall::SetOperator { operator, until });
        Ok(next_tx_hash())
    }
}
