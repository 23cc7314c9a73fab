// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::environment::{Environment, DEFAULT_TOKEN};
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use anyhow::{bail, Context, Result};
use ctoken_config::AccountRole;
use ctoken_confidential::{EncryptedPayload, FheType};
use tracing::{info, instrument};

pub const DEFAULT_TRANSFER_AMOUNT: u64 = 1_000_000;

/// Encrypt `amount` as a 64 bit value for `token`, submitted by the signer
pub(crate) async fn encrypt_amount(
    env: &Environment,
    token: Address,
    amount: U256,
) -> Result<(B256, Bytes)> {
    let mut input = env
        .client()
        .create_encrypted_input(token, env.signer_address());
    input.add(amount, FheType::Uint64)?;
    let EncryptedPayload {
        handles,
        input_proof,
    } = input.encrypt().await.context("Could not build the encrypted input")?;
    let [handle] = handles.as_slice() else {
        bail!("Expected one handle, got {}", handles.len());
    };
    Ok((*handle, input_proof))
}

#[derive(Debug, Clone, Default)]
pub struct TransferParams {
    pub token: Option<Address>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

impl TransferParams {
    pub fn resolve(self, env: &Environment) -> Result<Transfer> {
        Ok(Transfer {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            from: self.from.unwrap_or(env.signer_address()),
            to: env.account_or(self.to, AccountRole::Relayer)?,
            amount: self.amount.unwrap_or(U256::from(DEFAULT_TRANSFER_AMOUNT)),
        })
    }
}

impl Transfer {
    /// `confidentialTransferFrom(from, to, amount, proof)`
    #[instrument(skip_all, fields(token = %self.token, to = %self.to))]
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        let (handle, proof) = encrypt_amount(env, self.token, self.amount).await?;
        let tx = env
            .contracts()
            .token(self.token)
            .confidential_transfer_from(self.from, self.to, handle, proof)
            .await?;
        info!("Transferred {} from {} to {}", self.amount, self.from, self.to);
        Ok(tx)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferAndCallParams {
    pub token: Option<Address>,
    pub to: Option<Address>,
    pub amount: Option<U256>,
    pub data: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAndCall {
    pub token: Address,
    pub to: Address,
    pub amount: U256,
    pub data: Bytes,
}

impl TransferAndCallParams {
    pub fn resolve(self, env: &Environment) -> Result<TransferAndCall> {
        Ok(TransferAndCall {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            to: env.account_or(self.to, AccountRole::Relayer)?,
            amount: self.amount.unwrap_or(U256::from(DEFAULT_TRANSFER_AMOUNT)),
            data: self.data.unwrap_or_default(),
        })
    }
}

impl TransferAndCall {
    /// `confidentialTransferAndCall(to, amount, proof, data)` from the signer
    #[instrument(skip_all, fields(token = %self.token, to = %self.to))]
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        let (handle, proof) = encrypt_amount(env, self.token, self.amount).await?;
        env.contracts()
            .token(self.token)
            .confidential_transfer_and_call(self.to, handle, proof, self.data.clone())
            .await
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnwrapParams {
    pub token: Option<Address>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrap {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

impl UnwrapParams {
    pub fn resolve(self, env: &Environment) -> Result<Unwrap> {
        Ok(Unwrap {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            from: self.from.unwrap_or(env.signer_address()),
            to: self.to.unwrap_or(env.signer_address()),
            amount: self.amount.unwrap_or(U256::from(DEFAULT_TRANSFER_AMOUNT)),
        })
    }
}

impl Unwrap {
    /// `unwrap(from, to, amount, proof)`: burn confidential balance for plaintext underlying
    #[instrument(skip_all, fields(token = %self.token))]
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        let (handle, proof) = encrypt_amount(env, self.token, self.amount).await?;
        env.contracts()
            .token(self.token)
            .unwrap(self.from, self.to, handle, proof)
            .await
    }
}
