// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::decrypt::decrypt_handles;
use crate::environment::{Environment, DEFAULT_TOKEN};
use alloy::primitives::{Address, B256, U256};
use anyhow::{bail, Context, Result};
use ctoken_config::AccountRole;
use ctoken_confidential::HandleContractPair;
use futures::future::try_join_all;
use tracing::{info, instrument};

/// Registry names starting with this are confidential tokens
pub const TOKEN_PREFIX: &str = "c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    /// Registry name, empty for an unregistered token
    pub name: String,
    pub token: Address,
    pub handle: B256,
    pub balance: U256,
}

#[derive(Debug, Clone, Default)]
pub struct BalanceOfParams {
    pub token: Option<Address>,
    pub account: Option<Address>,
    pub duration_days: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceOf {
    pub token: Address,
    pub account: Address,
    pub duration_days: u64,
}

/// The `user` account when configured, otherwise the signer
fn default_account(env: &Environment, explicit: Option<Address>) -> Address {
    env.account_or(explicit, AccountRole::User)
        .unwrap_or(env.signer_address())
}

impl BalanceOfParams {
    pub fn resolve(self, env: &Environment) -> Result<BalanceOf> {
        Ok(BalanceOf {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            account: default_account(env, self.account),
            duration_days: self.duration_days.unwrap_or(env.default_duration_days()),
        })
    }
}

impl BalanceOf {
    #[instrument(skip_all, fields(token = %self.token, account = %self.account))]
    pub async fn execute(&self, env: &Environment) -> Result<TokenBalance> {
        let handle = env
            .contracts()
            .token(self.token)
            .confidential_balance_of(self.account)
            .await?;
        let pair = HandleContractPair::new(handle, self.token);
        let values = decrypt_handles(env, &[pair], self.duration_days).await?;
        let balance = values
            .get(&handle)
            .copied()
            .context("Decryption returned no value for the balance")?;
        Ok(TokenBalance {
            name: env
                .registry()
                .name_of(env.chain_id(), self.token)
                .unwrap_or_default()
                .to_string(),
            token: self.token,
            handle,
            balance,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BalanceOfAllParams {
    /// Registry names to read. Defaults to every confidential token on the chain.
    pub tokens: Option<Vec<String>>,
    pub account: Option<Address>,
    pub duration_days: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceOfAll {
    pub tokens: Vec<(String, Address)>,
    pub account: Address,
    pub duration_days: u64,
}

impl BalanceOfAllParams {
    pub fn resolve(self, env: &Environment) -> Result<BalanceOfAll> {
        let tokens = match self.tokens {
            Some(names) => names
                .into_iter()
                .map(|name| {
                    let address = env.contract_or(None, &name)?;
                    Ok::<_, anyhow::Error>((name, address))
                })
                .collect::<Result<Vec<_>>>()?,
            None => env
                .registry()
                .contracts_with_prefix(env.chain_id(), TOKEN_PREFIX),
        };
        if tokens.is_empty() {
            bail!("No confidential tokens registered on chain {}", env.chain_id());
        }
        Ok(BalanceOfAll {
            tokens,
            account: default_account(env, self.account),
            duration_days: self.duration_days.unwrap_or(env.default_duration_days()),
        })
    }
}

impl BalanceOfAll {
    /// Read every balance handle concurrently, then decrypt them in one session
    #[instrument(skip_all, fields(account = %self.account))]
    pub async fn execute(&self, env: &Environment) -> Result<Vec<TokenBalance>> {
        let handles = try_join_all(self.tokens.iter().map(|(_, token)| async move {
            env.contracts()
                .token(*token)
                .confidential_balance_of(self.account)
                .await
        }))
        .await?;

        let pairs: Vec<HandleContractPair> = handles
            .iter()
            .zip(&self.tokens)
            .map(|(handle, (_, token))| HandleContractPair::new(*handle, *token))
            .collect();
        let values = decrypt_handles(env, &pairs, self.duration_days).await?;

        let balances = self
            .tokens
            .iter()
            .zip(handles)
            .map(|((name, token), handle)| {
                let balance = values
                    .get(&handle)
                    .copied()
                    .with_context(|| format!("Decryption returned no value for {name}"))?;
                Ok::<_, anyhow::Error>(TokenBalance {
                    name: name.clone(),
                    token: *token,
                    handle,
                    balance,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("Read {} balances", balances.len());
        Ok(balances)
    }
}
