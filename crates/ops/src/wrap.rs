// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::environment::{Environment, DEFAULT_TOKEN};
use alloy::primitives::{Address, TxHash, U256};
use anyhow::{Context, Result};
use tracing::{info, instrument};

/// 1 token of an 18 decimals underlying
pub const DEFAULT_WRAP_AMOUNT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone, Default)]
pub struct WrapParams {
    pub token: Option<Address>,
    pub to: Option<Address>,
    pub amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrap {
    pub token: Address,
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOutcome {
    pub underlying: Address,
    /// Set when the allowance had to be raised first
    pub approval: Option<TxHash>,
    pub wrap: TxHash,
}

impl WrapParams {
    pub fn resolve(self, env: &Environment) -> Result<Wrap> {
        Ok(Wrap {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            to: self.to.unwrap_or(env.signer_address()),
            amount: self.amount.unwrap_or(DEFAULT_WRAP_AMOUNT),
        })
    }
}

impl Wrap {
    /// Approve the token to pull the underlying when the allowance is short, then `wrap`
    #[instrument(skip_all, fields(token = %self.token, to = %self.to))]
    pub async fn execute(&self, env: &Environment) -> Result<WrapOutcome> {
        let token = env.contracts().token(self.token);
        let underlying = token
            .underlying()
            .await
            .context("Could not read the underlying token")?;
        let erc20 = env.contracts().erc20(underlying);

        let allowance = erc20.allowance(env.signer_address(), self.token).await?;
        let approval = if allowance < self.amount {
            info!("Allowance {allowance} is below {}, approving", self.amount);
            Some(erc20.approve(self.token, self.amount).await?)
        } else {
            None
        };

        let wrap = token.wrap(self.to, self.amount).await?;
        Ok(WrapOutcome {
            underlying,
            approval,
            wrap,
        })
    }
}
