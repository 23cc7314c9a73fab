// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::environment::{Environment, BRIDGE_CONTRACT, DEFAULT_TOKEN};
use alloy::primitives::{Address, TxHash};
use anyhow::Result;
use ctoken_confidential::SECONDS_PER_DAY;
use tracing::instrument;

pub const DEFAULT_OPERATOR_DAYS: u64 = 365;

#[derive(Debug, Clone, Default)]
pub struct SetOperatorParams {
    pub token: Option<Address>,
    pub spender: Option<Address>,
    /// Unix timestamp the approval lasts until
    pub until: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOperator {
    pub token: Address,
    pub spender: Address,
    pub until: u64,
}

impl SetOperatorParams {
    pub fn resolve(self, env: &Environment) -> Result<SetOperator> {
        Ok(SetOperator {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            spender: env.contract_or(self.spender, BRIDGE_CONTRACT)?,
            until: self
                .until
                .unwrap_or(env.now() + DEFAULT_OPERATOR_DAYS * SECONDS_PER_DAY),
        })
    }
}

impl SetOperator {
    #[instrument(skip_all, fields(token = %self.token, spender = %self.spender))]
    pub async fn execute(&self, env: &Environment) -> Result<TxHash> {
        env.contracts()
            .token(self.token)
            .set_operator(self.spender, self.until)
            .await
    }
}

#[derive(Debug, Clone, Default)]
pub struct IsOperatorParams {
    pub token: Option<Address>,
    pub holder: Option<Address>,
    pub spender: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsOperator {
    pub token: Address,
    pub holder: Address,
    pub spender: Address,
}

impl IsOperatorParams {
    pub fn resolve(self, env: &Environment) -> Result<IsOperator> {
        Ok(IsOperator {
            token: env.contract_or(self.token, DEFAULT_TOKEN)?,
            holder: self.holder.unwrap_or(env.signer_address()),
            spender: self.spender.unwrap_or(env.signer_address()),
        })
    }
}

impl IsOperator {
    pub async fn execute(&self, env: &Environment) -> Result<bool> {
        env.contracts()
            .token(self.token)
            .is_operator(self.holder, self.spender)
            .await
    }
}
