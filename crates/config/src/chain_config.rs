// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::rpc::RPC;
use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named accounts a chain's operations default to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountRole {
    Deployer,
    User,
    Relayer,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Deployer => write!(f, "deployer"),
            AccountRole::User => write!(f, "user"),
            AccountRole::Relayer => write!(f, "relayer"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Accounts {
    pub deployer: Option<Address>,
    pub user: Option<Address>,
    pub relayer: Option<Address>,
}

impl Accounts {
    pub fn get(&self, role: AccountRole) -> Option<Address> {
        match role {
            AccountRole::Deployer => self.deployer,
            AccountRole::User => self.user,
            AccountRole::Relayer => self.relayer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Deployed contracts by name, eg. `cUSDC` or `FHEVMBridge`
    #[serde(default)]
    pub contracts: BTreeMap<String, Address>,
    #[serde(default)]
    pub accounts: Accounts,
}

impl ChainConfig {
    pub fn rpc_url(&self) -> Result<RPC> {
        RPC::from_url(&self.rpc_url)
            .map_err(|e| anyhow!("Failed to parse RPC URL for chain {}: {}", self.name, e))
    }
}
