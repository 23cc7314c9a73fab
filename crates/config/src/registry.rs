// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::chain_config::{AccountRole, Accounts, ChainConfig};
use alloy_primitives::Address;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No address for `{name}` on chain {chain}; pass it explicitly or add it to the registry")]
    UnresolvedAddress { name: String, chain: String },
    #[error("Chain {0} is not configured")]
    UnknownChain(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChainEntry {
    name: String,
    contracts: BTreeMap<String, Address>,
    accounts: Accounts,
}

/// Contract addresses and named accounts of every configured chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractRegistry {
    chains: BTreeMap<u64, ChainEntry>,
}

impl ContractRegistry {
    pub fn from_chains(chains: &[ChainConfig]) -> Self {
        let mut registry = Self::default();
        for chain in chains {
            registry.chains.insert(
                chain.chain_id,
                ChainEntry {
                    name: chain.name.clone(),
                    contracts: chain.contracts.clone(),
                    accounts: chain.accounts.clone(),
                },
            );
        }
        registry
    }

    /// Register `address` as `name` on `chain_id`
    pub fn insert(&mut self, chain_id: u64, name: &str, address: Address) -> &mut Self {
        self.chains
            .entry(chain_id)
            .or_insert_with(|| ChainEntry {
                name: chain_id.to_string(),
                ..Default::default()
            })
            .contracts
            .insert(name.to_string(), address);
        self
    }

    pub fn set_account(&mut self, chain_id: u64, role: AccountRole, address: Address) -> &mut Self {
        let accounts = &mut self
            .chains
            .entry(chain_id)
            .or_insert_with(|| ChainEntry {
                name: chain_id.to_string(),
                ..Default::default()
            })
            .accounts;
        match role {
            AccountRole::Deployer => accounts.deployer = Some(address),
            AccountRole::User => accounts.user = Some(address),
            AccountRole::Relayer => accounts.relayer = Some(address),
        }
        self
    }

    pub fn chain_name(&self, chain_id: u64) -> Result<&str, RegistryError> {
        self.chains
            .get(&chain_id)
            .map(|c| c.name.as_str())
            .ok_or(RegistryError::UnknownChain(chain_id))
    }

    fn describe(&self, chain_id: u64) -> String {
        match self.chains.get(&chain_id) {
            Some(entry) if entry.name != chain_id.to_string() => {
                format!("{} ({chain_id})", entry.name)
            }
            _ => chain_id.to_string(),
        }
    }

    pub fn address(&self, chain_id: u64, name: &str) -> Result<Address, RegistryError> {
        self.chains
            .get(&chain_id)
            .and_then(|c| c.contracts.get(name))
            .copied()
            .ok_or_else(|| RegistryError::UnresolvedAddress {
                name: name.to_string(),
                chain: self.describe(chain_id),
            })
    }

    pub fn account(&self, chain_id: u64, role: AccountRole) -> Result<Address, RegistryError> {
        self.chains
            .get(&chain_id)
            .and_then(|c| c.accounts.get(role))
            .ok_or_else(|| RegistryError::UnresolvedAddress {
                name: format!("{role} account"),
                chain: self.describe(chain_id),
            })
    }

    /// Registry name of `address` on `chain_id`
    pub fn name_of(&self, chain_id: u64, address: Address) -> Option<&str> {
        self.chains.get(&chain_id).and_then(|c| {
            c.contracts
                .iter()
                .find(|(_, registered)| **registered == address)
                .map(|(name, _)| name.as_str())
        })
    }

    /// Contracts registered on `chain_id` whose name starts with `prefix`
    pub fn contracts_with_prefix(&self, chain_id: u64, prefix: &str) -> Vec<(String, Address)> {
        self.chains
            .get(&chain_id)
            .map(|c| {
                c.contracts
                    .iter()
                    .filter(|(name, _)| name.starts_with(prefix))
                    .map(|(name, address)| (name.clone(), *address))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_unresolved() {
        let mut registry = ContractRegistry::default();
        registry
            .insert(11155111, "cUSDC", Address::repeat_byte(1))
            .insert(11155111, "FHEVMBridge", Address::repeat_byte(2));
        registry.set_account(11155111, AccountRole::Relayer, Address::repeat_byte(3));

        assert_eq!(registry.address(11155111, "cUSDC"), Ok(Address::repeat_byte(1)));
        assert_eq!(
            registry.account(11155111, AccountRole::Relayer),
            Ok(Address::repeat_byte(3))
        );
        assert_eq!(
            registry.address(421614, "cUSDC"),
            Err(RegistryError::UnresolvedAddress {
                name: "cUSDC".to_string(),
                chain: "421614".to_string()
            })
        );
        assert!(matches!(
            registry.account(11155111, AccountRole::User),
            Err(RegistryError::UnresolvedAddress { .. })
        ));
        assert_eq!(
            registry.contracts_with_prefix(11155111, "c"),
            vec![("cUSDC".to_string(), Address::repeat_byte(1))]
        );
        assert_eq!(registry.name_of(11155111, Address::repeat_byte(2)), Some("FHEVMBridge"));
        assert_eq!(registry.name_of(11155111, Address::repeat_byte(9)), None);
        assert_eq!(registry.name_of(421614, Address::repeat_byte(1)), None);
    }
}
