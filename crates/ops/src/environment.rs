// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Result};
use ctoken_config::{AccountRole, AppConfig, ContractRegistry, RegistryError};
use ctoken_confidential::{
    Clock, ConfidentialClient, ConfidentialService, DecryptionDomain, LocalCoprocessor, RelayerClient,
};
use ctoken_evm::{connect_chain, signer_from_hex, ContractSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Registry name of the default token
pub const DEFAULT_TOKEN: &str = "cUSDC";
/// Registry name of the bridge contract
pub const BRIDGE_CONTRACT: &str = "FHEVMBridge";

/// Everything an operation needs: who signs, on which chain, where contracts live and how to
/// reach them.
///
/// Time is read from the client's clock, so operation deadlines and decryption windows agree.
#[derive(Clone)]
pub struct Environment {
    signer: Arc<PrivateKeySigner>,
    chain_id: u64,
    registry: ContractRegistry,
    client: ConfidentialClient,
    contracts: Arc<dyn ContractSet>,
    default_duration_days: u64,
}

impl Environment {
    pub fn new(
        signer: PrivateKeySigner,
        chain_id: u64,
        registry: ContractRegistry,
        client: ConfidentialClient,
        contracts: Arc<dyn ContractSet>,
    ) -> Self {
        Self {
            signer: Arc::new(signer),
            chain_id,
            registry,
            client,
            contracts,
            default_duration_days: 10,
        }
    }

    pub fn with_default_duration_days(mut self, days: u64) -> Self {
        self.default_duration_days = days;
        self
    }

    /// Connect to `chain_id` as described by `config`, signing with `private_key`.
    ///
    /// Without a relayer url an in-process coprocessor stands in, which is only accepted for
    /// nodes on the local machine.
    pub async fn connect(
        config: &AppConfig,
        chain_id: u64,
        private_key: &Zeroizing<String>,
    ) -> Result<Self> {
        let chain = config.chain(chain_id)?;
        let signer = signer_from_hex(private_key)?;
        let connection = connect_chain(chain, signer.clone()).await?;

        let domain = DecryptionDomain {
            chain_id: config.decryption.gateway_chain_id.unwrap_or(chain_id),
            verifying_contract: config.decryption.verifying_contract,
        };
        let service: Arc<dyn ConfidentialService> = match config.relayer.url()? {
            Some(url) => {
                info!("Using relayer at {url}");
                Arc::new(RelayerClient::new(
                    url,
                    Duration::from_millis(config.relayer.timeout_ms),
                )?)
            }
            None => {
                if !chain.rpc_url()?.is_local() {
                    bail!(
                        "No relayer configured for {}. Set `relayer.url` or CTOKEN_RELAYER__URL",
                        chain.name
                    );
                }
                warn!("No relayer configured; using an in-process coprocessor");
                Arc::new(LocalCoprocessor::new(chain_id).with_domain(domain))
            }
        };

        Ok(Self::new(
            signer,
            chain_id,
            config.registry(),
            ConfidentialClient::new(service, chain_id, domain),
            Arc::new(connection),
        )
        .with_default_duration_days(config.decryption.default_duration_days))
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    pub fn client(&self) -> &ConfidentialClient {
        &self.client
    }

    pub fn contracts(&self) -> &Arc<dyn ContractSet> {
        &self.contracts
    }

    pub fn now(&self) -> u64 {
        self.client.clock().now()
    }

    pub fn default_duration_days(&self) -> u64 {
        self.default_duration_days
    }

    /// Explicit address, else the registry entry `name` on this chain
    pub fn contract_or(&self, explicit: Option<Address>, name: &str) -> Result<Address, RegistryError> {
        match explicit {
            Some(address) => Ok(address),
            None => self.registry.address(self.chain_id, name),
        }
    }

    /// Explicit address, else the configured account for `role` on this chain
    pub fn account_or(
        &self,
        explicit: Option<Address>,
        role: AccountRole,
    ) -> Result<Address, RegistryError> {
        match explicit {
            Some(address) => Ok(address),
            None => self.registry.account(self.chain_id, role),
        }
    }
}
