// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! EIP-712 authorization for user decryption.
//! WARNING: any change to the typed structure below is a breaking change for the service.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;

pub const DECRYPTION_DOMAIN_NAME: &str = "Decryption";
pub const DECRYPTION_DOMAIN_VERSION: &str = "1";
pub const SECONDS_PER_DAY: u64 = 86_400;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }
}

/// Where the decryption authorization is verified: the gateway chain and its decryption contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl DecryptionDomain {
    pub fn eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed(DECRYPTION_DOMAIN_NAME)),
            Some(Cow::Borrowed(DECRYPTION_DOMAIN_VERSION)),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// Validity interval of a signed authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationWindow {
    /// Unix seconds
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl AuthorizationWindow {
    pub fn end_timestamp(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn contains(&self, now: u64) -> bool {
        now >= self.start_timestamp && now <= self.end_timestamp()
    }
}

/// Source of the current time, in unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// A fully built authorization message together with its domain
#[derive(Debug, Clone)]
pub struct UserDecryptAuthorization {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl UserDecryptAuthorization {
    /// Build the message for `public_key` over `contracts` within `window`.
    ///
    /// Contract addresses are de-duplicated and sorted, so any ordering of the same contract set
    /// produces the same message and signing hash.
    pub fn new<I>(
        domain: &DecryptionDomain,
        public_key: &[u8],
        contracts: I,
        window: AuthorizationWindow,
    ) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        let contract_addresses: Vec<Address> = contracts
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            domain: domain.eip712(),
            message: UserDecryptRequestVerification {
                publicKey: Bytes::copy_from_slice(public_key),
                contractAddresses: contract_addresses,
                startTimestamp: U256::from(window.start_timestamp),
                durationDays: U256::from(window.duration_days),
                extraData: Bytes::new(),
            },
        }
    }

    pub fn contract_addresses(&self) -> &[Address] {
        &self.message.contractAddresses
    }

    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }
}
