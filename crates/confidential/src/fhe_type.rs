// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encrypted value types understood by the coprocessor.
///
/// The discriminants are the type ids encoded in byte 30 of every ciphertext handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Address,
    Uint256,
}

impl FheType {
    pub const ALL: [FheType; 8] = [
        FheType::Bool,
        FheType::Uint8,
        FheType::Uint16,
        FheType::Uint32,
        FheType::Uint64,
        FheType::Uint128,
        FheType::Address,
        FheType::Uint256,
    ];

    /// Number of plaintext bits this type packs into an input
    pub fn bits(&self) -> usize {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Address => 160,
            FheType::Uint256 => 256,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
            FheType::Uint128 => 6,
            FheType::Address => 7,
            FheType::Uint256 => 8,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.id() == id)
    }

    /// Look up the type for a plain bit width, eg. `64` -> `Uint64`
    pub fn from_bits(bits: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.bits() == bits)
    }

    /// Largest plaintext representable by this type
    pub fn max_value(&self) -> U256 {
        if self.bits() == 256 {
            U256::MAX
        } else {
            (U256::from(1) << self.bits()) - U256::from(1)
        }
    }

    pub fn fits(&self, value: &U256) -> bool {
        *value <= self.max_value()
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FheType::Bool => write!(f, "ebool"),
            FheType::Address => write!(f, "eaddress"),
            other => write!(f, "euint{}", other.bits()),
        }
    }
}
