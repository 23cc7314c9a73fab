// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Ciphertext handle layout.
//!
//! A handle is an opaque `bytes32` as far as contracts are concerned. The coprocessor packs a few
//! fields into it which the client uses to sanity check encryption responses:
//!
//! ```text
//! [0..21]  hash
//! [21]     index of the value within its encrypted input
//! [22..30] chain id (big endian)
//! [30]     FheType id
//! [31]     handle version
//! ```

use crate::FheType;
use alloy::primitives::{keccak256, Address, B256};

pub type Handle = B256;

pub const HANDLE_VERSION: u8 = 0;

const HASH_LEN: usize = 21;
const INDEX_BYTE: usize = 21;
const CHAIN_ID_RANGE: std::ops::Range<usize> = 22..30;
const TYPE_BYTE: usize = 30;
const VERSION_BYTE: usize = 31;

/// Derive the handle for value `index` of an input identified by `input_hash`
pub fn compute_handle(input_hash: &B256, index: u8, chain_id: u64, ty: FheType) -> Handle {
    let digest = keccak256([input_hash.as_slice(), &[index]].concat());
    let mut bytes = [0u8; 32];
    bytes[..HASH_LEN].copy_from_slice(&digest[..HASH_LEN]);
    bytes[INDEX_BYTE] = index;
    bytes[CHAIN_ID_RANGE].copy_from_slice(&chain_id.to_be_bytes());
    bytes[TYPE_BYTE] = ty.id();
    bytes[VERSION_BYTE] = HANDLE_VERSION;
    B256::from(bytes)
}

/// Hash binding an input to its destination contract, submitter and chain
pub fn input_hash(contract: Address, user: Address, chain_id: u64, nonce: u64) -> B256 {
    keccak256(
        [
            contract.as_slice(),
            user.as_slice(),
            &chain_id.to_be_bytes(),
            &nonce.to_be_bytes(),
        ]
        .concat(),
    )
}

pub fn handle_index(handle: &Handle) -> u8 {
    handle[INDEX_BYTE]
}

pub fn handle_chain_id(handle: &Handle) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&handle[CHAIN_ID_RANGE]);
    u64::from_be_bytes(bytes)
}

pub fn handle_type(handle: &Handle) -> Option<FheType> {
    FheType::from_id(handle[TYPE_BYTE])
}

pub fn handle_version(handle: &Handle) -> u8 {
    handle[VERSION_BYTE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_fields() {
        let hash = input_hash(Address::repeat_byte(0xbb), Address::repeat_byte(0xaa), 31337, 7);
        let handle = compute_handle(&hash, 2, 31337, FheType::Uint32);

        assert_eq!(handle_index(&handle), 2);
        assert_eq!(handle_chain_id(&handle), 31337);
        assert_eq!(handle_type(&handle), Some(FheType::Uint32));
        assert_eq!(handle_version(&handle), HANDLE_VERSION);

        let other = compute_handle(&hash, 3, 31337, FheType::Uint32);
        assert_ne!(handle, other);
    }
}
