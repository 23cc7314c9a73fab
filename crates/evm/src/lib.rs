// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

pub mod contracts;
pub mod retry;
mod wallet;

pub use contracts::{
    peer_from_address, BridgeRequest, BridgeWrite, ContractSet, Erc20, EvmContract, TokenRead,
    TokenWrite, WriteConnection,
};
pub use retry::{retry_with_backoff, to_failure, to_retry, RetryError};
pub use wallet::*;
