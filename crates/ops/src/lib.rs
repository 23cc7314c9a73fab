// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Confidential token operations. Each takes a params struct with optional fields, resolves it
//! against an [`Environment`] into a fully specified operation, and executes that.

mod balance;
mod bridge;
mod decrypt;
mod environment;
mod operator;
mod transfer;
mod wrap;

pub use balance::*;
pub use bridge::*;
pub use decrypt::*;
pub use environment::*;
pub use operator::*;
pub use transfer::{
    Transfer, TransferAndCall, TransferAndCallParams, TransferParams, Unwrap, UnwrapParams,
    DEFAULT_TRANSFER_AMOUNT,
};
pub use wrap::*;
