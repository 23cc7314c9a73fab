// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod bridge;
mod contracts;
mod erc20;
mod token;

pub use bridge::*;
pub use contracts::*;
pub use erc20::*;
pub use token::*;

use alloy::primitives::{keccak256, TxHash};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique, made up transaction hash
pub fn next_tx_hash() -> TxHash {
    keccak256(TX_COUNTER.fetch_add(1, Ordering::Relaxed).to_be_bytes())
}

/// Log to the test writer, filtered by `RUST_LOG`. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
