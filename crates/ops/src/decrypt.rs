// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::environment::Environment;
use alloy::primitives::{B256, U256};
use anyhow::Result;
use ctoken_confidential::{DecryptOptions, Handle, HandleContractPair};
use ctoken_evm::{retry_with_backoff, to_failure, to_retry};
use std::collections::HashMap;
use tracing::debug;

pub const DECRYPT_MAX_ATTEMPTS: u32 = 3;
pub const DECRYPT_INITIAL_DELAY_MS: u64 = 1000;

/// Decrypt `pairs` for the environment's signer.
///
/// A zero handle is a balance that was never written and reads as 0 without asking the service.
/// Only an unavailable service is retried, each attempt with a new session.
pub async fn decrypt_handles(
    env: &Environment,
    pairs: &[HandleContractPair],
    duration_days: u64,
) -> Result<HashMap<Handle, U256>> {
    let (zero, pending): (Vec<&HandleContractPair>, Vec<&HandleContractPair>) = pairs.iter().partition(|p| p.handle == B256::ZERO);
    let mut values: HashMap<Handle, U256> = zero.iter().map(|p| (p.handle, U256::ZERO)).collect();
    if pending.is_empty() {
        debug!("All handles are uninitialised");
        return Ok(values);
    }

    let options = DecryptOptions { duration_days };
    let result = retry_with_backoff(
        || {
            let pending: Vec<HandleContractPair> = pending.iter().map(|p| **p).collect();
            async move {
                env.client()
                    .user_decrypt(pending, env.signer(), options)
                    .await
                    .map_err(|e| {
                        if e.is_retryable() {
                            to_retry(e)
                        } else {
                            to_failure(e)
                        }
                    })
            }
        },
        DECRYPT_MAX_ATTEMPTS,
        DECRYPT_INITIAL_DELAY_MS,
    )
    .await?;

    values.extend(result.into_inner());
    Ok(values)
}
