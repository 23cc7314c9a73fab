// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

pub enum RetryError {
    Failure(anyhow::Error),
    Retry(anyhow::Error),
}

pub fn to_retry(e: impl Into<anyhow::Error>) -> RetryError {
    RetryError::Retry(e.into())
}

pub fn to_failure(e: impl Into<anyhow::Error>) -> RetryError {
    RetryError::Failure(e.into())
}

pub const TX_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const TX_RETRY_INITIAL_DELAY_MS: u64 = 2000;

/// Node errors that clear up once the pending nonce catches up
pub const NONCE_ERRORS: &[&str] = &["nonce too low", "replacement transaction underpriced"];

/// Retries an async operation with exponential backoff
///
/// # Arguments
/// * `operation` - Async function to retry
/// * `max_attempts` - Maximum number of attempts, including the first
/// * `initial_delay_ms` - Initial delay between attempts in milliseconds
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    max_attempts: u32,
    initial_delay_ms: u64,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let mut current_attempt = 1;
    let mut delay_ms = initial_delay_ms;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Retry(e)) => {
                if current_attempt >= max_attempts {
                    return Err(e.context(format!(
                        "Operation failed after {} attempts",
                        max_attempts
                    )));
                }

                warn!(
                    "Attempt {}/{} failed, retrying in {}ms: {}",
                    current_attempt, max_attempts, delay_ms, e
                );

                sleep(Duration::from_millis(delay_ms)).await;
                current_attempt += 1;
                delay_ms *= 2;
            }
            Err(RetryError::Failure(e)) => {
                error!("Giving up without retry: {}", e);
                return Err(e);
            }
        }
    }
}

fn should_retry_error(error: &str, retry_on_errors: &[&str]) -> bool {
    retry_on_errors.iter().any(|code| error.contains(code))
}

/// Send a transaction, retrying when the node reports one of `retry_on_errors`
pub async fn send_tx_with_retry<F, Fut, T>(
    operation_name: &str,
    retry_on_errors: &[&str],
    tx_fn: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(
        || {
            let fut = tx_fn();
            async move {
                fut.await.map_err(|e| {
                    if should_retry_error(&format!("{e:#}"), retry_on_errors) {
                        warn!("{}: will retry: {}", operation_name, e);
                        RetryError::Retry(e)
                    } else {
                        RetryError::Failure(e)
                    }
                })
            }
        },
        TX_RETRY_MAX_ATTEMPTS,
        TX_RETRY_INITIAL_DELAY_MS,
    )
    .await
}
