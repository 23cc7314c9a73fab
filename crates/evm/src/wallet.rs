// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::contracts::WriteConnection;
use alloy::{hex::FromHex, primitives::FixedBytes, signers::local::PrivateKeySigner};
use anyhow::{anyhow, bail, Result};
use ctoken_config::ChainConfig;
use tracing::info;
use zeroize::Zeroizing;

/// Parse a hex private key, with or without the `0x` prefix
pub fn signer_from_hex(input: &Zeroizing<String>) -> Result<PrivateKeySigner> {
    let bytes = FixedBytes::<32>::from_hex(input.trim())
        .map_err(|e| anyhow!("Invalid private key: {}", e))?;
    PrivateKeySigner::from_bytes(&bytes).map_err(|e| anyhow!("Invalid private key: {}", e))
}

/// Connect to `chain` and make sure the node serves the chain id it is configured with
pub async fn connect_chain(chain: &ChainConfig, signer: PrivateKeySigner) -> Result<WriteConnection> {
    let rpc = chain.rpc_url()?;
    let connection = WriteConnection::connect(&rpc.as_http_url()?, signer).await?;
    let remote = connection.chain_id().await?;
    if remote != chain.chain_id {
        bail!(
            "Node at {} reports chain id {remote} but {} is configured as {}",
            rpc.url(),
            chain.name,
            chain.chain_id
        );
    }
    info!(
        "Connected to {} ({}) as {}",
        chain.name,
        chain.chain_id,
        connection.sender()
    );
    Ok(connection)
}
