// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::parse_amount;
use alloy::primitives::{Address, U256};
use anyhow::Result;
use clap::Args;
use ctoken_ops::{BridgeParams, Environment, SetChainIdToEidParams, SetPeerParams};

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Defaults to the registered FHEVMBridge
    #[arg(long)]
    pub bridge: Option<Address>,
    /// Token debited here. Defaults to the registered cUSDC
    #[arg(long)]
    pub input_token: Option<Address>,
    /// Token credited on the destination. Defaults to cUSDC registered there
    #[arg(long)]
    pub output_token: Option<Address>,
    /// Destination chain id. Defaults to 421614
    #[arg(long = "destination")]
    pub destination_chain_id: Option<u64>,
    /// Defaults to the signer
    #[arg(long)]
    pub receiver: Option<Address>,
    /// Defaults to the configured relayer account
    #[arg(long)]
    pub relayer: Option<Address>,
    #[arg(long, value_parser = parse_amount)]
    pub input_amount: Option<U256>,
    #[arg(long, value_parser = parse_amount)]
    pub output_amount: Option<U256>,
}

#[derive(Args, Debug)]
pub struct SetPeerArgs {
    #[arg(long)]
    pub bridge: Option<Address>,
    /// Endpoint id of the remote chain
    #[arg(long)]
    pub eid: u32,
    /// Bridge deployed on the remote chain
    #[arg(long)]
    pub peer: Address,
}

#[derive(Args, Debug)]
pub struct SetChainIdToEidArgs {
    #[arg(long)]
    pub bridge: Option<Address>,
    /// Remote chain id
    #[arg(long = "remote-chain-id")]
    pub chain_id: u64,
    #[arg(long)]
    pub eid: u32,
}

pub async fn bridge(args: BridgeArgs, env: &Environment) -> Result<()> {
    let tx = BridgeParams {
        bridge: args.bridge,
        input_token: args.input_token,
        output_token: args.output_token,
        destination_chain_id: args.destination_chain_id,
        receiver: args.receiver,
        relayer: args.relayer,
        input_amount: args.input_amount,
        output_amount: args.output_amount,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn set_peer(args: SetPeerArgs, env: &Environment) -> Result<()> {
    let tx = SetPeerParams {
        bridge: args.bridge,
        eid: args.eid,
        peer: args.peer,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn set_chain_id_to_eid(args: SetChainIdToEidArgs, env: &Environment) -> Result<()> {
    let tx = SetChainIdToEidParams {
        bridge: args.bridge,
        chain_id: args.chain_id,
        eid: args.eid,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}
