// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::{parse_amount, parse_token_amount};
use alloy::primitives::{Address, Bytes, U256};
use anyhow::Result;
use clap::Args;
use ctoken_ops::{
    BalanceOfAllParams, BalanceOfParams, Environment, IsOperatorParams, SetOperatorParams,
    TokenBalance, TransferAndCallParams, TransferParams, UnwrapParams, WrapParams,
};

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Confidential token. Defaults to the registered cUSDC
    #[arg(long)]
    pub token: Option<Address>,
    /// Account debited. Defaults to the signer
    #[arg(long)]
    pub from: Option<Address>,
    /// Recipient. Defaults to the configured relayer account
    #[arg(long)]
    pub to: Option<Address>,
    /// Amount, encrypted as a 64 bit integer
    #[arg(long, value_parser = parse_amount)]
    pub amount: Option<U256>,
}

#[derive(Args, Debug)]
pub struct TransferAndCallArgs {
    #[arg(long)]
    pub token: Option<Address>,
    /// Recipient contract. Defaults to the configured relayer account
    #[arg(long)]
    pub to: Option<Address>,
    #[arg(long, value_parser = parse_amount)]
    pub amount: Option<U256>,
    /// Calldata handed to the recipient
    #[arg(long)]
    pub data: Option<Bytes>,
}

#[derive(Args, Debug)]
pub struct UnwrapArgs {
    #[arg(long)]
    pub token: Option<Address>,
    #[arg(long)]
    pub from: Option<Address>,
    /// Receiver of the underlying. Defaults to the signer
    #[arg(long)]
    pub to: Option<Address>,
    #[arg(long, value_parser = parse_amount)]
    pub amount: Option<U256>,
}

#[derive(Args, Debug)]
pub struct WrapArgs {
    #[arg(long)]
    pub token: Option<Address>,
    #[arg(long)]
    pub to: Option<Address>,
    /// Plaintext amount of the underlying, in its smallest unit. Defaults to 10^18
    #[arg(long, value_parser = parse_token_amount)]
    pub amount: Option<U256>,
}

#[derive(Args, Debug)]
pub struct BalanceOfArgs {
    #[arg(long)]
    pub token: Option<Address>,
    /// Defaults to the configured user account, then the signer
    #[arg(long)]
    pub account: Option<Address>,
    /// How long the decryption authorization stays valid
    #[arg(long)]
    pub duration_days: Option<u64>,
}

#[derive(Args, Debug)]
pub struct BalanceOfAllArgs {
    /// Registry names of the tokens to read. Defaults to every confidential token
    #[arg(long = "token", value_delimiter = ',')]
    pub tokens: Vec<String>,
    #[arg(long)]
    pub account: Option<Address>,
    #[arg(long)]
    pub duration_days: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SetOperatorArgs {
    #[arg(long)]
    pub token: Option<Address>,
    /// Defaults to the registered FHEVMBridge
    #[arg(long)]
    pub spender: Option<Address>,
    /// Unix timestamp. Defaults to one year from now
    #[arg(long)]
    pub until: Option<u64>,
}

#[derive(Args, Debug)]
pub struct IsOperatorArgs {
    #[arg(long)]
    pub token: Option<Address>,
    #[arg(long)]
    pub holder: Option<Address>,
    #[arg(long)]
    pub spender: Option<Address>,
}

fn print_balance(balance: &TokenBalance) {
    if balance.name.is_empty() {
        println!("{}\t{}", balance.token, balance.balance);
    } else {
        println!("{}\t{}\t{}", balance.name, balance.token, balance.balance);
    }
}

pub async fn transfer(args: TransferArgs, env: &Environment) -> Result<()> {
    let tx = TransferParams {
        token: args.token,
        from: args.from,
        to: args.to,
        amount: args.amount,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn transfer_and_call(args: TransferAndCallArgs, env: &Environment) -> Result<()> {
    let tx = TransferAndCallParams {
        token: args.token,
        to: args.to,
        amount: args.amount,
        data: args.data,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn unwrap(args: UnwrapArgs, env: &Environment) -> Result<()> {
    let tx = UnwrapParams {
        token: args.token,
        from: args.from,
        to: args.to,
        amount: args.amount,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn wrap(args: WrapArgs, env: &Environment) -> Result<()> {
    let outcome = WrapParams {
        token: args.token,
        to: args.to,
        amount: args.amount,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    if let Some(approval) = outcome.approval {
        println!("approve {approval}");
    }
    println!("wrap {}", outcome.wrap);
    Ok(())
}

pub async fn balance_of(args: BalanceOfArgs, env: &Environment) -> Result<()> {
    let balance = BalanceOfParams {
        token: args.token,
        account: args.account,
        duration_days: args.duration_days,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    print_balance(&balance);
    Ok(())
}

pub async fn balance_of_all(args: BalanceOfAllArgs, env: &Environment) -> Result<()> {
    let tokens = (!args.tokens.is_empty()).then_some(args.tokens);
    let balances = BalanceOfAllParams {
        tokens,
        account: args.account,
        duration_days: args.duration_days,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    balances.iter().for_each(print_balance);
    Ok(())
}

pub async fn set_operator(args: SetOperatorArgs, env: &Environment) -> Result<()> {
    let tx = SetOperatorParams {
        token: args.token,
        spender: args.spender,
        until: args.until,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{tx}");
    Ok(())
}

pub async fn is_operator(args: IsOperatorArgs, env: &Environment) -> Result<()> {
    let is_operator = IsOperatorParams {
        token: args.token,
        holder: args.holder,
        spender: args.spender,
    }
    .resolve(env)?
    .execute(env)
    .await?;
    println!("{is_operator}");
    Ok(())
}
