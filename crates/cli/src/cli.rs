// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::bridge::{self, BridgeArgs, SetChainIdToEidArgs, SetPeerArgs};
use crate::helpers::ensure_hex_zeroizing;
use crate::helpers::telemetry::setup_simple_tracing;
use crate::token::{
    self, BalanceOfAllArgs, BalanceOfArgs, IsOperatorArgs, SetOperatorArgs, TransferAndCallArgs,
    TransferArgs, UnwrapArgs, WrapArgs,
};
use anyhow::{bail, Context, Result};
use clap::{command, ArgAction, Parser, Subcommand};
use ctoken_config::{load_config, AppConfig};
use ctoken_ops::Environment;
use std::path::PathBuf;
use tracing::{info, instrument, Level};
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(name = "ctoken")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")"))]
#[command(about = "Transfer, wrap, decrypt and bridge confidential tokens", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `ctoken -vvv` will give you
    /// trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,

    /// Chain to operate on, by configured name or chain id. May be omitted when only one chain
    /// is configured
    #[arg(long, global = true)]
    chain: Option<String>,

    /// Signing key as 0x prefixed hex
    #[arg(
        long = "private-key",
        env = "CTOKEN_PRIVATE_KEY",
        hide_env_values = true,
        global = true,
        value_parser = ensure_hex_zeroizing
    )]
    private_key: Option<Zeroizing<String>>,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(self) -> Result<()> {
        setup_simple_tracing(self.log_level());

        let config = load_config(self.config.as_deref())?;
        info!("Config loaded from: {:?}", config.config_file());

        let chain_id = self.chain_id(&config)?;
        let Some(private_key) = self.private_key.as_ref() else {
            bail!("A signing key is required. Pass --private-key or set CTOKEN_PRIVATE_KEY.");
        };
        let env = Environment::connect(&config, chain_id, private_key).await?;

        match self.command {
            Commands::Transfer(args) => token::transfer(args, &env).await?,
            Commands::TransferAndCall(args) => token::transfer_and_call(args, &env).await?,
            Commands::Unwrap(args) => token::unwrap(args, &env).await?,
            Commands::Wrap(args) => token::wrap(args, &env).await?,
            Commands::BalanceOf(args) => token::balance_of(args, &env).await?,
            Commands::BalanceOfAll(args) => token::balance_of_all(args, &env).await?,
            Commands::SetOperator(args) => token::set_operator(args, &env).await?,
            Commands::IsOperator(args) => token::is_operator(args, &env).await?,
            Commands::Bridge(args) => bridge::bridge(args, &env).await?,
            Commands::SetPeer(args) => bridge::set_peer(args, &env).await?,
            Commands::SetChainIdToEid(args) => bridge::set_chain_id_to_eid(args, &env).await?,
        }

        Ok(())
    }

    fn chain_id(&self, config: &AppConfig) -> Result<u64> {
        let Some(chain) = &self.chain else {
            return match config.chains() {
                [only] => Ok(only.chain_id),
                [] => bail!("No chains are configured"),
                _ => bail!("Several chains are configured; pick one with --chain"),
            };
        };
        if let Some(named) = config.chain_by_name(chain) {
            return Ok(named.chain_id);
        }
        let chain_id: u64 = chain
            .parse()
            .with_context(|| format!("Unknown chain `{chain}`"))?;
        config.chain(chain_id)?;
        Ok(chain_id)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send an encrypted amount with `confidentialTransferFrom`
    Transfer(TransferArgs),

    /// Send an encrypted amount to a contract and notify it
    TransferAndCall(TransferAndCallArgs),

    /// Turn confidential balance back into the underlying token
    Unwrap(UnwrapArgs),

    /// Deposit the underlying token for confidential balance
    Wrap(WrapArgs),

    /// Decrypt one confidential balance
    BalanceOf(BalanceOfArgs),

    /// Decrypt the balances of every confidential token in one authorization
    BalanceOfAll(BalanceOfAllArgs),

    /// Allow a spender to move your confidential balance until a deadline
    SetOperator(SetOperatorArgs),

    /// Check whether a spender may move a holder's balance
    IsOperator(IsOperatorArgs),

    /// Send confidential tokens to another chain
    Bridge(BridgeArgs),

    /// Register the bridge deployed on a remote endpoint
    SetPeer(SetPeerArgs),

    /// Map a chain id to its messaging endpoint id
    SetChainIdToEid(SetChainIdToEidArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transfer() -> Result<()> {
        let cli = Cli::try_parse_from([
            "ctoken",
            "--chain",
            "sepolia",
            "transfer",
            "--amount",
            "1_000_000",
            "--to",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        ])?;
        assert_eq!(cli.chain.as_deref(), Some("sepolia"));
        let Commands::Transfer(args) = cli.command else {
            bail!("transfer expected");
        };
        assert_eq!(args.amount, Some(alloy::primitives::U256::from(1_000_000)));
        assert!(args.token.is_none());
        Ok(())
    }

    #[test]
    fn test_amount_out_of_range_rejected() {
        let result = Cli::try_parse_from([
            "ctoken",
            "bridge",
            "--input-amount",
            "18446744073709551616",
        ]);
        assert!(result.is_err());
    }
}
