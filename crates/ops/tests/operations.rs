// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Result};
use ctoken_config::{AccountRole, ContractRegistry, RegistryError};
use ctoken_confidential::{Clock, ConfidentialClient, ConfidentialService, LocalCoprocessor};
use ctoken_evm::Erc20;
use ctoken_ops::*;
use ctoken_test_helpers::{init_test_logging, MockContracts, TokenCall};
use std::sync::Arc;

const CHAIN_ID: u64 = 31337;
const DESTINATION: u64 = 421614;

const USDC: Address = Address::new([0xc1; 20]);
const DAI: Address = Address::new([0xc2; 20]);
const USDC_UNDERLYING: Address = Address::new([0xe1; 20]);
const DAI_UNDERLYING: Address = Address::new([0xe2; 20]);
const BRIDGE: Address = Address::new([0xb0; 20]);
const DESTINATION_USDC: Address = Address::new([0xd1; 20]);
const RELAYER: Address = Address::new([0x70; 20]);

struct Fixture {
    env: Environment,
    contracts: Arc<MockContracts>,
    coprocessor: Arc<LocalCoprocessor>,
    user: Address,
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

fn setup() -> Fixture {
    setup_with(|coprocessor| {
        let service: Arc<dyn ConfidentialService> = coprocessor.clone();
        ConfidentialClient::new(service, CHAIN_ID, *coprocessor.domain())
    })
}

fn setup_with(client: impl FnOnce(&Arc<LocalCoprocessor>) -> ConfidentialClient) -> Fixture {
    init_test_logging();
    let signer = PrivateKeySigner::random();
    let user = signer.address();
    let coprocessor = Arc::new(LocalCoprocessor::new(CHAIN_ID));
    let contracts = Arc::new(MockContracts::new(user, coprocessor.clone()));
    contracts.deploy_token(USDC, USDC_UNDERLYING);
    contracts.deploy_token(DAI, DAI_UNDERLYING);
    contracts.deploy_bridge(BRIDGE);

    let mut registry = ContractRegistry::default();
    registry
        .insert(CHAIN_ID, "cUSDC", USDC)
        .insert(CHAIN_ID, "cDAI", DAI)
        .insert(CHAIN_ID, "FHEVMBridge", BRIDGE)
        .insert(DESTINATION, "cUSDC", DESTINATION_USDC);
    registry.set_account(CHAIN_ID, AccountRole::Relayer, RELAYER);

    let client = client(&coprocessor);
    let env = Environment::new(signer, CHAIN_ID, registry, client, contracts.clone());
    Fixture {
        env,
        contracts,
        coprocessor,
        user,
    }
}

impl Fixture {
    async fn mint(&self, token: Address, amount: u64) -> Result<()> {
        let Some(token) = self.contracts.mock_token(token) else {
            bail!("token {token} not deployed");
        };
        token.mint(self.user, U256::from(amount)).await;
        Ok(())
    }

    async fn balance(&self, token: Address, account: Address) -> Result<U256> {
        let Some(token) = self.contracts.mock_token(token) else {
            bail!("token {token} not deployed");
        };
        Ok(token.balance(account).await)
    }
}

#[tokio::test]
async fn test_transfer_with_defaults() -> Result<()> {
    let fx = setup();
    fx.mint(USDC, 5_000_000).await?;

    let transfer = TransferParams::default().resolve(&fx.env)?;
    assert_eq!(
        transfer,
        Transfer {
            token: USDC,
            from: fx.user,
            to: RELAYER,
            amount: U256::from(1_000_000),
        }
    );
    transfer.execute(&fx.env).await?;

    assert_eq!(fx.balance(USDC, fx.user).await?, U256::from(4_000_000));
    assert_eq!(fx.balance(USDC, RELAYER).await?, U256::from(1_000_000));
    Ok(())
}

#[tokio::test]
async fn test_transfer_and_call_and_unwrap() -> Result<()> {
    let fx = setup();
    fx.mint(USDC, 3_000_000).await?;

    TransferAndCallParams {
        amount: Some(U256::from(500_000)),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;

    UnwrapParams::default()
        .resolve(&fx.env)?
        .execute(&fx.env)
        .await?;

    let Some(token) = fx.contracts.mock_token(USDC) else {
        bail!("token not deployed");
    };
    assert_eq!(
        token.calls().await,
        vec![
            TokenCall::TransferAndCall {
                to: RELAYER,
                transferred: U256::from(500_000),
                data: Bytes::new(),
            },
            TokenCall::Unwrap {
                from: fx.user,
                to: fx.user,
                amount: U256::from(1_000_000),
            },
        ]
    );
    assert_eq!(fx.balance(USDC, fx.user).await?, U256::from(1_500_000));
    assert_eq!(
        token.underlying_token().balance_of(fx.user).await,
        U256::from(1_000_000)
    );
    Ok(())
}

#[tokio::test]
async fn test_balance_of_decrypts() -> Result<()> {
    let fx = setup();
    fx.mint(USDC, 1_000_000).await?;

    let balance = BalanceOfParams::default()
        .resolve(&fx.env)?
        .execute(&fx.env)
        .await?;
    assert_eq!(balance.balance, U256::from(1_000_000));
    assert_eq!(balance.token, USDC);
    assert_eq!(balance.name, "cUSDC");
    assert_eq!(fx.coprocessor.decrypt_requests().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_decryption_is_not_retried() -> Result<()> {
    // decryption authorized for a chain the coprocessor does not serve
    let fx = setup_with(|coprocessor| {
        let service: Arc<dyn ConfidentialService> = coprocessor.clone();
        ConfidentialClient::new(service, 1, *coprocessor.domain())
    });
    fx.mint(USDC, 1_000_000).await?;

    let result = BalanceOfParams::default()
        .resolve(&fx.env)?
        .execute(&fx.env)
        .await;
    assert!(result.is_err());
    assert_eq!(fx.coprocessor.decrypt_requests().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_uninitialised_balance_reads_zero_without_decryption() -> Result<()> {
    let fx = setup();

    let balance = BalanceOfParams {
        token: Some(DAI),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    assert_eq!(balance.balance, U256::ZERO);
    assert!(balance.handle.is_zero());
    assert_eq!(balance.name, "cDAI");

    let unregistered = Address::new([0xc3; 20]);
    fx.contracts.deploy_token(unregistered, DAI_UNDERLYING);
    let balance = BalanceOfParams {
        token: Some(unregistered),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    assert_eq!(balance.name, "");
    assert_eq!(fx.coprocessor.decrypt_requests().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_balance_of_all_uses_one_session() -> Result<()> {
    let fx = setup();
    fx.mint(USDC, 5_000_000).await?;
    fx.mint(DAI, 42).await?;

    let balances = BalanceOfAllParams::default()
        .resolve(&fx.env)?
        .execute(&fx.env)
        .await?;
    let named: Vec<(String, U256)> = balances
        .into_iter()
        .map(|b| (b.name, b.balance))
        .collect();
    assert_eq!(
        named,
        vec![
            ("cDAI".to_string(), U256::from(42)),
            ("cUSDC".to_string(), U256::from(5_000_000)),
        ]
    );
    assert_eq!(fx.coprocessor.decrypt_requests().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_wrap_approves_only_when_short() -> Result<()> {
    let fx = setup();
    let underlying = fx.contracts.deploy_erc20(USDC_UNDERLYING);
    underlying.mint(fx.user, DEFAULT_WRAP_AMOUNT * U256::from(2)).await;

    let first = WrapParams::default()
        .resolve(&fx.env)?
        .execute(&fx.env)
        .await?;
    assert_eq!(first.underlying, USDC_UNDERLYING);
    assert!(first.approval.is_some());
    assert_eq!(fx.balance(USDC, fx.user).await?, DEFAULT_WRAP_AMOUNT);

    underlying.approve(USDC, U256::from(1_000)).await?;
    let second = WrapParams {
        amount: Some(U256::from(100)),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    assert!(second.approval.is_none());
    assert_eq!(underlying.approvals().await, 2);
    assert_eq!(
        underlying.allowance(fx.user, USDC).await?,
        U256::from(900)
    );
    Ok(())
}

#[tokio::test]
async fn test_set_operator_defaults_to_bridge() -> Result<()> {
    let fx = setup();

    let set = SetOperatorParams::default().resolve(&fx.env)?;
    assert_eq!(set.spender, BRIDGE);
    assert!(set.until > fx.env.now() + 364 * 86_400);
    set.execute(&fx.env).await?;

    let is_operator = IsOperatorParams {
        spender: Some(BRIDGE),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    assert!(is_operator);

    let stranger = IsOperatorParams {
        spender: Some(Address::repeat_byte(0x99)),
        ..Default::default()
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    assert!(!stranger);
    Ok(())
}

#[tokio::test]
async fn test_operator_deadline_follows_client_clock() -> Result<()> {
    const NOW: u64 = 1_700_000_000;
    let fx = setup_with(|coprocessor| {
        let service: Arc<dyn ConfidentialService> = coprocessor.clone();
        ConfidentialClient::with_clock(
            service,
            CHAIN_ID,
            *coprocessor.domain(),
            Arc::new(FixedClock(NOW)),
        )
    });

    assert_eq!(fx.env.now(), NOW);
    assert_eq!(fx.env.client().decryption().clock().now(), NOW);
    let set = SetOperatorParams::default().resolve(&fx.env)?;
    assert_eq!(set.until, NOW + 365 * 86_400);
    Ok(())
}

#[tokio::test]
async fn test_bridge_encrypts_three_values_in_one_input() -> Result<()> {
    let fx = setup();

    let bridge = BridgeParams {
        input_amount: Some(U256::from(1_000_000)),
        output_amount: Some(U256::from(990_000)),
        ..Default::default()
    }
    .resolve(&fx.env)?;
    assert_eq!(bridge.output_token, DESTINATION_USDC);
    assert_eq!(bridge.destination_chain_id, 421614);
    bridge.execute(&fx.env).await?;

    let orders = fx.contracts.deploy_bridge(BRIDGE).orders().await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.input_amount, U256::from(1_000_000));
    assert_eq!(order.output_amount, U256::from(990_000));
    assert_eq!(order.destination_chain_id, U256::from(421614));
    assert_eq!(order.request.sender, fx.user);
    assert_eq!(order.request.receiver, fx.user);
    assert_eq!(order.request.relayer, RELAYER);
    assert_eq!(order.request.input_token, USDC);
    Ok(())
}

#[tokio::test]
async fn test_bridge_output_token_must_be_registered() -> Result<()> {
    let fx = setup();

    let Err(err) = (BridgeParams {
        destination_chain_id: Some(84532),
        ..Default::default()
    })
    .resolve(&fx.env) else {
        bail!("resolving an unknown destination should fail");
    };
    assert_eq!(
        err.downcast_ref::<RegistryError>(),
        Some(&RegistryError::UnresolvedAddress {
            name: "cUSDC".to_string(),
            chain: "84532".to_string(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_bridge_configuration() -> Result<()> {
    let fx = setup();
    let peer = Address::new([0x42; 20]);

    SetPeerParams {
        bridge: None,
        eid: 40231,
        peer,
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;
    SetChainIdToEidParams {
        bridge: None,
        chain_id: DESTINATION,
        eid: 40231,
    }
    .resolve(&fx.env)?
    .execute(&fx.env)
    .await?;

    let bridge = fx.contracts.deploy_bridge(BRIDGE);
    let stored = bridge.peer(40231).await;
    assert_eq!(stored, Some(peer.into_word()));
    assert_eq!(bridge.eid_for_chain(DESTINATION).await, Some(40231));
    Ok(())
}

#[tokio::test]
async fn test_missing_registry_entry_is_reported() -> Result<()> {
    let fx = setup();

    let Err(err) = (BalanceOfAllParams {
        tokens: Some(vec!["cAAVE".to_string()]),
        ..Default::default()
    })
    .resolve(&fx.env) else {
        bail!("cAAVE is not registered");
    };
    assert!(err.to_string().contains("cAAVE"));
    Ok(())
}
