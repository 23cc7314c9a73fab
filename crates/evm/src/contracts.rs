// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::retry::{send_tx_with_retry, NONCE_ERRORS};
use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{aliases::U48, Address, Bytes, TxHash, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
    sol,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

static NONCE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub async fn next_pending_nonce<P>(provider: &P, from: Address) -> Result<u64>
where
    P: Provider<Ethereum> + Send + Sync,
{
    provider
        .get_transaction_count(from)
        .pending()
        .await
        .map_err(Into::into)
}

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract ConfidentialToken {
        function underlying() external view returns (address);
        function confidentialBalanceOf(address account) external view returns (bytes32);
        function isOperator(address holder, address spender) external view returns (bool);
        function confidentialTransferFrom(address from, address to, bytes32 encryptedAmount, bytes calldata inputProof) external returns (bytes32 transferred);
        function confidentialTransferAndCall(address to, bytes32 encryptedAmount, bytes calldata inputProof, bytes calldata data) external returns (bytes32 transferred);
        function unwrap(address from, address to, bytes32 encryptedAmount, bytes calldata inputProof) external;
        function wrap(address to, uint256 amount) external;
        function setOperator(address operator, uint48 until) external;
    }

    #[derive(Debug)]
    #[sol(rpc)]
    contract IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }

    #[derive(Debug)]
    #[sol(rpc)]
    contract ConfidentialBridge {
        function bridge(
            address sender,
            address receiver,
            address relayer,
            address inputToken,
            address outputToken,
            bytes32 inputAmount,
            bytes32 outputAmount,
            bytes32 destinationChainId,
            bytes calldata inputProof
        ) external;
        function setPeer(uint32 eid, bytes32 peer) external;
        function setChainIdToEid(uint256 chainId, uint32 eid) external;
    }
}

/// Arguments of a bridge call. The three handles come from one encrypted input, in the order
/// input amount, output amount, destination chain id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub sender: Address,
    pub receiver: Address,
    pub relayer: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub handles: [B256; 3],
    pub input_proof: Bytes,
}

/// Read-only operations on a confidential token
#[async_trait]
pub trait TokenRead: Send + Sync {
    fn address(&self) -> Address;

    /// Handle of `account`'s encrypted balance; zero when the balance was never initialised
    async fn confidential_balance_of(&self, account: Address) -> Result<B256>;

    /// The plaintext ERC-20 this token wraps
    async fn underlying(&self) -> Result<Address>;

    async fn is_operator(&self, holder: Address, spender: Address) -> Result<bool>;
}

/// Write operations on a confidential token
#[async_trait]
pub trait TokenWrite: TokenRead {
    async fn confidential_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash>;

    async fn confidential_transfer_and_call(
        &self,
        to: Address,
        amount: B256,
        input_proof: Bytes,
        data: Bytes,
    ) -> Result<TxHash>;

    async fn unwrap(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash>;

    async fn wrap(&self, to: Address, amount: U256) -> Result<TxHash>;

    async fn set_operator(&self, operator: Address, until: u64) -> Result<TxHash>;
}

/// The plaintext ERC-20 side of wrapping
#[async_trait]
pub trait Erc20: Send + Sync {
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;

    async fn approve(&self, spender: Address, value: U256) -> Result<TxHash>;
}

#[async_trait]
pub trait BridgeWrite: Send + Sync {
    fn address(&self) -> Address;

    async fn bridge(&self, request: BridgeRequest) -> Result<TxHash>;

    async fn set_peer(&self, eid: u32, peer: B256) -> Result<TxHash>;

    async fn set_chain_id_to_eid(&self, chain_id: u64, eid: u32) -> Result<TxHash>;
}

/// Hands out contract handles for addresses resolved at run time
pub trait ContractSet: Send + Sync {
    fn token(&self, address: Address) -> Arc<dyn TokenWrite>;

    fn erc20(&self, address: Address) -> Arc<dyn Erc20>;

    fn bridge(&self, address: Address) -> Arc<dyn BridgeWrite>;
}

/// A deployed contract reached through a signing alloy provider. Which bindings apply depends
/// on the address.
#[derive(Clone)]
pub struct EvmContract {
    pub provider: Arc<DynProvider>,
    pub contract_address: Address,
    sender: Address,
}

impl EvmContract {
    /// Serialize nonce allocation and send the transaction built by `send`, waiting for its
    /// receipt
    async fn transact<F, Fut>(&self, operation: &str, send: F) -> Result<TxHash>
    where
        F: Fn(u64) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<TransactionReceipt>> + Send,
    {
        let receipt = send_tx_with_retry(operation, NONCE_ERRORS, || async {
            let _guard = NONCE_LOCK.lock().await;
            let nonce = next_pending_nonce(&*self.provider, self.sender).await?;
            debug!("{operation}: sending with nonce {nonce}");
            send(nonce).await
        })
        .await?;

        if !receipt.status() {
            bail!(
                "{operation} reverted in transaction {}",
                receipt.transaction_hash
            );
        }
        info!("{operation} mined in {}", receipt.transaction_hash);
        Ok(receipt.transaction_hash)
    }
}

/// A signing connection shared by every contract handle it creates
#[derive(Clone)]
pub struct WriteConnection {
    provider: Arc<DynProvider>,
    sender: Address,
}

impl WriteConnection {
    /// Provider signing with `signer`. Nonces are cached locally and re-read under the nonce lock.
    pub async fn connect(http_rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .with_cached_nonce_management()
            .connect(http_rpc_url)
            .await
            .with_context(|| format!("Could not connect to {http_rpc_url}"))?
            .erased();

        Ok(Self {
            provider: Arc::new(provider),
            sender,
        })
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    pub fn contract(&self, contract_address: Address) -> EvmContract {
        EvmContract {
            provider: self.provider.clone(),
            contract_address,
            sender: self.sender,
        }
    }
}

impl ContractSet for WriteConnection {
    fn token(&self, address: Address) -> Arc<dyn TokenWrite> {
        Arc::new(self.contract(address))
    }

    fn erc20(&self, address: Address) -> Arc<dyn Erc20> {
        Arc::new(self.contract(address))
    }

    fn bridge(&self, address: Address) -> Arc<dyn BridgeWrite> {
        Arc::new(self.contract(address))
    }
}

#[async_trait]
impl TokenRead for EvmContract {
    fn address(&self) -> Address {
        self.contract_address
    }

    async fn confidential_balance_of(&self, account: Address) -> Result<B256> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        let handle = contract.confidentialBalanceOf(account).call().await?;
        Ok(handle)
    }

    async fn underlying(&self) -> Result<Address> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        let underlying = contract.underlying().call().await?;
        Ok(underlying)
    }

    async fn is_operator(&self, holder: Address, spender: Address) -> Result<bool> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        let is_operator = contract.isOperator(holder, spender).call().await?;
        Ok(is_operator)
    }
}

#[async_trait]
impl TokenWrite for EvmContract {
    async fn confidential_transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        self.transact("confidentialTransferFrom", |nonce| {
            let call = contract
                .confidentialTransferFrom(from, to, amount, input_proof.clone())
                .nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn confidential_transfer_and_call(
        &self,
        to: Address,
        amount: B256,
        input_proof: Bytes,
        data: Bytes,
    ) -> Result<TxHash> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        self.transact("confidentialTransferAndCall", |nonce| {
            let call = contract
                .confidentialTransferAndCall(to, amount, input_proof.clone(), data.clone())
                .nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn unwrap(
        &self,
        from: Address,
        to: Address,
        amount: B256,
        input_proof: Bytes,
    ) -> Result<TxHash> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        self.transact("unwrap", |nonce| {
            let call = contract
                .unwrap(from, to, amount, input_proof.clone())
                .nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn wrap(&self, to: Address, amount: U256) -> Result<TxHash> {
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        self.transact("wrap", |nonce| {
            let call = contract.wrap(to, amount).nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn set_operator(&self, operator: Address, until: u64) -> Result<TxHash> {
        let until = U48::try_from(until).context("operator expiry does not fit in uint48")?;
        let contract = ConfidentialToken::new(self.contract_address, &self.provider);
        self.transact("setOperator", |nonce| {
            let call = contract.setOperator(operator, until).nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }
}

#[async_trait]
impl Erc20 for EvmContract {
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        let contract = IERC20::new(self.contract_address, &self.provider);
        let allowance = contract.allowance(owner, spender).call().await?;
        Ok(allowance)
    }

    async fn approve(&self, spender: Address, value: U256) -> Result<TxHash> {
        let contract = IERC20::new(self.contract_address, &self.provider);
        self.transact("approve", |nonce| {
            let call = contract.approve(spender, value).nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }
}

#[async_trait]
impl BridgeWrite for EvmContract {
    fn address(&self) -> Address {
        self.contract_address
    }

    async fn bridge(&self, request: BridgeRequest) -> Result<TxHash> {
        let contract = ConfidentialBridge::new(self.contract_address, &self.provider);
        self.transact("bridge", |nonce| {
            let [input_amount, output_amount, destination] = request.handles;
            let call = contract
                .bridge(
                    request.sender,
                    request.receiver,
                    request.relayer,
                    request.input_token,
                    request.output_token,
                    input_amount,
                    output_amount,
                    destination,
                    request.input_proof.clone(),
                )
                .nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn set_peer(&self, eid: u32, peer: B256) -> Result<TxHash> {
        let contract = ConfidentialBridge::new(self.contract_address, &self.provider);
        self.transact("setPeer", |nonce| {
            let call = contract.setPeer(eid, peer).nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }

    async fn set_chain_id_to_eid(&self, chain_id: u64, eid: u32) -> Result<TxHash> {
        let contract = ConfidentialBridge::new(self.contract_address, &self.provider);
        self.transact("setChainIdToEid", |nonce| {
            let call = contract
                .setChainIdToEid(U256::from(chain_id), eid)
                .nonce(nonce);
            async move { anyhow::Ok(call.send().await?.get_receipt().await?) }
        })
        .await
    }
}

/// Left-pad an address to the `bytes32` peer format the bridge stores
pub fn peer_from_address(address: Address) -> B256 {
    address.into_word()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_abi_signatures() {
        assert_eq!(
            ConfidentialToken::confidentialTransferFromCall::SIGNATURE,
            "confidentialTransferFrom(address,address,bytes32,bytes)"
        );
        assert_eq!(
            ConfidentialToken::confidentialTransferAndCallCall::SIGNATURE,
            "confidentialTransferAndCall(address,bytes32,bytes,bytes)"
        );
        assert_eq!(
            ConfidentialToken::unwrapCall::SIGNATURE,
            "unwrap(address,address,bytes32,bytes)"
        );
        assert_eq!(
            ConfidentialToken::setOperatorCall::SIGNATURE,
            "setOperator(address,uint48)"
        );
        assert_eq!(
            ConfidentialBridge::bridgeCall::SIGNATURE,
            "bridge(address,address,address,address,address,bytes32,bytes32,bytes32,bytes)"
        );
    }

    #[test]
    fn test_peer_is_left_padded() {
        let address = Address::repeat_byte(0xab);
        let peer = peer_from_address(address);
        assert_eq!(&peer[..12], &[0u8; 12]);
        assert_eq!(&peer[12..], address.as_slice());
    }
}
