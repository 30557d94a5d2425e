use async_trait::async_trait;
use ethers::providers::ProviderError;
use ethers::types::{Address, Transaction, TransactionReceipt, TransactionRequest, H256, U256, U64};
use std::time::Duration;

use crate::wallet::WalletHandle;

/// Capabilities the bot needs from a chain node. Implemented by [`super::EvmClient`]
/// over JSON-RPC; tests substitute an in-memory double.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Native balance in wei.
    async fn native_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn transaction_count(&self, address: Address) -> Result<U256, ChainError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError>;

    async fn token_symbol(&self, token: Address) -> Result<String, ChainError>;

    /// Token balance in base units.
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    /// Signs `tx` with the wallet's key and broadcasts it. Returns once the node accepted it.
    async fn send_transaction(
        &self,
        wallet: &WalletHandle,
        tx: TransactionRequest,
    ) -> Result<H256, ChainError>;

    /// Resolves when the transaction has `confirmations` confirmations, or `None`
    /// if the node dropped it.
    async fn wait_for_receipt(
        &self,
        hash: H256,
        confirmations: usize,
    ) -> Result<Option<TransactionReceipt>, ChainError>;

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError>;

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC endpoint {url}: {reason}")]
    Endpoint { url: String, reason: String },

    #[error("RPC error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Transaction {0:?} failed during execution")]
    Reverted(H256),

    #[error("Transaction {0:?} was dropped before confirmation")]
    Dropped(H256),

    #[error("Timed out after {timeout:?} waiting for confirmation of {hash:?}")]
    ConfirmationTimeout { hash: H256, timeout: Duration },

    #[error("Failed to decode {call} response: {reason}")]
    Decode { call: &'static str, reason: String },
}

impl ChainError {
    /// Hash of the transaction the error is about, when one was already broadcast.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            ChainError::Reverted(hash) | ChainError::Dropped(hash) => Some(*hash),
            ChainError::ConfirmationTimeout { hash, .. } => Some(*hash),
            _ => None,
        }
    }
}

pub fn receipt_succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status == Some(U64::from(1))
}

/// Queries the nonce immediately before sending so back-to-back transactions
/// from one wallet never reuse a stale value.
pub async fn send_with_fresh_nonce<C: ChainClient + ?Sized>(
    client: &C,
    wallet: &WalletHandle,
    tx: TransactionRequest,
    chain_id: u64,
) -> Result<H256, ChainError> {
    let nonce = client.transaction_count(wallet.address()).await?;
    tracing::debug!("Wallet {:?}: using nonce {}", wallet.address(), nonce);
    client.send_transaction(wallet, tx.nonce(nonce).chain_id(chain_id)).await
}
