use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, TransactionRequest, H256, U256};
use std::time::Duration;

use super::chain::{ChainClient, ChainError};
use super::erc20;
use crate::config::ChainConfig;
use crate::wallet::WalletHandle;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC backed chain client. Signing happens locally per transaction.
#[derive(Clone)]
pub struct EvmClient {
    provider: Provider<Http>,
    chain_id: u64,
}

impl EvmClient {
    pub fn new(config: &ChainConfig) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| ChainError::Endpoint {
                url: config.rpc_url.clone(),
                reason: e.to_string(),
            })?
            .interval(RECEIPT_POLL_INTERVAL);

        Ok(Self {
            provider,
            chain_id: config.chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Ok(self.provider.call(&tx, None).await?)
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_transaction_count(address, None).await?)
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        let raw = self.call(token, erc20::decimals_call()).await?;
        erc20::decode_decimals(&raw)
    }

    async fn token_symbol(&self, token: Address) -> Result<String, ChainError> {
        let raw = self.call(token, erc20::symbol_call()).await?;
        erc20::decode_symbol(&raw)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let raw = self.call(token, erc20::balance_of_call(owner)).await?;
        erc20::decode_uint("balanceOf", &raw)
    }

    async fn send_transaction(
        &self,
        wallet: &WalletHandle,
        tx: TransactionRequest,
    ) -> Result<H256, ChainError> {
        let signer = wallet.signer().clone().with_chain_id(self.chain_id);
        let client = SignerMiddleware::new(self.provider.clone(), signer);

        let pending = client
            .send_transaction(tx.from(wallet.address()), None)
            .await
            .map_err(|e| ChainError::Submission(e.to_string()))?;

        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        hash: H256,
        confirmations: usize,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let receipt = PendingTransaction::new(hash, &self.provider)
            .confirmations(confirmations)
            .await?;
        Ok(receipt)
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        Ok(self.provider.get_transaction(hash).await?)
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }
}
