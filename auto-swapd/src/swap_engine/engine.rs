use crate::clients::{erc20, receipt_succeeded, send_with_fresh_nonce, ChainClient, ChainError};
use crate::config::{AppConfig, Pacing, RouterConfig, TokenAddresses};
use crate::metrics::MetricsCollector;
use crate::swap_engine::calldata::{approval_amount, encode_swap_call, min_amount_out, RouterCall};
use crate::swap_engine::{Asset, SwapCallParams, SwapError};
use crate::wallet::WalletHandle;

use chrono::Utc;
use ethers::types::{Address, TransactionReceipt, TransactionRequest, H256, U256};
use ethers::utils::parse_units;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Swaps one token for another through the configured router.
pub struct SwapEngine<C> {
    client: Arc<C>,
    router: RouterConfig,
    tokens: TokenAddresses,
    chain_id: u64,
    pacing: Pacing,
    metrics: Arc<MetricsCollector>,
}

impl<C> Clone for SwapEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            router: self.router.clone(),
            tokens: self.tokens,
            chain_id: self.chain_id,
            pacing: self.pacing.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<C: ChainClient> SwapEngine<C> {
    pub fn new(config: &AppConfig, client: Arc<C>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            client,
            router: config.router.clone(),
            tokens: config.tokens,
            chain_id: config.chain.chain_id,
            pacing: config.pacing.clone(),
            metrics,
        }
    }

    pub fn router_address(&self) -> Option<Address> {
        self.router.router_address
    }

    /// Approves the router, submits the swap and waits for one confirmation.
    ///
    /// Never fails: every error is logged (with a best-effort lookup of the
    /// offending transaction) and turned into `None`, so the caller can carry on
    /// with other directions.
    pub async fn swap_token_to_token(
        &self,
        wallet: &WalletHandle,
        token_in: Address,
        token_out: Address,
        amount_in: f64,
    ) -> Option<H256> {
        let Some(router) = self.router.router_address else {
            info!("Swap router address is not set. Skipping swap operation.");
            return None;
        };

        let label = self.pair_label(token_in, token_out);

        match self.execute(wallet, router, token_in, token_out, amount_in).await {
            Ok(hash) => {
                self.metrics.record_swap(&label, "confirmed");
                Some(hash)
            }
            Err(SwapError::AmountTooSmall { amount }) => {
                warn!(
                    "Wallet {:?}: {} amount {} is below token precision, skipping",
                    wallet.address(),
                    label,
                    amount
                );
                self.metrics.record_swap(&label, "skipped");
                None
            }
            Err(e) => {
                error!(
                    target: "swap",
                    "Wallet {:?}: Error swapping {:?} to {:?}: {}",
                    wallet.address(),
                    token_in,
                    token_out,
                    e
                );
                self.metrics.record_swap(&label, e.outcome());
                self.report_failure(&e).await;
                None
            }
        }
    }

    async fn execute(
        &self,
        wallet: &WalletHandle,
        router: Address,
        token_in: Address,
        token_out: Address,
        amount_in: f64,
    ) -> Result<H256, SwapError> {
        let decimals = self.client.token_decimals(token_in).await?;
        let symbol_in = self.client.token_symbol(token_in).await?;
        let symbol_out = self.client.token_symbol(token_out).await?;

        let amount = to_base_units(amount_in, decimals)?;

        info!(
            "Wallet {:?}: Approving {:?} to spend {} {}...",
            wallet.address(),
            router,
            amount_in,
            symbol_in
        );
        let approve_tx = TransactionRequest::new()
            .to(token_in)
            .data(erc20::approve_call(router, approval_amount(amount)))
            .gas(self.router.gas_limit)
            .gas_price(self.router.gas_price);
        let approve_hash = send_with_fresh_nonce(self.client.as_ref(), wallet, approve_tx, self.chain_id).await?;
        info!("Wallet {:?}: Approve tx sent: {:?}", wallet.address(), approve_hash);
        self.confirm(approve_hash, None).await?;

        let deadline = Utc::now().timestamp().max(0) as u64 + self.pacing.swap_deadline.as_secs();
        let call = RouterCall::for_pair(token_in, token_out, &self.tokens);
        let params = SwapCallParams {
            token_in,
            token_out,
            recipient: wallet.address(),
            deadline,
            amount_in: amount,
            amount_out_min: min_amount_out(amount, call.slippage()),
        };
        let data = encode_swap_call(call, &params);

        info!(
            "Wallet {:?}: Swapping {} {} to {} using selector 0x{} ({:?})",
            wallet.address(),
            amount_in,
            symbol_in,
            symbol_out,
            hex::encode(call.selector()),
            call
        );
        debug!(?params, "swap call parameters");

        // Give the node time to propagate the approval
        tokio::time::sleep(self.pacing.approval_settle).await;

        let gas_limit = call.gas_limit(self.router.gas_limit);
        debug!("Gas limit set to: {}", gas_limit);
        let swap_tx = TransactionRequest::new()
            .to(router)
            .data(data)
            .gas(gas_limit)
            .gas_price(self.router.gas_price);
        let swap_hash = send_with_fresh_nonce(self.client.as_ref(), wallet, swap_tx, self.chain_id).await?;

        info!(
            target: "swap",
            "Wallet {:?}: Swap {} to {} transaction sent: {:?}",
            wallet.address(),
            symbol_in,
            symbol_out,
            swap_hash
        );

        let receipt = self.confirm(swap_hash, Some(self.pacing.confirmation_timeout)).await?;
        info!(
            target: "swap",
            "Wallet {:?}: Swap {:?} confirmed in block {:?}",
            wallet.address(),
            swap_hash,
            receipt.block_number
        );

        Ok(swap_hash)
    }

    /// Waits for one confirmation. A mined receipt with failed status is an error.
    /// Losing the race against `timeout` does not cancel the transaction.
    async fn confirm(
        &self,
        hash: H256,
        timeout: Option<Duration>,
    ) -> Result<TransactionReceipt, ChainError> {
        let wait = self.client.wait_for_receipt(hash, 1);
        let receipt = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ChainError::ConfirmationTimeout { hash, timeout: limit })??,
            None => wait.await?,
        };

        match receipt {
            Some(receipt) if receipt_succeeded(&receipt) => Ok(receipt),
            Some(_) => Err(ChainError::Reverted(hash)),
            None => Err(ChainError::Dropped(hash)),
        }
    }

    /// Operator diagnostics only. Lookup failures are logged and ignored.
    async fn report_failure(&self, err: &SwapError) {
        let Some(hash) = err.tx_hash() else {
            return;
        };

        info!("Checking transaction status for hash: {:?}", hash);
        let tx = match self.client.get_transaction(hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                warn!("Transaction {:?} not found. It may have been dropped from the mempool.", hash);
                return;
            }
            Err(e) => {
                warn!("Error checking transaction status: {}", e);
                return;
            }
        };
        info!(
            "Transaction found. Nonce: {}, Gas price: {}",
            tx.nonce,
            tx.gas_price.unwrap_or_default()
        );

        match self.client.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                info!(
                    "Transaction receipt retrieved. Status: {:?}, Gas used: {}",
                    receipt.status,
                    receipt.gas_used.unwrap_or_default()
                );
                if !receipt_succeeded(&receipt) {
                    warn!(
                        "Transaction reverted on-chain. Likely causes: insufficient liquidity, \
                         price impact too high, or router constraints."
                    );
                }
            }
            Ok(None) => info!("Transaction {:?} is pending or not yet mined.", hash),
            Err(e) => warn!("Error checking transaction receipt: {}", e),
        }
    }

    fn pair_label(&self, token_in: Address, token_out: Address) -> String {
        let asset = |addr: Address| {
            [Asset::Usd, Asset::Eth, Asset::Btc]
                .into_iter()
                .find(|a| a.address(&self.tokens) == addr)
                .map(|a| a.label())
                .unwrap_or("OTHER")
        };
        format!("{}_TO_{}", asset(token_in), asset(token_out))
    }
}

/// Rounds to 5 decimals before scaling, like every human amount the bot sends.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<U256, SwapError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(SwapError::Conversion {
            amount,
            reason: "amount must be a finite, non-negative number".into(),
        });
    }

    let units: U256 = parse_units(format!("{amount:.5}"), decimals as u32)
        .map_err(|e| SwapError::Conversion {
            amount,
            reason: e.to_string(),
        })?
        .into();

    if units.is_zero() {
        return Err(SwapError::AmountTooSmall { amount });
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_units_round_to_five_decimals() {
        assert_eq!(
            to_base_units(1.5, 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(
            to_base_units(0.0123456, 18).unwrap(),
            U256::from(12_350_000_000_000_000u128)
        );
        assert_eq!(to_base_units(2.0, 6).unwrap(), U256::from(2_000_000u64));
    }

    #[test]
    fn dust_is_reported_as_too_small() {
        assert!(matches!(
            to_base_units(0.000001, 18),
            Err(SwapError::AmountTooSmall { .. })
        ));
        assert!(matches!(to_base_units(f64::NAN, 18), Err(SwapError::Conversion { .. })));
    }
}
