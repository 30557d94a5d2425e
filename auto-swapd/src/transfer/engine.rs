use ethers::types::{Address, TransactionRequest, H256, U256};
use ethers::utils::parse_ether;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ProcessedSet;
use crate::balance::BalanceOracle;
use crate::clients::{send_with_fresh_nonce, ChainClient, ChainError};
use crate::config::{AppConfig, TransferConfig};
use crate::metrics::MetricsCollector;
use crate::wallet::WalletHandle;

/// Transfer amounts are quantised to 5 decimal places.
const AMOUNT_SCALE: f64 = 100_000.0;

/// Grid indices stay below 2^53 so every one is exactly representable.
const MAX_GRID_INDEX: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub enum NativeTransferOutcome {
    AlreadyProcessed,
    Sent { hash: H256, recipient: Address, amount: f64 },
    InsufficientFunds { balance: f64, required: f64 },
    Failed,
}

/// Draws an amount in `[min, max)`.
///
/// The draw is uniform over the 5-decimal grid points inside the range. If the
/// range is too narrow to contain one, it falls back to a plain uniform draw.
pub fn transfer_amount<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> f64 {
    match grid_bounds(min, max) {
        Some((lo, hi)) => rng.gen_range(lo..=hi) as f64 / AMOUNT_SCALE,
        None => rng.gen_range(min..max),
    }
}

/// First and last grid index whose value lies in `[min, max)`.
fn grid_bounds(min: f64, max: f64) -> Option<(u64, u64)> {
    if !(min >= 0.0 && min < max) || max * AMOUNT_SCALE >= MAX_GRID_INDEX {
        return None;
    }
    let grid = |k: i64| k as f64 / AMOUNT_SCALE;

    let mut lo = (min * AMOUNT_SCALE).ceil() as i64;
    while lo > 0 && grid(lo - 1) >= min {
        lo -= 1;
    }
    while grid(lo) < min {
        lo += 1;
    }

    let mut hi = (max * AMOUNT_SCALE).floor() as i64;
    while hi >= 0 && grid(hi) >= max {
        hi -= 1;
    }
    while hi.checked_add(1).map_or(false, |next| grid(next) < max) {
        hi += 1;
    }

    (lo <= hi).then_some((lo as u64, hi as u64))
}

fn to_wei(amount: f64) -> Result<U256, ChainError> {
    let on_grid = (amount * AMOUNT_SCALE).round() / AMOUNT_SCALE == amount;
    let rendered = if on_grid {
        format!("{amount:.5}")
    } else {
        format!("{amount:.18}")
    };
    parse_ether(rendered).map_err(|e| ChainError::Submission(format!("invalid amount {amount}: {e}")))
}

/// Performs each wallet's one-time native-coin transfer.
pub struct TransferEngine<C> {
    client: Arc<C>,
    oracle: BalanceOracle<C>,
    config: TransferConfig,
    gas_price: u64,
    gas_limit: u64,
    /// Smallest native balance that covers the minimum transfer plus the fee.
    min_required: f64,
    chain_id: u64,
    metrics: Arc<MetricsCollector>,
}

impl<C: ChainClient> TransferEngine<C> {
    pub fn new(config: &AppConfig, client: Arc<C>, metrics: Arc<MetricsCollector>) -> Self {
        let transfer = config.transfer.clone();
        if grid_bounds(transfer.min_balance, transfer.max_balance).is_none() {
            warn!(
                "No 5-decimal amount lies in [{}, {}); transfer amounts will use full precision",
                transfer.min_balance, transfer.max_balance
            );
        }

        Self {
            oracle: BalanceOracle::new(Arc::clone(&client)),
            client,
            min_required: transfer.min_balance + config.router.base_fee_native(),
            config: transfer,
            gas_price: config.router.gas_price,
            gas_limit: config.router.gas_limit,
            chain_id: config.chain.chain_id,
            metrics,
        }
    }

    pub fn transfer_amount<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        transfer_amount(self.config.min_balance, self.config.max_balance, rng)
    }

    pub fn pick_recipient<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Address> {
        self.config.recipients.choose(rng).copied()
    }

    /// Sends `amount` native coin. The wallet is marked processed whether or not
    /// the submission succeeds, so it is never attempted twice.
    pub async fn transfer_native(
        &self,
        wallet: &WalletHandle,
        recipient: Address,
        amount: f64,
        processed: &mut ProcessedSet,
    ) -> Result<H256, ChainError> {
        let result = self.submit(wallet, recipient, amount).await;
        processed.mark(wallet.address());

        match &result {
            Ok(hash) => {
                info!(
                    "Native transaction sent from {:?} to {:?}: {:?}",
                    wallet.address(),
                    recipient,
                    hash
                );
                self.metrics.record_transfer("sent");
            }
            Err(e) => {
                error!("Error during native transfer from {:?}: {}", wallet.address(), e);
                self.metrics.record_transfer("failed");
            }
        }
        result
    }

    async fn submit(&self, wallet: &WalletHandle, recipient: Address, amount: f64) -> Result<H256, ChainError> {
        let tx = TransactionRequest::new()
            .to(recipient)
            .value(to_wei(amount)?)
            .gas(self.gas_limit)
            .gas_price(self.gas_price);
        send_with_fresh_nonce(self.client.as_ref(), wallet, tx, self.chain_id).await
    }

    /// Runs the gated one-time transfer for `wallet`. Never fails; the wallet
    /// always ends up in `processed`.
    pub async fn process_wallet<R: Rng + ?Sized>(
        &self,
        wallet: &WalletHandle,
        processed: &mut ProcessedSet,
        rng: &mut R,
    ) -> NativeTransferOutcome {
        let address = wallet.address();
        if processed.contains(&address) {
            info!("Wallet {:?} already made its native transfer, skipping.", address);
            return NativeTransferOutcome::AlreadyProcessed;
        }

        let balance = match self.oracle.native_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                error!("Error processing native transfer for wallet {:?}: {}", address, e);
                processed.mark(address);
                self.metrics.record_transfer("failed");
                return NativeTransferOutcome::Failed;
            }
        };
        info!("Wallet {:?} Native Balance: {}", address, balance);

        if balance < self.min_required {
            info!("Wallet {:?}: Insufficient native balance for transfer", address);
            processed.mark(address);
            self.metrics.record_transfer("skipped");
            return NativeTransferOutcome::InsufficientFunds {
                balance,
                required: self.min_required,
            };
        }

        let Some(recipient) = self.pick_recipient(rng) else {
            warn!("No transfer recipients configured, skipping wallet {:?}", address);
            processed.mark(address);
            self.metrics.record_transfer("skipped");
            return NativeTransferOutcome::Failed;
        };
        let amount = self.transfer_amount(rng);
        info!("Wallet {:?}: Amount native to transfer: {}", address, amount);

        match self.transfer_native(wallet, recipient, amount, processed).await {
            Ok(hash) => NativeTransferOutcome::Sent { hash, recipient, amount },
            Err(_) => NativeTransferOutcome::Failed,
        }
    }
}
