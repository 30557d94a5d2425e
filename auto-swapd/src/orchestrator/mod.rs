use anyhow::{Context, Result};
use ethers::types::H256;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::balance::{BalanceOracle, TokenBalance};
use crate::clients::ChainClient;
use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::swap_engine::{Asset, Direction, SwapEngine, SwapMode, SwapRequest};
use crate::transfer::{ProcessedSet, TransferEngine};
use crate::wallet::WalletHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Failed { consecutive: u32 },
    /// The failure bound was hit and the native-transfer phase was re-run.
    Escalated,
}

/// Balances read once per wallet per pass.
struct WalletBalances {
    usd: TokenBalance,
    eth: TokenBalance,
    btc: TokenBalance,
}

impl WalletBalances {
    fn for_asset(&self, asset: Asset) -> &TokenBalance {
        match asset {
            Asset::Usd => &self.usd,
            Asset::Eth => &self.eth,
            Asset::Btc => &self.btc,
        }
    }
}

/// Owns the session state: wallets, the processed set and the engines.
/// Everything runs sequentially; one wallet's work completes before the next starts.
pub struct Orchestrator<C> {
    client: Arc<C>,
    config: AppConfig,
    wallets: Vec<WalletHandle>,
    processed: ProcessedSet,
    oracle: BalanceOracle<C>,
    transfer: TransferEngine<C>,
    swap: SwapEngine<C>,
    metrics: Arc<MetricsCollector>,
    rng: StdRng,
    consecutive_failures: u32,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(
        config: AppConfig,
        client: Arc<C>,
        wallets: Vec<WalletHandle>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            oracle: BalanceOracle::new(Arc::clone(&client)),
            transfer: TransferEngine::new(&config, Arc::clone(&client), Arc::clone(&metrics)),
            swap: SwapEngine::new(&config, Arc::clone(&client), Arc::clone(&metrics)),
            client,
            config,
            wallets,
            processed: ProcessedSet::new(),
            metrics,
            rng: StdRng::from_entropy(),
            consecutive_failures: 0,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Native-transfer phase, then swap cycles forever.
    pub async fn run(&mut self) {
        self.run_native_transfer_phase().await;

        info!("===== STARTING SWAP PHASE =====");
        loop {
            self.run_cycle().await;
        }
    }

    /// Gives every wallet not yet in the processed set its one-time transfer.
    pub async fn run_native_transfer_phase(&mut self) {
        info!("===== ONE-TIME NATIVE TRANSFER PHASE =====");
        if !self.processed.is_empty() {
            info!("{} wallet(s) already made their native transfer", self.processed.len());
        }

        for wallet in &self.wallets {
            if self.processed.contains(&wallet.address()) {
                continue;
            }
            self.transfer
                .process_wallet(wallet, &mut self.processed, &mut self.rng)
                .await;
            tokio::time::sleep(self.config.pacing.between_transfers).await;
        }

        info!("===== ALL WALLETS PROCESSED FOR NATIVE TRANSFER =====");
    }

    /// One supervised swap pass followed by the cycle delay.
    ///
    /// A failed pass is retried after the delay. After
    /// `max_consecutive_failures` failures in a row the native-transfer phase
    /// is re-run (a no-op for processed wallets) and the counter resets.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let cycle_duration = self.config.router.cycle_duration();

        let outcome = match self.run_swap_pass().await {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.metrics.record_cycle("completed");
                info!(
                    "Completed swap cycle for all wallets. Waiting {} seconds for next cycle...",
                    cycle_duration.as_secs_f64()
                );
                CycleOutcome::Completed
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.metrics.record_cycle("failed");
                error!("Error in swap loop: {:#}", e);

                let limit = self.config.supervisor.max_consecutive_failures.max(1);
                if self.consecutive_failures >= limit {
                    warn!(
                        "{} consecutive swap cycle failures, restarting from the transfer phase",
                        self.consecutive_failures
                    );
                    self.consecutive_failures = 0;
                    self.run_native_transfer_phase().await;
                    CycleOutcome::Escalated
                } else {
                    info!("Retrying swap cycle in {} seconds...", cycle_duration.as_secs_f64());
                    CycleOutcome::Failed {
                        consecutive: self.consecutive_failures,
                    }
                }
            }
        };

        debug!("metrics:\n{}", self.metrics.export());
        tokio::time::sleep(cycle_duration).await;
        outcome
    }

    /// Runs the swap policy for every wallet. Per-wallet failures are contained;
    /// only an unreachable node fails the pass.
    pub async fn run_swap_pass(&mut self) -> Result<()> {
        let height = self
            .client
            .block_number()
            .await
            .context("RPC endpoint is unreachable")?;
        debug!("Starting swap pass at block {}", height);

        let wallets = self.wallets.clone();
        for wallet in &wallets {
            self.process_wallet_swaps(wallet).await;
            tokio::time::sleep(self.config.pacing.between_wallets).await;
        }
        Ok(())
    }

    /// Attempts this cycle's directions for one wallet. Returns each attempted
    /// direction with the confirmed swap hash, if any.
    pub async fn process_wallet_swaps(&mut self, wallet: &WalletHandle) -> Vec<(Direction, Option<H256>)> {
        if self.swap.router_address().is_none() {
            info!("Swap router address is not set. Skipping swap operations.");
            return Vec::new();
        }

        let address = wallet.address();
        let tokens = self.config.tokens;
        let balances = WalletBalances {
            usd: self.oracle.token_balance_or_zero(address, tokens.usd, "USD").await,
            eth: self.oracle.token_balance_or_zero(address, tokens.eth, "ETH").await,
            btc: self.oracle.token_balance_or_zero(address, tokens.btc, "BTC").await,
        };
        for asset in [Asset::Usd, Asset::Eth, Asset::Btc] {
            self.metrics
                .set_token_balance(address, asset.label(), balances.for_asset(asset).amount);
        }

        if let SwapMode::Unknown(mode) = &self.config.router.swap_mode {
            info!("Wallet {:?}: Skipping swap - unknown mode: {}", address, mode);
            return Vec::new();
        }

        let directions = self.config.router.swap_mode.select(&mut self.rng);
        let mut attempts = Vec::with_capacity(directions.len());

        for (i, direction) in directions.iter().copied().enumerate() {
            let balance = balances.for_asset(direction.token_in());
            let Some(request) = self.swap_request(wallet, direction, balance) else {
                continue;
            };

            let hash = self
                .swap
                .swap_token_to_token(wallet, request.token_in, request.token_out, request.amount_in)
                .await;
            attempts.push((direction, hash));

            if i + 1 < directions.len() {
                tokio::time::sleep(self.config.pacing.between_directions).await;
            }
        }

        attempts
    }

    fn swap_request(
        &self,
        wallet: &WalletHandle,
        direction: Direction,
        balance: &TokenBalance,
    ) -> Option<SwapRequest> {
        let label = direction.token_in().label();
        if balance.amount <= 0.0 {
            info!("Wallet {:?}: No {} balance for {} swap", wallet.address(), label, direction);
            return None;
        }

        let percent = self.config.router.swap_percent;
        let amount = balance.amount * (percent / 100.0);
        if amount <= 0.0 {
            info!("Wallet {:?}: {} balance too low for swap", wallet.address(), label);
            return None;
        }

        info!(
            "Wallet {:?}: Attempting swap of {} {} for {} ({}% of balance)",
            wallet.address(),
            amount,
            label,
            direction,
            percent
        );
        Some(SwapRequest::new(direction, &self.config.tokens, amount))
    }
}
