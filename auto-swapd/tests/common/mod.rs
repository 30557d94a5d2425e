//! In-memory chain used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{
    Address, Transaction, TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use auto_swapd::clients::{ChainClient, ChainError};
use auto_swapd::config::AppConfig;
use auto_swapd::wallet::WalletHandle;

pub const ROUTER: &str = "0x0000000000000000000000000000000000000fee";
pub const TOKEN_USD: &str = "0x1000000000000000000000000000000000000001";
pub const TOKEN_ETH: &str = "0x2000000000000000000000000000000000000002";
pub const TOKEN_BTC: &str = "0x3000000000000000000000000000000000000003";

pub fn addr(s: &str) -> Address {
    s.parse().expect("valid address")
}

/// Config built the same way as from the environment, with test-friendly gas.
pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
    let config = config_from(overrides);
    assert!(config.warnings.is_empty(), "test config rejected: {:?}", config.warnings);
    config
}

/// Like [`test_config`] but accepts values the loader replaces or flags.
pub fn config_from(overrides: &[(&str, &str)]) -> AppConfig {
    let mut env: HashMap<String, String> = [
        ("TOKEN_USD", TOKEN_USD),
        ("TOKEN_ETH", TOKEN_ETH),
        ("TOKEN_BTC", TOKEN_BTC),
        ("SWAP_ROUTER", ROUTER),
        ("GAS_PRICE", "1000000"),
        ("GAS_LIMIT", "300000"),
        ("DURATION", "1000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| env.get(key).cloned())
}

/// Deterministic wallets for private keys 1..=n.
pub fn wallets(n: u64) -> Vec<WalletHandle> {
    (1..=n)
        .map(|i| {
            let signer: LocalWallet = format!("{i:064x}").parse().expect("valid key");
            WalletHandle::from_signer(signer)
        })
        .collect()
}

pub fn ether(units: u64) -> U256 {
    U256::exp10(18) * U256::from(units)
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: Address,
    pub to: Option<Address>,
    pub request: TransactionRequest,
    /// `None` when the mock rejected the submission.
    pub hash: Option<H256>,
}

impl SentTx {
    pub fn data(&self) -> Vec<u8> {
        self.request.data.as_ref().map(|d| d.to_vec()).unwrap_or_default()
    }

    pub fn gas(&self) -> Option<U256> {
        self.request.gas
    }
}

#[derive(Default)]
struct State {
    native: HashMap<Address, U256>,
    tokens: HashMap<Address, (u8, String)>,
    token_balances: HashMap<(Address, Address), U256>,
    nonces: HashMap<Address, U256>,
    sent: Vec<SentTx>,
    reject_all_sends: bool,
    /// 1-based index of the router-bound submission to reject.
    reject_router_send: Option<usize>,
    router_sends: usize,
    revert_router_txs: bool,
    revert_token_txs: bool,
    unreadable_tokens: Vec<Address>,
    native_balance_fails: bool,
    stall_router_receipts: bool,
    block_number_fails: bool,
}

pub struct MockChain {
    router: Address,
    state: Mutex<State>,
    calls: AtomicUsize,
    lookups: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self {
            router: addr(ROUTER),
            state: Mutex::new(State::default()),
            calls: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        };
        chain.register_token(addr(TOKEN_USD), 18, "USDT");
        chain.register_token(addr(TOKEN_ETH), 18, "ETH");
        chain.register_token(addr(TOKEN_BTC), 18, "BTC");
        chain
    }

    pub fn register_token(&self, token: Address, decimals: u8, symbol: &str) {
        self.state.lock().unwrap().tokens.insert(token, (decimals, symbol.to_string()));
    }

    pub fn set_native_balance(&self, owner: Address, wei: U256) {
        self.state.lock().unwrap().native.insert(owner, wei);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().unwrap().token_balances.insert((token, owner), amount);
    }

    pub fn reject_all_sends(&self) {
        self.state.lock().unwrap().reject_all_sends = true;
    }

    pub fn reject_router_send(&self, nth: usize) {
        self.state.lock().unwrap().reject_router_send = Some(nth);
    }

    pub fn revert_router_txs(&self) {
        self.state.lock().unwrap().revert_router_txs = true;
    }

    /// Transactions sent to a token contract (approvals) are mined with failed status.
    pub fn revert_token_txs(&self) {
        self.state.lock().unwrap().revert_token_txs = true;
    }

    pub fn fail_token_balance(&self, token: Address) {
        self.state.lock().unwrap().unreadable_tokens.push(token);
    }

    pub fn fail_native_balance(&self) {
        self.state.lock().unwrap().native_balance_fails = true;
    }

    pub fn stall_router_receipts(&self) {
        self.state.lock().unwrap().stall_router_receipts = true;
    }

    pub fn set_block_number_fails(&self, fails: bool) {
        self.state.lock().unwrap().block_number_fails = fails;
    }

    /// Every submission attempt, accepted or not, in order.
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn router_txs(&self) -> Vec<SentTx> {
        self.sent().into_iter().filter(|tx| tx.to == Some(self.router)).collect()
    }

    /// Submissions that are neither to the router nor to a known token.
    pub fn native_transfers(&self) -> Vec<SentTx> {
        let state = self.state.lock().unwrap();
        state
            .sent
            .iter()
            .filter(|tx| {
                tx.to
                    .map(|to| to != self.router && !state.tokens.contains_key(&to))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of post-failure transaction lookups.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn sent_by_hash(&self, hash: H256) -> Option<SentTx> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .find(|tx| tx.hash == Some(hash))
            .cloned()
    }

    fn receipt_for(&self, tx: &SentTx) -> TransactionReceipt {
        let state = self.state.lock().unwrap();
        let reverted = match tx.to {
            Some(to) if to == self.router => state.revert_router_txs,
            Some(to) if state.tokens.contains_key(&to) => state.revert_token_txs,
            _ => false,
        };
        TransactionReceipt {
            transaction_hash: tx.hash.unwrap_or_default(),
            block_number: Some(U64::from(100)),
            gas_used: tx.request.gas,
            status: Some(U64::from(if reverted { 0 } else { 1 })),
            ..Default::default()
        }
    }

    fn token(&self, token: Address) -> Result<(u8, String), ChainError> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| ChainError::Decode {
                call: "decimals",
                reason: format!("no contract at {token:?}"),
            })
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.touch();
        if self.state.lock().unwrap().block_number_fails {
            return Err(ChainError::Submission("connection refused".into()));
        }
        Ok(100)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.touch();
        let state = self.state.lock().unwrap();
        if state.native_balance_fails {
            return Err(ChainError::Submission("request timed out".into()));
        }
        Ok(state.native.get(&address).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, address: Address) -> Result<U256, ChainError> {
        self.touch();
        Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        self.touch();
        Ok(self.token(token)?.0)
    }

    async fn token_symbol(&self, token: Address) -> Result<String, ChainError> {
        self.touch();
        Ok(self.token(token)?.1)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        self.touch();
        self.token(token)?;
        if self.state.lock().unwrap().unreadable_tokens.contains(&token) {
            return Err(ChainError::Decode {
                call: "balanceOf",
                reason: "execution reverted".into(),
            });
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .token_balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        wallet: &WalletHandle,
        tx: TransactionRequest,
    ) -> Result<H256, ChainError> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        let to = tx.to.as_ref().and_then(|t| t.as_address().copied());
        let from = wallet.address();

        let mut rejected = state.reject_all_sends;
        if to == Some(self.router) {
            state.router_sends += 1;
            rejected |= state.reject_router_send == Some(state.router_sends);
        }

        let hash = (!rejected).then(|| H256::from_low_u64_be(state.sent.len() as u64 + 1));
        state.sent.push(SentTx {
            from,
            to,
            request: tx,
            hash,
        });

        match hash {
            Some(hash) => {
                *state.nonces.entry(from).or_default() += U256::one();
                Ok(hash)
            }
            None => Err(ChainError::Submission("insufficient funds for gas".into())),
        }
    }

    async fn wait_for_receipt(
        &self,
        hash: H256,
        _confirmations: usize,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.touch();
        let Some(tx) = self.sent_by_hash(hash) else {
            return Ok(None);
        };
        let stalled = tx.to == Some(self.router) && self.state.lock().unwrap().stall_router_receipts;
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(Some(self.receipt_for(&tx)))
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        self.touch();
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.sent_by_hash(hash).map(|tx| Transaction {
            hash,
            from: tx.from,
            to: tx.to,
            nonce: tx.request.nonce.unwrap_or_default(),
            gas_price: tx.request.gas_price,
            gas: tx.request.gas.unwrap_or_default(),
            ..Default::default()
        }))
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.touch();
        let Some(tx) = self.sent_by_hash(hash) else {
            return Ok(None);
        };
        if tx.to == Some(self.router) && self.state.lock().unwrap().stall_router_receipts {
            return Ok(None);
        }
        Ok(Some(self.receipt_for(&tx)))
    }
}
