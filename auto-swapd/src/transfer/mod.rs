pub mod engine;

pub use engine::{transfer_amount, NativeTransferOutcome, TransferEngine};

use ethers::types::Address;
use std::collections::HashSet;

/// Wallets whose one-time native transfer is done, whether it was sent,
/// skipped for lack of funds, or failed. Lives for the process lifetime only.
#[derive(Debug, Default, Clone)]
pub struct ProcessedSet {
    wallets: HashSet<Address>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.wallets.contains(address)
    }

    /// Returns `false` if the wallet was already marked.
    pub fn mark(&mut self, address: Address) -> bool {
        self.wallets.insert(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
