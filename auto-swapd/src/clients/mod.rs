pub mod chain;
pub mod erc20;
pub mod evm;

pub use chain::{receipt_succeeded, send_with_fresh_nonce, ChainClient, ChainError};
pub use evm::EvmClient;
