pub mod balance;
pub mod clients;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod swap_engine;
pub mod transfer;
pub mod wallet;

pub use clients::{ChainClient, ChainError, EvmClient};
pub use config::AppConfig;
pub use orchestrator::Orchestrator;
