use ethers::types::{Address, H256, U256};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::clients::ChainError;
use crate::config::TokenAddresses;

/// The four fixed swap directions, in the order `ALL` mode runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    EthToUsd,
    BtcToUsd,
    BtcToEth,
    EthToBtc,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::EthToUsd,
        Direction::BtcToUsd,
        Direction::BtcToEth,
        Direction::EthToBtc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::EthToUsd => "ETH_TO_USD",
            Direction::BtcToUsd => "BTC_TO_USD",
            Direction::BtcToEth => "BTC_TO_ETH",
            Direction::EthToBtc => "ETH_TO_BTC",
        }
    }

    pub fn token_in(&self) -> Asset {
        match self {
            Direction::EthToUsd | Direction::EthToBtc => Asset::Eth,
            Direction::BtcToUsd | Direction::BtcToEth => Asset::Btc,
        }
    }

    pub fn token_out(&self) -> Asset {
        match self {
            Direction::EthToUsd | Direction::BtcToUsd => Asset::Usd,
            Direction::BtcToEth => Asset::Eth,
            Direction::EthToBtc => Asset::Btc,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown swap direction: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Asset {
    Usd,
    Eth,
    Btc,
}

impl Asset {
    pub fn label(&self) -> &'static str {
        match self {
            Asset::Usd => "USD",
            Asset::Eth => "ETH",
            Asset::Btc => "BTC",
        }
    }

    pub fn address(&self, tokens: &TokenAddresses) -> Address {
        match self {
            Asset::Usd => tokens.usd,
            Asset::Eth => tokens.eth,
            Asset::Btc => tokens.btc,
        }
    }
}

/// Which directions a wallet attempts in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SwapMode {
    Single(Direction),
    Random,
    All,
    /// A configured name that matches no mode. Every wallet skips its swaps.
    Unknown(String),
}

impl SwapMode {
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Direction> {
        match self {
            SwapMode::All => Direction::ALL.to_vec(),
            SwapMode::Random => vec![Direction::ALL[rng.gen_range(0..Direction::ALL.len())]],
            SwapMode::Single(direction) => vec![*direction],
            SwapMode::Unknown(_) => Vec::new(),
        }
    }
}

impl FromStr for SwapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(SwapMode::All),
            "RANDOM" => Ok(SwapMode::Random),
            other => other.parse::<Direction>().map(SwapMode::Single),
        }
    }
}

/// One swap attempt: `amount_in` of `token_in` (human units) into `token_out`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub direction: Direction,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: f64,
}

impl SwapRequest {
    pub fn new(direction: Direction, tokens: &TokenAddresses, amount_in: f64) -> Self {
        Self {
            direction,
            token_in: direction.token_in().address(tokens),
            token_out: direction.token_out().address(tokens),
            amount_in,
        }
    }
}

/// Calldata for the router's swap entry point, before the selector is prepended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCallParams {
    pub token_in: Address,
    pub token_out: Address,
    pub recipient: Address,
    pub deadline: u64,
    pub amount_in: U256,
    pub amount_out_min: U256,
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Swap amount {amount} rounds to zero base units")]
    AmountTooSmall { amount: f64 },

    #[error("Cannot convert {amount} to base units: {reason}")]
    Conversion { amount: f64, reason: String },
}

impl SwapError {
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            SwapError::Chain(e) => e.tx_hash(),
            _ => None,
        }
    }

    /// Label used for the `outcome` metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            SwapError::Chain(ChainError::Reverted(_)) => "reverted",
            SwapError::Chain(ChainError::ConfirmationTimeout { .. }) => "timeout",
            SwapError::AmountTooSmall { .. } => "skipped",
            _ => "failed",
        }
    }
}
