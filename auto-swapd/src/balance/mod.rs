use ethers::types::{Address, U256};
use ethers::utils::format_units;
use std::sync::Arc;
use tracing::{error, info};

use crate::clients::{ChainClient, ChainError};

/// A token balance as read from the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    /// Human units.
    pub amount: f64,
    pub symbol: String,
    pub decimals: u8,
    /// Base units.
    pub raw: U256,
}

impl TokenBalance {
    /// Placeholder used when the balance could not be read.
    pub fn zero(symbol: &str) -> Self {
        Self {
            amount: 0.0,
            symbol: symbol.to_string(),
            decimals: 18,
            raw: U256::zero(),
        }
    }
}

pub struct BalanceOracle<C> {
    client: Arc<C>,
}

impl<C: ChainClient> BalanceOracle<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Native balance in human units.
    pub async fn native_balance(&self, address: Address) -> Result<f64, ChainError> {
        let wei = self.client.native_balance(address).await?;
        to_human(wei, 18, "balance")
    }

    pub async fn token_balance(&self, owner: Address, token: Address) -> Result<TokenBalance, ChainError> {
        let decimals = self.client.token_decimals(token).await?;
        let symbol = self.client.token_symbol(token).await?;
        let raw = self.client.token_balance(token, owner).await?;

        Ok(TokenBalance {
            amount: to_human(raw, decimals, "balanceOf")?,
            symbol,
            decimals,
            raw,
        })
    }

    /// Like [`Self::token_balance`] but never fails: a read error yields a zero
    /// balance so one unreadable token does not block the others.
    pub async fn token_balance_or_zero(&self, owner: Address, token: Address, label: &str) -> TokenBalance {
        match self.token_balance(owner, token).await {
            Ok(balance) => {
                info!("Wallet {:?} {} Balance: {} {}", owner, label, balance.amount, balance.symbol);
                balance
            }
            Err(e) => {
                error!("Could not read {} balance of {:?}: {}", label, owner, e);
                TokenBalance::zero(label)
            }
        }
    }
}

fn to_human(raw: U256, decimals: u8, call: &'static str) -> Result<f64, ChainError> {
    let formatted = format_units(raw, decimals as u32).map_err(|e| ChainError::Decode {
        call,
        reason: e.to_string(),
    })?;
    formatted.parse::<f64>().map_err(|e| ChainError::Decode {
        call,
        reason: e.to_string(),
    })
}
