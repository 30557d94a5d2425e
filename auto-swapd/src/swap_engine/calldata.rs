//! Raw calldata for the deployed swap router.
//!
//! The router exposes two call shapes with the same argument tuple
//! `(address,address,uint256,address,uint256,uint256,uint256,uint8)`.
//! Selectors and the `flags`/`v` values were observed on successful on-chain
//! transactions and are opaque constants here.

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};

use super::models::SwapCallParams;
use crate::config::TokenAddresses;

pub const STANDARD_SWAP_SELECTOR: [u8; 4] = [0x41, 0x4b, 0xf3, 0x89];
pub const ETH_TO_BTC_SWAP_SELECTOR: [u8; 4] = [0xdb, 0x3e, 0x21, 0x98];

pub const SWAP_FLAGS: u64 = 100;
pub const SWAP_V: u8 = 0;

pub const STANDARD_SLIPPAGE: f64 = 0.01;
pub const ETH_TO_BTC_SLIPPAGE: f64 = 0.08;

pub const STANDARD_GAS_MULTIPLIER: u64 = 3;
pub const ETH_TO_BTC_GAS_MULTIPLIER: u64 = 5;

/// Approvals cover twice the swap amount.
pub const APPROVAL_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterCall {
    Standard,
    EthToBtc,
}

impl RouterCall {
    /// Depends only on the token pair.
    pub fn for_pair(token_in: Address, token_out: Address, tokens: &TokenAddresses) -> Self {
        if token_in == tokens.eth && token_out == tokens.btc {
            RouterCall::EthToBtc
        } else {
            RouterCall::Standard
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            RouterCall::Standard => STANDARD_SWAP_SELECTOR,
            RouterCall::EthToBtc => ETH_TO_BTC_SWAP_SELECTOR,
        }
    }

    pub fn slippage(&self) -> f64 {
        match self {
            RouterCall::Standard => STANDARD_SLIPPAGE,
            RouterCall::EthToBtc => ETH_TO_BTC_SLIPPAGE,
        }
    }

    pub fn gas_limit(&self, base_gas_limit: u64) -> u64 {
        let multiplier = match self {
            RouterCall::Standard => STANDARD_GAS_MULTIPLIER,
            RouterCall::EthToBtc => ETH_TO_BTC_GAS_MULTIPLIER,
        };
        base_gas_limit.saturating_mul(multiplier)
    }
}

/// `floor(slippage * 1000)`, i.e. the tolerance in tenths of a percent.
pub fn slippage_permille(slippage: f64) -> u64 {
    (slippage * 1000.0).floor().clamp(0.0, 1000.0) as u64
}

/// `amount_in * (1000 - floor(slippage * 1000)) / 1000` in integer arithmetic.
pub fn min_amount_out(amount_in: U256, slippage: f64) -> U256 {
    let keep = 1000 - slippage_permille(slippage);
    amount_in.saturating_mul(U256::from(keep)) / U256::from(1000u64)
}

pub fn approval_amount(amount_in: U256) -> U256 {
    amount_in.saturating_mul(U256::from(APPROVAL_MULTIPLIER))
}

pub fn encode_swap_call(call: RouterCall, params: &SwapCallParams) -> Bytes {
    let args = encode(&[
        Token::Address(params.token_in),
        Token::Address(params.token_out),
        Token::Uint(U256::from(SWAP_FLAGS)),
        Token::Address(params.recipient),
        Token::Uint(U256::from(params.deadline)),
        Token::Uint(params.amount_in),
        Token::Uint(params.amount_out_min),
        Token::Uint(U256::from(SWAP_V)),
    ]);

    let mut data = call.selector().to_vec();
    data.extend(args);
    Bytes::from(data)
}
