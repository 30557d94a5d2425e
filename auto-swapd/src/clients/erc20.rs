//! Hand-encoded ERC-20 calls. Only the handful of methods the bot touches.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use super::ChainError;

pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}

pub fn decimals_call() -> Bytes {
    encode_call("decimals()", &[])
}

pub fn symbol_call() -> Bytes {
    encode_call("symbol()", &[])
}

pub fn balance_of_call(owner: Address) -> Bytes {
    encode_call("balanceOf(address)", &[Token::Address(owner)])
}

pub fn approve_call(spender: Address, amount: U256) -> Bytes {
    encode_call("approve(address,uint256)", &[Token::Address(spender), Token::Uint(amount)])
}

pub fn decode_uint(call: &'static str, data: &[u8]) -> Result<U256, ChainError> {
    decode(&[ParamType::Uint(256)], data)
        .map_err(|e| ChainError::Decode { call, reason: e.to_string() })?
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| ChainError::Decode { call, reason: "empty response".into() })
}

pub fn decode_decimals(data: &[u8]) -> Result<u8, ChainError> {
    let value = decode_uint("decimals", data)?;
    if value > U256::from(u8::MAX) {
        return Err(ChainError::Decode {
            call: "decimals",
            reason: format!("{value} does not fit in uint8"),
        });
    }
    Ok(value.low_u32() as u8)
}

/// Accepts both the standard `string` return and the legacy `bytes32` one.
pub fn decode_symbol(data: &[u8]) -> Result<String, ChainError> {
    if let Ok(tokens) = decode(&[ParamType::String], data) {
        if let Some(symbol) = tokens.into_iter().next().and_then(Token::into_string) {
            return Ok(symbol);
        }
    }

    let raw = decode(&[ParamType::FixedBytes(32)], data)
        .map_err(|e| ChainError::Decode { call: "symbol", reason: e.to_string() })?
        .into_iter()
        .next()
        .and_then(Token::into_fixed_bytes)
        .ok_or_else(|| ChainError::Decode { call: "symbol", reason: "empty response".into() })?;

    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}
