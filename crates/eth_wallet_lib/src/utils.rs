use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use web3::types::U256;

#[derive(Debug, Clone)]
pub struct ConversionError {
    pub msg: String,
}

impl ConversionError {
    pub fn from(msg: String) -> Self {
        Self { msg }
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error during conversion: {}", self.msg)
    }
}

impl Error for ConversionError {}

pub fn gwei_to_u256(gas: f64) -> Result<U256, ConversionError> {
    pub const GWEI: f64 = 1.0E9;
    if gas.is_nan() {
        return Err(ConversionError {
            msg: "Gas price cannot be NaN".to_string(),
        });
    }
    if gas < 0.0 {
        return Err(ConversionError {
            msg: "Gas price cannot be negative".to_string(),
        });
    }
    if gas > 1.0E9 {
        return Err(ConversionError {
            msg: "Gas price cannot be greater than 1E9".to_string(),
        });
    }
    Ok(U256::from((gas * GWEI) as u64))
}

/// Converts wei into a human readable decimal (18 decimals by default). Only used for logs.
pub fn u256_to_rust_dec(amount: U256, decimals: Option<u32>) -> Result<Decimal, ConversionError> {
    let decimals = decimals.unwrap_or(18);
    if decimals > 28 {
        return Err(ConversionError::from(format!(
            "Decimals {} exceeds supported precision",
            decimals
        )));
    }
    let mut dec = Decimal::from_str(&amount.to_string())
        .map_err(|err| ConversionError::from(format!("Amount {} does not fit: {}", amount, err)))?;
    dec.set_scale(decimals)
        .map_err(|err| ConversionError::from(format!("Cannot scale {}: {}", amount, err)))?;
    Ok(dec)
}

/// Canonical `0x` prefixed hex without padding, `0x0` for zero.
pub fn u256_to_hex(value: U256) -> String {
    format!("{:#x}", value)
}

/// Parses a `0x` hex string or a decimal string into U256.
pub fn parse_int_str(value: &str) -> Option<U256> {
    let value = value.trim();
    if let Some(hex_part) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        if hex_part.is_empty() || hex_part.len() > 64 {
            return None;
        }
        U256::from_str_radix(hex_part, 16).ok()
    } else {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        U256::from_dec_str(value).ok()
    }
}

/// Parses an integer from a JSON value (non-negative number, hex or decimal string).
pub fn parse_int(value: &Value) -> Option<U256> {
    match value {
        Value::Number(num) => num.as_u64().map(U256::from),
        Value::String(s) => parse_int_str(s),
        _ => None,
    }
}

/// Reads a hex amount stored in the ledger.
pub fn hex_to_u256(value: &str) -> Result<U256, ConversionError> {
    parse_int_str(value)
        .ok_or_else(|| ConversionError::from(format!("Cannot parse stored amount: {}", value)))
}

/// `0x` prefixed lowercase hex of a byte string.
pub fn data_encoder(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decodes a `0x` hex byte string. Odd length input is left padded with a single zero.
pub fn data_decoder(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let data = data.strip_prefix("0x").unwrap_or(data);
    if data.len() % 2 == 1 {
        hex::decode(format!("0{}", data))
    } else {
        hex::decode(data)
    }
}
