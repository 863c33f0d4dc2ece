use crate::error::*;
use crate::{err_custom_create, err_from};
use web3::ethabi::{ParamType, Token};
use web3::types::{Address, U256};

pub const ERC20_BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
pub const ERC20_NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
pub const ERC20_SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
pub const ERC20_DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
pub const ERC20_TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

const ERC20_TRANSFER_DATA_LEN: usize = 4 + 32 * 2;
const ERC20_TRANSFER_FROM_DATA_LEN: usize = 4 + 32 * 3;

fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend(web3::ethabi::encode(args));
    data
}

pub fn get_erc20_balance_of(address: Address) -> Vec<u8> {
    encode_call(ERC20_BALANCE_OF_SELECTOR, &[Token::Address(address)])
}

pub fn get_erc20_transfer(to: Address, amount: U256) -> Vec<u8> {
    encode_call(
        ERC20_TRANSFER_SELECTOR,
        &[Token::Address(to), Token::Uint(amount)],
    )
}

pub fn get_erc20_transfer_from(from: Address, to: Address, amount: U256) -> Vec<u8> {
    encode_call(
        ERC20_TRANSFER_FROM_SELECTOR,
        &[Token::Address(from), Token::Address(to), Token::Uint(amount)],
    )
}

/// Token movement described by `transfer` / `transferFrom` call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20TransferCall {
    /// `None` for `transfer`, where the token sender is the transaction sender.
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
}

/// Detects `transfer(address,uint256)` and `transferFrom(address,address,uint256)` by
/// selector and exact length.
pub fn decode_erc20_transfer(data: &[u8]) -> Option<Erc20TransferCall> {
    let (has_from, params): (bool, &[ParamType]) = if data.len() == ERC20_TRANSFER_DATA_LEN
        && data[..4] == ERC20_TRANSFER_SELECTOR
    {
        (false, &[ParamType::Address, ParamType::Uint(256)])
    } else if data.len() == ERC20_TRANSFER_FROM_DATA_LEN
        && data[..4] == ERC20_TRANSFER_FROM_SELECTOR
    {
        (
            true,
            &[ParamType::Address, ParamType::Address, ParamType::Uint(256)],
        )
    } else {
        return None;
    };
    let mut tokens = web3::ethabi::decode(params, &data[4..]).ok()?.into_iter();
    let from = if has_from {
        Some(tokens.next()?.into_address()?)
    } else {
        None
    };
    Some(Erc20TransferCall {
        from,
        to: tokens.next()?.into_address()?,
        value: tokens.next()?.into_uint()?,
    })
}

/// Interprets the result of `balanceOf`. Empty output is reported as `None` so the
/// caller can tell a failed call from a genuine zero.
pub fn decode_balance_of_result(result: &[u8]) -> Result<Option<U256>, WalletError> {
    if result.is_empty() {
        return Ok(None);
    }
    let significant = match result.iter().position(|b| *b != 0) {
        Some(pos) => &result[pos..],
        None => return Ok(Some(U256::zero())),
    };
    if significant.len() > 32 {
        return Err(err_custom_create!(
            "balanceOf result does not fit uint256: 0x{}",
            hex::encode(result)
        ));
    }
    Ok(Some(U256::from_big_endian(significant)))
}

pub fn decode_string_result(result: &[u8]) -> Result<Option<String>, WalletError> {
    if result.is_empty() {
        return Ok(None);
    }
    let tokens = web3::ethabi::decode(&[ParamType::String], result).map_err(err_from!())?;
    match tokens.into_iter().next() {
        Some(Token::String(s)) => Ok(Some(s)),
        _ => Err(err_custom_create!("Expected string in call result")),
    }
}

pub fn decode_uint_result(result: &[u8]) -> Result<Option<U256>, WalletError> {
    if result.is_empty() {
        return Ok(None);
    }
    let tokens = web3::ethabi::decode(&[ParamType::Uint(256)], result).map_err(err_from!())?;
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(Some(value)),
        _ => Err(err_custom_create!("Expected uint in call result")),
    }
}
