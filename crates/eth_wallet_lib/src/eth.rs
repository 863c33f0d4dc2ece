use crate::error::*;
use crate::{err_custom_create, err_from};
use lazy_static::lazy_static;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1};
use sha3::Digest;
use sha3::Keccak256;
use std::str::FromStr;
use web3::types::{Address, H256};

lazy_static! {
    pub static ref SECP256K1: Secp256k1<All> = Secp256k1::new();
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(Keccak256::digest(data).as_slice());
    out
}

pub fn get_eth_addr_from_public_key(public_key: &PublicKey) -> Address {
    Address::from_slice(&keccak256(&public_key.serialize_uncompressed()[1..65])[12..])
}

/// `0x` followed by exactly 40 hex characters, any case.
pub fn validate_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex_part.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn validate_transaction_hash(tx_hash: &str) -> bool {
    match tx_hash.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 64 && hex_part.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// `0x` + r(32) + s(32) + v(1) as hex.
pub fn validate_signature(signature: &str) -> bool {
    signature.len() == 132
        && signature.starts_with("0x")
        && signature[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// EIP-55 mixed case representation.
pub fn to_checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn checksum_validate_address(address: &str) -> bool {
    if !validate_address(address) {
        return false;
    }
    match Address::from_str(address) {
        Ok(parsed) => to_checksum_address(&parsed) == address,
        Err(_) => false,
    }
}

/// Parses an address that was already checked with [`validate_address`].
pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    Address::from_str(address).map_err(err_from!())
}

pub fn format_address(address: &Address) -> String {
    format!("{:#x}", address)
}

pub fn parse_tx_hash(tx_hash: &str) -> Result<H256, WalletError> {
    H256::from_str(tx_hash).map_err(err_from!())
}

pub fn recover_address(
    message_hash: &[u8; 32],
    rs: &[u8; 64],
    recovery_id: i32,
) -> Result<Address, WalletError> {
    let recovery_id = RecoveryId::from_i32(recovery_id).map_err(err_from!())?;
    let signature = RecoverableSignature::from_compact(rs, recovery_id).map_err(err_from!())?;
    let message = Message::from_slice(message_hash).map_err(err_from!())?;
    let public_key = SECP256K1
        .recover_ecdsa(&message, &signature)
        .map_err(err_from!())?;
    Ok(get_eth_addr_from_public_key(&public_key))
}

/// Hash of a message signed with `personal_sign`.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// Checks that `signature` over `message` (personal_sign) was made by `address`.
pub fn personal_ecrecover(
    message: &str,
    signature: &str,
    address: &str,
) -> Result<bool, WalletError> {
    if !validate_signature(signature) {
        return Ok(false);
    }
    let sig = hex::decode(&signature[2..]).map_err(err_from!())?;
    let mut rs = [0u8; 64];
    rs.copy_from_slice(&sig[..64]);
    let v = sig[64];
    let recovery_id = match v {
        0 | 1 => v as i32,
        27 | 28 => (v - 27) as i32,
        _ => return Ok(false),
    };
    let recovered = match recover_address(&personal_message_hash(message), &rs, recovery_id) {
        Ok(recovered) => recovered,
        Err(err) => {
            log::debug!("Failed to recover personal signature: {}", err);
            return Ok(false);
        }
    };
    let expected = Address::from_str(address)
        .map_err(|_| err_custom_create!("Stored address is invalid: {}", address))?;
    Ok(recovered == expected)
}


#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;

    #[test]
    fn test_get_eth_addr_from_secret() {
        let sk = secret_key(1);
        let addr = format!("{:#x}", address_of(&sk));
        assert_eq!(addr, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_checksum_address() {
        let checksummed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(checksum_validate_address(checksummed));
        assert!(!checksum_validate_address(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD"
        ));
        let parsed = Address::from_str(checksummed).unwrap();
        assert_eq!(to_checksum_address(&parsed), checksummed);
    }

    #[test]
    fn test_validate_formats() {
        assert!(validate_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!validate_address("7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!validate_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bd"));
        assert!(!validate_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdg"));
        assert!(validate_transaction_hash(&format!("0x{}", "ab".repeat(32))));
        assert!(!validate_transaction_hash("0x1234"));
        assert!(validate_signature(&format!("0x{}", "00".repeat(65))));
        assert!(!validate_signature(&format!("0x{}", "00".repeat(64))));
    }

    #[test]
    fn test_personal_ecrecover() {
        let sk = secret_key(7);
        let address = format!("{:#x}", address_of(&sk));
        let signature = personal_sign("Cancel transaction 0x01", &sk);
        assert!(personal_ecrecover("Cancel transaction 0x01", &signature, &address).unwrap());
        assert!(!personal_ecrecover("Cancel transaction 0x02", &signature, &address).unwrap());
        let other = format!("{:#x}", address_of(&secret_key(8)));
        assert!(!personal_ecrecover("Cancel transaction 0x01", &signature, &other).unwrap());
    }
}
