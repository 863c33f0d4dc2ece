use crate::error::*;
use crate::eth::{keccak256, recover_address};
use crate::{err_custom_create, err_from};
use rlp::{Rlp, RlpStream};
use web3::types::{Address, U256};

pub const TX_GAS: u64 = 21000;
pub const TX_GAS_CONTRACT_CREATION: u64 = 32000;
pub const TX_DATA_ZERO_GAS: u64 = 4;
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;

lazy_static::lazy_static! {
    /// secp256k1n / 2, signatures with a higher `s` are malleable copies
    static ref SECP256K1N_HALF: U256 = U256::from_str_radix(
        "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
        16
    )
    .unwrap_or_default();
}

/// Legacy (pre EIP-2718) transaction as it travels between client and service.
///
/// Unsigned transactions carry the network id in `v` with `r = s = 0`, which is
/// exactly the EIP-155 signing payload. `v = 0` means the transaction is valid on
/// every network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl RawTransaction {
    pub fn new_unsigned(
        nonce: U256,
        gas_price: U256,
        gas: U256,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
        network_id: Option<u64>,
    ) -> Self {
        Self {
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            v: network_id.unwrap_or(0),
            r: U256::zero(),
            s: U256::zero(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.r.is_zero() && !self.s.is_zero()
    }

    pub fn network_id(&self) -> Option<u64> {
        if self.is_signed() {
            if self.v >= 35 {
                Some((self.v - 35) / 2)
            } else {
                None
            }
        } else if self.v == 0 {
            None
        } else {
            Some(self.v)
        }
    }

    fn append_payload(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas);
        match &self.to {
            Some(to) => stream.append(to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_payload(&mut stream);
        stream.append(&self.v);
        stream.append(&self.r);
        stream.append(&self.s);
        stream.out().to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WalletError> {
        let rlp = Rlp::new(bytes);
        if !rlp.is_list() || rlp.item_count().map_err(err_from!())? != 9 {
            return Err(err_custom_create!("Expected RLP list of 9 items"));
        }
        if rlp.payload_info().map_err(err_from!())?.total() != bytes.len() {
            return Err(err_custom_create!("Trailing bytes after transaction"));
        }
        let to_item = rlp.at(3).map_err(err_from!())?;
        let to_bytes = to_item.data().map_err(err_from!())?;
        let to = match to_bytes.len() {
            0 => None,
            20 => Some(Address::from_slice(to_bytes)),
            len => return Err(err_custom_create!("Invalid recipient length {}", len)),
        };
        Ok(Self {
            nonce: rlp.val_at(0).map_err(err_from!())?,
            gas_price: rlp.val_at(1).map_err(err_from!())?,
            gas: rlp.val_at(2).map_err(err_from!())?,
            to,
            value: rlp.val_at(4).map_err(err_from!())?,
            data: rlp.val_at(5).map_err(err_from!())?,
            v: rlp.val_at(6).map_err(err_from!())?,
            r: rlp.val_at(7).map_err(err_from!())?,
            s: rlp.val_at(8).map_err(err_from!())?,
        })
    }

    /// Hash that the sender signs.
    pub fn signing_hash(&self) -> [u8; 32] {
        let stream = match self.network_id() {
            Some(network_id) => {
                let mut stream = RlpStream::new_list(9);
                self.append_payload(&mut stream);
                stream.append(&network_id);
                stream.append(&0u8);
                stream.append(&0u8);
                stream
            }
            None => {
                let mut stream = RlpStream::new_list(6);
                self.append_payload(&mut stream);
                stream
            }
        };
        keccak256(&stream.out())
    }

    /// Canonical transaction hash of the signed encoding.
    pub fn hash(&self) -> [u8; 32] {
        keccak256(&self.encode())
    }

    fn recovery_id(&self) -> Result<i32, WalletError> {
        match self.v {
            27 | 28 => Ok((self.v - 27) as i32),
            v if v >= 35 => Ok(((v - 35) % 2) as i32),
            v => Err(err_custom_create!("Invalid signature v value {}", v)),
        }
    }

    /// Detached form of the signature: r(32) s(32) recovery id(1).
    pub fn signature(&self) -> Result<[u8; 65], WalletError> {
        if !self.is_signed() {
            return Err(err_custom_create!("Transaction is not signed"));
        }
        let mut sig = [0u8; 65];
        self.r.to_big_endian(&mut sig[0..32]);
        self.s.to_big_endian(&mut sig[32..64]);
        sig[64] = self.recovery_id()? as u8;
        Ok(sig)
    }

    /// Attaches a detached signature, keeping the network id embedded in `v`.
    pub fn add_signature(&mut self, signature: &[u8]) -> Result<(), WalletError> {
        if signature.len() != 65 {
            return Err(err_custom_create!(
                "Invalid signature length {}",
                signature.len()
            ));
        }
        let recovery_id = match signature[64] {
            v @ (0 | 1) => v as u64,
            v @ (27 | 28) => (v - 27) as u64,
            v => return Err(err_custom_create!("Invalid signature recovery id {}", v)),
        };
        let network_id = self.network_id();
        self.r = U256::from_big_endian(&signature[0..32]);
        self.s = U256::from_big_endian(&signature[32..64]);
        self.v = match network_id {
            Some(network_id) => 35 + network_id * 2 + recovery_id,
            None => 27 + recovery_id,
        };
        Ok(())
    }

    /// Recovers the address that signed the transaction.
    pub fn sender(&self) -> Result<Address, WalletError> {
        let signature = self.signature()?;
        if self.s > *SECP256K1N_HALF {
            return Err(err_custom_create!("Signature s value is too high"));
        }
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&signature[..64]);
        recover_address(&self.signing_hash(), &rs, signature[64] as i32)
    }

    /// Gas charged before any execution happens.
    pub fn intrinsic_gas_used(&self) -> U256 {
        let zero_bytes = self.data.iter().filter(|b| **b == 0).count() as u64;
        let non_zero_bytes = self.data.len() as u64 - zero_bytes;
        let mut gas = TX_GAS + zero_bytes * TX_DATA_ZERO_GAS + non_zero_bytes * TX_DATA_NON_ZERO_GAS;
        if self.to.is_none() {
            gas += TX_GAS_CONTRACT_CREATION;
        }
        U256::from(gas)
    }

    /// Value plus the maximum fee, `None` on overflow.
    pub fn max_cost(&self) -> Option<U256> {
        self.gas
            .checked_mul(self.gas_price)
            .and_then(|fee| fee.checked_add(self.value))
    }
}

#[cfg(test)]
pub mod test_signing {
    use super::*;
    use crate::eth::SECP256K1;
    use secp256k1::{Message, SecretKey};

    pub fn sign_detached(tx: &RawTransaction, secret_key: &SecretKey) -> [u8; 65] {
        let message = Message::from_slice(&tx.signing_hash()).unwrap();
        let (recovery_id, rs) = SECP256K1
            .sign_ecdsa_recoverable(&message, secret_key)
            .serialize_compact();
        let mut sig = [0u8; 65];
        sig[..64].copy_from_slice(&rs);
        sig[64] = recovery_id.to_i32() as u8;
        sig
    }

    pub fn sign(tx: &RawTransaction, secret_key: &SecretKey) -> RawTransaction {
        let sig = sign_detached(tx, secret_key);
        let mut signed = tx.clone();
        signed.add_signature(&sig).unwrap();
        signed
    }
}
