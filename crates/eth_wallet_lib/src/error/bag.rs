use crate::error::{CustomError, NodeError, RejectedError};
use crate::utils::ConversionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorBag {
    #[error("{0}")]
    Rejected(#[from] RejectedError),
    #[error("Hex conversion error: {0}")]
    HexError(#[from] rustc_hex::FromHexError),
    #[error("Hex decode error: {0}")]
    HexDecodeError(#[from] hex::FromHexError),
    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("sqlx migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("conversion error: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("node error: {0}")]
    NodeError(#[from] NodeError),
    #[error("web3 error: {0}")]
    Web3Error(#[from] web3::Error),
    #[error("abi error: {0}")]
    Web3AbiError(#[from] web3::ethabi::Error),
    #[error("rlp error: {0}")]
    RlpError(#[from] rlp::DecoderError),
    #[error("secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    CustomError(#[from] CustomError),
}
