use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    New,
    Queued,
    Unconfirmed,
    Confirmed,
    Error,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::New => "new",
            TransactionStatus::Queued => "queued",
            TransactionStatus::Unconfirmed => "unconfirmed",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Error => "error",
        }
    }

    /// `new` is shown to clients as `queued`.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransactionStatus::New => "queued",
            other => other.as_str(),
        }
    }

    /// Not yet handed over to the network.
    pub fn is_queued(&self) -> bool {
        matches!(self, TransactionStatus::New | TransactionStatus::Queued)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TransactionStatus::New),
            "queued" => Ok(TransactionStatus::Queued),
            "unconfirmed" => Ok(TransactionStatus::Unconfirmed),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "error" => Ok(TransactionStatus::Error),
            other => Err(format!("Unknown transaction status: {}", other)),
        }
    }
}

#[derive(Serialize, sqlx::FromRow, Debug, Clone)]
pub struct TransactionDao {
    pub transaction_id: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: Option<String>,
    pub nonce: i64,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub data: Option<String>,
    pub v: Option<String>,
    pub r: Option<String>,
    pub s: Option<String>,
    pub sender_id: Option<String>,
    pub status: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub blocknumber: Option<i64>,
}

impl TransactionDao {
    pub fn status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status).ok()
    }
}

#[derive(Serialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TokenTransactionDao {
    pub transaction_id: i64,
    pub transaction_log_index: i64,
    pub contract_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
}
