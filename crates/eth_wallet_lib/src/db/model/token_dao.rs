use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVisibility {
    Hidden = 0,
    Auto = 1,
    Manual = 2,
}

#[derive(Serialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TokenDao {
    pub contract_address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i64>,
    pub icon: Option<String>,
    pub custom: bool,
    pub ready: bool,
}

#[derive(Serialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceDao {
    pub contract_address: String,
    pub eth_address: String,
    pub balance: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<i64>,
    pub visibility: i64,
}

/// Cached balance joined with token metadata, per-user overrides applied.
#[derive(Serialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceViewDao {
    pub contract_address: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i64>,
    pub balance: String,
    pub icon: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, Debug, Clone)]
pub struct TokenRegistrationDao {
    pub eth_address: String,
    pub last_queried: DateTime<Utc>,
}
