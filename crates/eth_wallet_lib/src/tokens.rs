use crate::contracts::*;
use crate::db::model::{TokenBalanceViewDao, TokenDao};
use crate::db::ops::*;
use crate::db::DbHandle;
use crate::dispatcher::Dispatcher;
use crate::error::*;
use crate::eth::{checksum_validate_address, format_address, parse_address, validate_address};
use crate::rpc::{ChainRpc, EthCall};
use crate::utils::{hex_to_u256, u256_to_hex, u256_to_rust_dec};
use crate::{err_from, err_reject};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use web3::types::{Address, U256};

/// Token metadata with the cached balance of one holder.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceDetails {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i64>,
    /// Same as `balance`, kept for older clients.
    pub value: String,
    pub balance: String,
    pub contract_address: String,
    pub icon: Option<String>,
}

impl TokenBalanceDetails {
    /// Balance in whole token units, `None` when the stored values cannot be represented.
    pub fn amount(&self) -> Option<Decimal> {
        let balance = hex_to_u256(&self.balance).ok()?;
        let decimals = u32::try_from(self.decimals.unwrap_or(18)).ok()?;
        u256_to_rust_dec(balance, Some(decimals)).ok()
    }
}

impl From<TokenBalanceViewDao> for TokenBalanceDetails {
    fn from(row: TokenBalanceViewDao) -> Self {
        Self {
            symbol: row.symbol,
            name: row.name,
            decimals: row.decimals,
            value: row.balance.clone(),
            balance: row.balance,
            contract_address: row.contract_address,
            icon: row.icon,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenDetails {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub contract_address: String,
    pub decimals: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    pub icon: Option<String>,
}

fn holder_address(address: &str) -> Result<String, WalletError> {
    let address = address.trim();
    if !validate_address(address) {
        return Err(err_reject!(InvalidParams, "invalid_address", "Invalid Address"));
    }
    Ok(address.to_lowercase())
}

fn token_address(address: &str) -> Result<String, WalletError> {
    let address = address.trim();
    if !validate_address(address) {
        return Err(err_reject!(
            InvalidParams,
            "invalid_token_address",
            "Invalid Token Address"
        ));
    }
    Ok(address.to_lowercase())
}

fn decimals_from(value: U256) -> Option<i64> {
    if value > U256::from(i64::MAX as u64) {
        None
    } else {
        Some(value.low_u64() as i64)
    }
}

/// Read side of the token balance cache.
#[derive(Clone)]
pub struct TokenDirectory {
    conn: DbHandle,
    rpc: Arc<dyn ChainRpc>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl TokenDirectory {
    pub fn new(conn: DbHandle, rpc: Arc<dyn ChainRpc>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            conn,
            rpc,
            dispatcher,
        }
    }

    /// Marks the holder as queried. First time holders (or `force_update`) get a full refresh.
    async fn register_holder(&self, eth_address: &str, force_update: bool) -> Result<(), WalletError> {
        let registered = {
            let mut conn = self.conn.lock().await;
            touch_token_registration(&mut conn, eth_address)
                .await
                .map_err(err_from!())?
        };
        if !registered || force_update {
            self.dispatcher.request_wildcard_token_refresh(eth_address);
            let mut conn = self.conn.lock().await;
            insert_token_registration(&mut conn, eth_address)
                .await
                .map_err(err_from!())?;
        }
        Ok(())
    }

    /// Visible token balances of `address`, ordered by symbol.
    pub async fn get_token_balances(
        &self,
        address: &str,
        force_update: bool,
    ) -> Result<Vec<TokenBalanceDetails>, WalletError> {
        let eth_address = holder_address(address)?;
        self.register_holder(&eth_address, force_update).await?;
        self.cached_token_balances(&eth_address).await
    }

    /// Visible token balances straight from the cache, without registering the holder.
    pub async fn cached_token_balances(
        &self,
        address: &str,
    ) -> Result<Vec<TokenBalanceDetails>, WalletError> {
        let eth_address = holder_address(address)?;
        let mut conn = self.conn.lock().await;
        let rows = get_visible_token_balances(&mut conn, &eth_address)
            .await
            .map_err(err_from!())?;
        Ok(rows.into_iter().map(TokenBalanceDetails::from).collect())
    }

    /// Cached balance of one token. `None` when the token is unknown.
    pub async fn get_token_balance(
        &self,
        address: &str,
        contract_address: &str,
        force_update: bool,
    ) -> Result<Option<TokenBalanceDetails>, WalletError> {
        let eth_address = holder_address(address)?;
        let contract_address = token_address(contract_address)?;
        self.register_holder(&eth_address, force_update).await?;

        let mut conn = self.conn.lock().await;
        let Some(token) = get_token(&mut conn, &contract_address)
            .await
            .map_err(err_from!())?
        else {
            return Ok(None);
        };
        let cached = get_token_balance(&mut conn, &contract_address, &eth_address)
            .await
            .map_err(err_from!())?;

        let (symbol, name, decimals, icon) = match (&cached, token.custom) {
            (Some(row), true) => (row.symbol.clone(), row.name.clone(), row.decimals, None),
            _ => (token.symbol, token.name, token.decimals, token.icon),
        };
        let balance = cached
            .map(|row| row.balance)
            .unwrap_or_else(|| "0x0".to_string());
        Ok(Some(TokenBalanceDetails {
            symbol,
            name,
            decimals,
            value: balance.clone(),
            balance,
            contract_address,
            icon,
        }))
    }

    /// Metadata of a token contract, resolving and recording unknown contracts.
    /// `None` when the contract does not answer `balanceOf`.
    pub async fn get_token(
        &self,
        contract_address: &str,
        holder: Option<&str>,
    ) -> Result<Option<TokenDetails>, WalletError> {
        let contract_address = contract_address.trim();
        if !validate_address(contract_address) {
            return Err(err_reject!(
                InvalidParams,
                "invalid_address",
                "Invalid Contract Address"
            ));
        }
        if contract_address != contract_address.to_lowercase()
            && !checksum_validate_address(contract_address)
        {
            return Err(err_reject!(
                InvalidParams,
                "invalid_address",
                "Invalid Contract Address Checksum"
            ));
        }
        let contract = parse_address(contract_address)?;
        let contract_address = format_address(&contract);
        let holder = match holder {
            Some(holder) => Some(parse_address(&holder_address(holder)?)?),
            None => None,
        };

        let known = {
            let mut conn = self.conn.lock().await;
            get_token(&mut conn, &contract_address)
                .await
                .map_err(err_from!())?
        };
        if let Some(token) = known {
            let balance = match holder {
                Some(holder) => Some(self.holder_balance(contract, holder).await?),
                None => None,
            };
            return Ok(Some(TokenDetails {
                symbol: token.symbol,
                name: token.name,
                contract_address,
                decimals: token.decimals,
                balance,
                icon: token.icon,
            }));
        }

        let Some((balance, token)) = self.resolve_token(contract, holder).await? else {
            return Ok(None);
        };
        {
            let mut conn = self.conn.lock().await;
            insert_token(&mut conn, &token).await.map_err(err_from!())?;
        }
        log::info!("Recorded custom token {} ({:?})", contract_address, token.symbol);
        Ok(Some(TokenDetails {
            symbol: token.symbol,
            name: token.name,
            contract_address,
            decimals: token.decimals,
            balance: holder.map(|_| u256_to_hex(balance)),
            icon: None,
        }))
    }

    /// Cached balance, or a live `balanceOf` when nothing is cached.
    async fn holder_balance(&self, contract: Address, holder: Address) -> Result<String, WalletError> {
        let cached = {
            let mut conn = self.conn.lock().await;
            get_token_balance(&mut conn, &format_address(&contract), &format_address(&holder))
                .await
                .map_err(err_from!())?
        };
        if let Some(row) = cached {
            return Ok(row.balance);
        }
        let result = self
            .rpc
            .eth_call(EthCall::new(contract, get_erc20_balance_of(holder)))
            .await?;
        Ok(u256_to_hex(
            decode_balance_of_result(&result)?.unwrap_or_default(),
        ))
    }

    async fn resolve_token(
        &self,
        contract: Address,
        holder: Option<Address>,
    ) -> Result<Option<(U256, TokenDao)>, WalletError> {
        let calls = vec![
            EthCall::new(
                contract,
                get_erc20_balance_of(holder.unwrap_or_else(Address::zero)),
            ),
            EthCall::new(contract, ERC20_NAME_SELECTOR.to_vec()),
            EthCall::new(contract, ERC20_SYMBOL_SELECTOR.to_vec()),
            EthCall::new(contract, ERC20_DECIMALS_SELECTOR.to_vec()),
        ];
        let mut results = self.rpc.eth_call_batch(calls).await?.into_iter();
        let mut next = || results.next().and_then(|result| result.ok());

        let balance = next().and_then(|bytes| decode_uint_result(&bytes).ok().flatten());
        let name = next().and_then(|bytes| decode_string_result(&bytes).ok().flatten());
        let symbol = next().and_then(|bytes| decode_string_result(&bytes).ok().flatten());
        let decimals = next()
            .and_then(|bytes| decode_uint_result(&bytes).ok().flatten())
            .and_then(decimals_from);

        let Some(balance) = balance else {
            log::debug!("Contract {:#x} does not answer balanceOf", contract);
            return Ok(None);
        };
        Ok(Some((
            balance,
            TokenDao {
                contract_address: format_address(&contract),
                symbol,
                name,
                decimals,
                icon: None,
                custom: true,
                ready: true,
            },
        )))
    }
}
