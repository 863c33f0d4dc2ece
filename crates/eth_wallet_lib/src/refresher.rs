use crate::cache::SharedCache;
use crate::contracts::{decode_balance_of_result, get_erc20_balance_of};
use crate::db::ops::*;
use crate::db::DbHandle;
use crate::dispatcher::Dispatcher;
use crate::error::*;
use crate::eth::{format_address, parse_address, validate_address};
use crate::rpc::{ChainRpc, EthCall};
use crate::setup::WalletSetup;
use crate::utils::u256_to_hex;
use crate::{err_custom_create, err_from, err_reject};
use serde_json::json;
use sqlx::Connection;
use std::sync::Arc;
use std::time::Instant;
use web3::types::Address;

/// Contract address meaning "every known token".
pub const WILDCARD: &str = "*";

const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub fn bulk_update_key(address: &str) -> String {
    format!("bulk_token_update:{}", address)
}

/// What a refresh pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// False when the pass was skipped by the wildcard cooldown.
    pub executed: bool,
    /// Pairs with a positive balance, written in one upsert.
    pub upserts: usize,
    /// Pairs with a zero balance, removed (or zeroed when added manually).
    pub deletes: usize,
    /// Rows actually inserted, changed or removed.
    pub rows_changed: u64,
}

/// Keeps the `token_balances` cache in line with the chain.
#[derive(Clone)]
pub struct TokenBalanceRefresher {
    setup: WalletSetup,
    conn: DbHandle,
    rpc: Arc<dyn ChainRpc>,
    cache: Arc<dyn SharedCache>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl TokenBalanceRefresher {
    pub fn new(
        setup: WalletSetup,
        conn: DbHandle,
        rpc: Arc<dyn ChainRpc>,
        cache: Arc<dyn SharedCache>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            setup,
            conn,
            rpc,
            cache,
            dispatcher,
        }
    }

    /// Refreshes `balanceOf` of `contract_address` (or every known token for `*`) for
    /// the given holders.
    pub async fn update_token_cache(
        &self,
        contract_address: &str,
        addresses: &[String],
    ) -> Result<RefreshSummary, WalletError> {
        if addresses.is_empty() {
            return Ok(RefreshSummary::default());
        }
        let is_wildcard = contract_address == WILDCARD;
        if is_wildcard && addresses.len() > 1 {
            return Err(err_reject!(
                InvalidParams,
                "bad_arguments",
                "Wildcard update of token caches unsupported for multiple addresses"
            ));
        }
        let holders = addresses
            .iter()
            .map(|address| {
                let address = address.trim();
                if !validate_address(address) {
                    return Err(err_reject!(InvalidParams, "invalid_address", "Invalid Address"));
                }
                parse_address(address)
            })
            .collect::<Result<Vec<Address>, WalletError>>()?;

        let tokens = if is_wildcard {
            let mut conn = self.conn.lock().await;
            let mut tokens = vec![];
            for token in get_all_token_addresses(&mut conn)
                .await
                .map_err(err_from!())?
            {
                match parse_address(&token) {
                    Ok(token) => tokens.push(token),
                    Err(err) => log::warn!("Skipping token with invalid address {}: {}", token, err),
                }
            }
            tokens
        } else {
            if !validate_address(contract_address) {
                return Err(err_reject!(
                    InvalidParams,
                    "invalid_token_address",
                    "Invalid Token Address"
                ));
            }
            vec![parse_address(contract_address)?]
        };

        let start = Instant::now();
        let holder = format_address(&holders[0]);
        if is_wildcard {
            log::info!("START update_token_cache(\"*\", {})", holder);
            // the key expires on its own, repeated refresh triggers inside the window are dropped
            if !self
                .cache
                .acquire(&bulk_update_key(&holder), self.setup.bulk_refresh_cooldown)
                .await
            {
                log::info!("ABORT update_token_cache(\"*\", {}): cooling down", holder);
                return Ok(RefreshSummary::default());
            }
        }

        let mut summary = self.refresh_pairs(&tokens, &holders).await?;
        summary.executed = true;

        if is_wildcard {
            if summary.rows_changed > 0 {
                self.notify_token_change(&holder);
            }
            log::info!(
                "DONE update_token_cache(\"*\", {}) in {:.2}s",
                holder,
                start.elapsed().as_secs_f64()
            );
        }
        Ok(summary)
    }

    async fn refresh_pairs(
        &self,
        tokens: &[Address],
        holders: &[Address],
    ) -> Result<RefreshSummary, WalletError> {
        let mut pairs = Vec::with_capacity(tokens.len() * holders.len());
        let mut calls = Vec::with_capacity(pairs.capacity());
        for holder in holders {
            for token in tokens {
                pairs.push((format_address(token), format_address(holder)));
                calls.push(EthCall::new(*token, get_erc20_balance_of(*holder)));
            }
        }
        if calls.is_empty() {
            return Ok(RefreshSummary::default());
        }

        let results = self.rpc.eth_call_batch(calls).await?;
        if results.len() != pairs.len() {
            return Err(err_custom_create!(
                "Batch returned {} results for {} calls",
                results.len(),
                pairs.len()
            ));
        }

        let mut bulk_upsert = vec![];
        let mut bulk_delete = vec![];
        for ((contract_address, eth_address), result) in pairs.into_iter().zip(results) {
            let balance = match result.and_then(|bytes| decode_balance_of_result(&bytes)) {
                Ok(Some(balance)) => balance,
                Ok(None) => {
                    log::warn!("calling balanceOf for contract {} failed", contract_address);
                    Default::default()
                }
                Err(err) => {
                    log::error!(
                        "Failed to update token cache of {} for address {}: {}",
                        contract_address,
                        eth_address,
                        err
                    );
                    continue;
                }
            };
            if balance.is_zero() {
                bulk_delete.push((contract_address, eth_address));
            } else {
                bulk_upsert.push((contract_address, eth_address, u256_to_hex(balance)));
            }
        }

        let mut summary = RefreshSummary {
            upserts: bulk_upsert.len(),
            deletes: bulk_delete.len(),
            ..Default::default()
        };
        if bulk_upsert.is_empty() && bulk_delete.is_empty() {
            return Ok(summary);
        }
        let mut conn = self.conn.lock().await;
        let mut db_transaction = conn.begin().await.map_err(err_from!())?;
        if !bulk_upsert.is_empty() {
            summary.rows_changed += upsert_token_balances(&mut db_transaction, &bulk_upsert)
                .await
                .map_err(err_from!())?;
        }
        if !bulk_delete.is_empty() {
            summary.rows_changed += delete_token_balances(&mut db_transaction, &bulk_delete)
                .await
                .map_err(err_from!())?;
            summary.rows_changed += zero_manual_token_balances(&mut db_transaction, &bulk_delete)
                .await
                .map_err(err_from!())?;
        }
        db_transaction.commit().await.map_err(err_from!())?;
        Ok(summary)
    }

    /// Clients refresh their token list when they see a token payment, so a synthetic one is sent.
    fn notify_token_change(&self, holder: &str) {
        let data = json!({
            "txHash": ZERO_HASH,
            "fromAddress": ZERO_ADDRESS,
            "toAddress": holder,
            "status": "confirmed",
            "value": "0x0",
            "contractAddress": ZERO_ADDRESS,
        });
        self.dispatcher
            .notify(holder, format!("SOFA::TokenPayment: {}", data));
    }
}
