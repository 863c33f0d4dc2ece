use crate::db::model::TransactionDao;
use crate::db::ops::*;
use crate::db::DbHandle;
use crate::error::*;
use crate::eth::format_address;
use crate::rpc::ChainRpc;
use crate::utils::{hex_to_u256, u256_to_hex};
use crate::err_from;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use web3::types::{Address, U256};

/// Account view combining the node balance with transactions the node may not have seen yet.
#[derive(Debug, Clone)]
pub struct AccountBalances {
    pub network_balance: U256,
    /// Spendable: network balance minus every pending outgoing value and fee.
    pub confirmed: U256,
    /// Spendable plus incoming value of unconfirmed transactions.
    pub unconfirmed: U256,
    pub pending: Vec<TransactionDao>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub confirmed_balance: String,
    pub unconfirmed_balance: String,
}

/// Maximum amount a ledger row can take from its sender.
pub fn tx_max_cost(tx: &TransactionDao) -> Result<U256, WalletError> {
    let value = hex_to_u256(&tx.value).map_err(err_from!())?;
    let gas = hex_to_u256(&tx.gas).map_err(err_from!())?;
    let gas_price = hex_to_u256(&tx.gas_price).map_err(err_from!())?;
    Ok(value.saturating_add(gas.saturating_mul(gas_price)))
}

/// Applies the pending ledger state of `address` to a known network balance.
pub async fn apply_pending_transactions(
    conn: &mut SqliteConnection,
    address: Address,
    network_balance: U256,
) -> Result<AccountBalances, WalletError> {
    let address = format_address(&address);
    let outgoing = get_pending_outgoing_txs(conn, &address)
        .await
        .map_err(err_from!())?;
    let incoming = get_pending_incoming_txs(conn, &address)
        .await
        .map_err(err_from!())?;

    let mut debit = U256::zero();
    for tx in &outgoing {
        debit = debit.saturating_add(tx_max_cost(tx)?);
    }
    let mut credit = U256::zero();
    for tx in &incoming {
        credit = credit.saturating_add(hex_to_u256(&tx.value).map_err(err_from!())?);
    }

    let confirmed = network_balance.saturating_sub(debit);
    let mut pending = outgoing;
    pending.extend(incoming);
    Ok(AccountBalances {
        network_balance,
        confirmed,
        unconfirmed: confirmed.saturating_add(credit),
        pending,
    })
}

/// Next nonce, counting transactions queued in the ledger but not yet seen by the node.
pub async fn next_nonce(
    conn: &mut SqliteConnection,
    address: Address,
    network_nonce: U256,
) -> Result<U256, WalletError> {
    let highest = get_highest_pending_nonce(conn, &format_address(&address))
        .await
        .map_err(err_from!())?;
    Ok(match highest {
        Some(highest) => std::cmp::max(network_nonce, U256::from(highest) + 1),
        None => network_nonce,
    })
}

#[derive(Clone)]
pub struct BalanceAggregator {
    conn: DbHandle,
    rpc: Arc<dyn ChainRpc>,
}

impl BalanceAggregator {
    pub fn new(conn: DbHandle, rpc: Arc<dyn ChainRpc>) -> Self {
        Self { conn, rpc }
    }

    pub async fn get_balances(&self, address: Address) -> Result<AccountBalances, WalletError> {
        let network_balance = self.rpc.balance(address).await?;
        let mut conn = self.conn.lock().await;
        apply_pending_transactions(&mut conn, address, network_balance).await
    }

    pub async fn get_balance(&self, address: Address) -> Result<BalanceView, WalletError> {
        let balances = self.get_balances(address).await?;
        Ok(BalanceView {
            confirmed_balance: u256_to_hex(balances.confirmed),
            unconfirmed_balance: u256_to_hex(balances.unconfirmed),
        })
    }

    pub async fn get_transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        let network_nonce = self.rpc.transaction_count(address).await?;
        let mut conn = self.conn.lock().await;
        next_nonce(&mut conn, address, network_nonce).await
    }
}
