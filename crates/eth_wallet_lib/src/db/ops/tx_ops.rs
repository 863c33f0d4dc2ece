use crate::db::model::*;
use sqlx::SqliteConnection;

pub const TRANSACTION_FILTER_ACTIVE: &str = "status != 'error'";
pub const TRANSACTION_FILTER_PENDING: &str =
    "(status = 'new' OR status = 'queued' OR status = 'unconfirmed')";

pub async fn insert_tx(
    conn: &mut SqliteConnection,
    tx: &TransactionDao,
) -> Result<TransactionDao, sqlx::Error> {
    let res = sqlx::query_as::<_, TransactionDao>(
        r"INSERT INTO transactions
(hash, from_address, to_address, nonce, value, gas, gas_price, data, v, r, s, sender_id, status, created, updated, blocknumber)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *;
",
    )
    .bind(&tx.hash)
    .bind(&tx.from_address)
    .bind(&tx.to_address)
    .bind(tx.nonce)
    .bind(&tx.value)
    .bind(&tx.gas)
    .bind(&tx.gas_price)
    .bind(&tx.data)
    .bind(&tx.v)
    .bind(&tx.r)
    .bind(&tx.s)
    .bind(&tx.sender_id)
    .bind(&tx.status)
    .bind(tx.created)
    .bind(tx.updated)
    .bind(tx.blocknumber)
    .fetch_one(conn)
    .await?;
    Ok(res)
}

/// Row currently occupying `(from_address, nonce)`, newest first.
pub async fn get_active_tx_by_nonce(
    conn: &mut SqliteConnection,
    from_address: &str,
    nonce: i64,
) -> Result<Option<TransactionDao>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionDao>(
        format!(
            r"SELECT * FROM transactions
WHERE from_address = $1 AND nonce = $2 AND {}
ORDER BY transaction_id DESC LIMIT 1",
            TRANSACTION_FILTER_ACTIVE
        )
        .as_str(),
    )
    .bind(from_address)
    .bind(nonce)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn get_active_tx_by_hash(
    conn: &mut SqliteConnection,
    hash: &str,
) -> Result<Option<TransactionDao>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionDao>(
        format!(
            r"SELECT * FROM transactions
WHERE hash = $1 AND {}
ORDER BY transaction_id DESC LIMIT 1",
            TRANSACTION_FILTER_ACTIVE
        )
        .as_str(),
    )
    .bind(hash)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn get_highest_pending_nonce(
    conn: &mut SqliteConnection,
    from_address: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let nonce = sqlx::query_scalar::<_, Option<i64>>(
        format!(
            r"SELECT MAX(nonce) FROM transactions WHERE from_address = $1 AND {}",
            TRANSACTION_FILTER_PENDING
        )
        .as_str(),
    )
    .bind(from_address)
    .fetch_one(conn)
    .await?;
    Ok(nonce)
}

pub async fn get_pending_outgoing_txs(
    conn: &mut SqliteConnection,
    from_address: &str,
) -> Result<Vec<TransactionDao>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionDao>(
        format!(
            r"SELECT * FROM transactions WHERE from_address = $1 AND {} ORDER BY nonce ASC",
            TRANSACTION_FILTER_PENDING
        )
        .as_str(),
    )
    .bind(from_address)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn get_pending_incoming_txs(
    conn: &mut SqliteConnection,
    to_address: &str,
) -> Result<Vec<TransactionDao>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionDao>(
        r"SELECT * FROM transactions WHERE to_address = $1 AND status = 'unconfirmed'",
    )
    .bind(to_address)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn set_tx_status(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    status: TransactionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(r"UPDATE transactions SET status = $2, updated = $3 WHERE transaction_id = $1")
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(chrono::Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

/// Moves a queued transaction to error. Returns false when the row already left the queue.
pub async fn cancel_queued_tx(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r"UPDATE transactions SET status = 'error', updated = $2
WHERE transaction_id = $1 AND (status = 'new' OR status = 'queued')",
    )
    .bind(transaction_id)
    .bind(chrono::Utc::now())
    .execute(conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn insert_token_tx(
    conn: &mut SqliteConnection,
    token_tx: &TokenTransactionDao,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"INSERT INTO token_transactions
(transaction_id, transaction_log_index, contract_address, from_address, to_address, value)
VALUES ($1, $2, $3, $4, $5, $6)
",
    )
    .bind(token_tx.transaction_id)
    .bind(token_tx.transaction_log_index)
    .bind(&token_tx.contract_address)
    .bind(&token_tx.from_address)
    .bind(&token_tx.to_address)
    .bind(&token_tx.value)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_token_txs_by_tx(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Vec<TokenTransactionDao>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TokenTransactionDao>(
        r"SELECT * FROM token_transactions WHERE transaction_id = $1 ORDER BY transaction_log_index",
    )
    .bind(transaction_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
