use crate::db::model::*;
use sqlx::SqliteConnection;

/// Rows per statement, keeps the bind count well below the SQLite limit.
const BULK_CHUNK_SIZE: usize = 250;

pub async fn get_token_balance(
    conn: &mut SqliteConnection,
    contract_address: &str,
    eth_address: &str,
) -> Result<Option<TokenBalanceDao>, sqlx::Error> {
    let row = sqlx::query_as::<_, TokenBalanceDao>(
        r"SELECT * FROM token_balances WHERE contract_address = $1 AND eth_address = $2",
    )
    .bind(contract_address)
    .bind(eth_address)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Balances to show to the user: manually added tokens plus automatically found non-zero ones.
pub async fn get_visible_token_balances(
    conn: &mut SqliteConnection,
    eth_address: &str,
) -> Result<Vec<TokenBalanceViewDao>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TokenBalanceViewDao>(
        r"SELECT b.contract_address,
COALESCE(b.symbol, t.symbol) AS symbol,
COALESCE(b.name, t.name) AS name,
COALESCE(b.decimals, t.decimals) AS decimals,
b.balance,
t.icon
FROM token_balances b
JOIN tokens t ON t.contract_address = b.contract_address
WHERE b.eth_address = $1 AND (b.visibility = 2 OR (b.visibility = 1 AND b.balance != '0x0'))
ORDER BY t.symbol
",
    )
    .bind(eth_address)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn insert_token_balance(
    conn: &mut SqliteConnection,
    token_balance: &TokenBalanceDao,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"INSERT INTO token_balances
(contract_address, eth_address, balance, name, symbol, decimals, visibility)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (contract_address, eth_address) DO UPDATE SET
balance = excluded.balance,
name = excluded.name,
symbol = excluded.symbol,
decimals = excluded.decimals,
visibility = excluded.visibility
",
    )
    .bind(&token_balance.contract_address)
    .bind(&token_balance.eth_address)
    .bind(&token_balance.balance)
    .bind(&token_balance.name)
    .bind(&token_balance.symbol)
    .bind(token_balance.decimals)
    .bind(token_balance.visibility)
    .execute(conn)
    .await?;
    Ok(())
}

/// Bulk upsert of `(contract_address, eth_address, balance)`.
/// Returns the number of rows inserted or whose balance actually changed.
pub async fn upsert_token_balances(
    conn: &mut SqliteConnection,
    balances: &[(String, String, String)],
) -> Result<u64, sqlx::Error> {
    let mut changed = 0;
    for chunk in balances.chunks(BULK_CHUNK_SIZE) {
        let values = (0..chunk.len())
            .map(|i| format!("(${}, ${}, ${})", i * 3 + 1, i * 3 + 2, i * 3 + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r"INSERT INTO token_balances (contract_address, eth_address, balance)
VALUES {}
ON CONFLICT (contract_address, eth_address) DO UPDATE SET balance = excluded.balance
WHERE token_balances.balance != excluded.balance
",
            values
        );
        let mut query = sqlx::query(&sql);
        for (contract_address, eth_address, balance) in chunk {
            query = query.bind(contract_address).bind(eth_address).bind(balance);
        }
        changed += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(changed)
}

/// Bulk delete of zero balances. Manually added tokens are kept.
pub async fn delete_token_balances(
    conn: &mut SqliteConnection,
    pairs: &[(String, String)],
) -> Result<u64, sqlx::Error> {
    let mut deleted = 0;
    for chunk in pairs.chunks(BULK_CHUNK_SIZE) {
        let values = (0..chunk.len())
            .map(|i| format!("(${}, ${})", i * 2 + 1, i * 2 + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r"DELETE FROM token_balances
WHERE visibility != 2 AND (contract_address, eth_address) IN (VALUES {})
",
            values
        );
        let mut query = sqlx::query(&sql);
        for (contract_address, eth_address) in chunk {
            query = query.bind(contract_address).bind(eth_address);
        }
        deleted += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}

/// Zeroes manually added rows whose on-chain balance dropped to zero.
/// Returns the number of rows whose balance changed.
pub async fn zero_manual_token_balances(
    conn: &mut SqliteConnection,
    pairs: &[(String, String)],
) -> Result<u64, sqlx::Error> {
    let mut zeroed = 0;
    for chunk in pairs.chunks(BULK_CHUNK_SIZE) {
        let values = (0..chunk.len())
            .map(|i| format!("(${}, ${})", i * 2 + 1, i * 2 + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r"UPDATE token_balances SET balance = '0x0'
WHERE visibility = 2 AND balance != '0x0' AND (contract_address, eth_address) IN (VALUES {})
",
            values
        );
        let mut query = sqlx::query(&sql);
        for (contract_address, eth_address) in chunk {
            query = query.bind(contract_address).bind(eth_address);
        }
        zeroed += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(zeroed)
}
