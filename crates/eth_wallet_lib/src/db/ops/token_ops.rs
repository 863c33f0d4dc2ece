use crate::db::model::*;
use sqlx::SqliteConnection;

pub async fn get_token(
    conn: &mut SqliteConnection,
    contract_address: &str,
) -> Result<Option<TokenDao>, sqlx::Error> {
    let row = sqlx::query_as::<_, TokenDao>(r"SELECT * FROM tokens WHERE contract_address = $1")
        .bind(contract_address)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn get_all_token_addresses(
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query_scalar::<_, String>(
        r"SELECT contract_address FROM tokens ORDER BY contract_address",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Keeps the existing row if the token is already known.
pub async fn insert_token(
    conn: &mut SqliteConnection,
    token: &TokenDao,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"INSERT INTO tokens (contract_address, symbol, name, decimals, icon, custom, ready)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (contract_address) DO NOTHING
",
    )
    .bind(&token.contract_address)
    .bind(&token.symbol)
    .bind(&token.name)
    .bind(token.decimals)
    .bind(&token.icon)
    .bind(token.custom)
    .bind(token.ready)
    .execute(conn)
    .await?;
    Ok(())
}
