use crate::db::model::*;
use sqlx::SqliteConnection;

/// Updates `last_queried`, returns false when the address was never registered.
pub async fn touch_token_registration(
    conn: &mut SqliteConnection,
    eth_address: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r"UPDATE token_registrations SET last_queried = $2 WHERE eth_address = $1")
        .bind(eth_address)
        .bind(chrono::Utc::now())
        .execute(conn)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn insert_token_registration(
    conn: &mut SqliteConnection,
    eth_address: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"INSERT INTO token_registrations (eth_address, last_queried) VALUES ($1, $2)
ON CONFLICT (eth_address) DO NOTHING",
    )
    .bind(eth_address)
    .bind(chrono::Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_token_registration(
    conn: &mut SqliteConnection,
    eth_address: &str,
) -> Result<Option<TokenRegistrationDao>, sqlx::Error> {
    let row = sqlx::query_as::<_, TokenRegistrationDao>(
        r"SELECT * FROM token_registrations WHERE eth_address = $1",
    )
    .bind(eth_address)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
