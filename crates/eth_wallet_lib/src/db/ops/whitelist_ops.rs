use sqlx::SqliteConnection;

/// Whether a caller supplied gas price may be used for a transfer between these addresses.
pub async fn is_gas_price_whitelisted(
    conn: &mut SqliteConnection,
    from_address: &str,
    to_address: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let from_count = sqlx::query_scalar::<_, i64>(
        r"SELECT COUNT(*) FROM from_address_gas_price_whitelist WHERE address = $1",
    )
    .bind(from_address)
    .fetch_one(&mut *conn)
    .await?;
    if from_count > 0 {
        return Ok(true);
    }
    if let Some(to_address) = to_address {
        let to_count = sqlx::query_scalar::<_, i64>(
            r"SELECT COUNT(*) FROM to_address_gas_price_whitelist WHERE address = $1",
        )
        .bind(to_address)
        .fetch_one(conn)
        .await?;
        return Ok(to_count > 0);
    }
    Ok(false)
}

pub async fn add_gas_price_whitelist(
    conn: &mut SqliteConnection,
    from_address: Option<&str>,
    to_address: Option<&str>,
) -> Result<(), sqlx::Error> {
    if let Some(from_address) = from_address {
        sqlx::query(
            r"INSERT INTO from_address_gas_price_whitelist (address) VALUES ($1) ON CONFLICT DO NOTHING",
        )
        .bind(from_address)
        .execute(&mut *conn)
        .await?;
    }
    if let Some(to_address) = to_address {
        sqlx::query(
            r"INSERT INTO to_address_gas_price_whitelist (address) VALUES ($1) ON CONFLICT DO NOTHING",
        )
        .bind(to_address)
        .execute(conn)
        .await?;
    }
    Ok(())
}
