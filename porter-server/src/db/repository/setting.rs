//! Setting Repository
//!
//! Key/value rows holding JSON-encoded values.

use super::RepoResult;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;

pub async fn get<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> RepoResult<Option<T>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM setting WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    match value {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn put<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> RepoResult<()> {
    let raw = serde_json::to_string(value)?;
    sqlx::query(
        "INSERT INTO setting (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(raw)
    .execute(pool)
    .await?;
    Ok(())
}
