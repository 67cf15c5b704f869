//! Attachment Repository

use super::{RepoError, RepoResult};
use shared::models::Attachment;
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Attachment>> {
    let attachment = sqlx::query_as::<_, Attachment>(
        "SELECT id, parent_id, title, file_name, mime_type, created_at FROM attachment WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(attachment)
}

pub async fn file_name_taken(pool: &SqlitePool, file_name: &str) -> RepoResult<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM attachment WHERE file_name = ?")
        .bind(file_name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn insert(
    pool: &SqlitePool,
    parent_id: Option<i64>,
    title: &str,
    file_name: &str,
    mime_type: &str,
) -> RepoResult<Attachment> {
    let created_at = shared::util::now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO attachment (parent_id, title, file_name, mime_type, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(parent_id)
    .bind(title)
    .bind(file_name)
    .bind(mime_type)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(Attachment {
        id,
        parent_id,
        title: title.to_string(),
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        created_at,
    })
}

pub async fn set_parent(pool: &SqlitePool, id: i64, parent_id: i64) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE attachment SET parent_id = ? WHERE id = ?")
        .bind(parent_id)
        .bind(id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Attachment {id} not found")));
    }
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    sqlx::query("DELETE FROM attachment WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
