//! Term Repository
//!
//! Taxonomy registry, attribute taxonomies, terms and object-term
//! relationships.

use super::{RepoError, RepoResult};
use shared::models::{ATTRIBUTE_TAXONOMY_PREFIX, AttributeTaxonomy, Term};
use sqlx::{SqliteConnection, SqlitePool};

// ---------------------------------------------------------------------------
// Taxonomy registry
// ---------------------------------------------------------------------------

pub async fn taxonomy_registered(pool: &SqlitePool, name: &str) -> RepoResult<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM taxonomy WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Register a custom taxonomy; registering twice is a no-op
pub async fn register_taxonomy(pool: &SqlitePool, name: &str, label: &str) -> RepoResult<()> {
    if name.is_empty() {
        return Err(RepoError::Validation("Taxonomy name is required".into()));
    }
    sqlx::query("INSERT OR IGNORE INTO taxonomy (name, label, builtin) VALUES (?, ?, 0)")
        .bind(name)
        .bind(label)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Attribute taxonomies
// ---------------------------------------------------------------------------

pub async fn find_attribute_taxonomy(
    pool: &SqlitePool,
    name: &str,
) -> RepoResult<Option<AttributeTaxonomy>> {
    let attr = sqlx::query_as::<_, AttributeTaxonomy>(
        "SELECT id, name, label FROM attribute_taxonomy WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(attr)
}

pub async fn create_attribute_taxonomy(
    pool: &SqlitePool,
    name: &str,
    label: &str,
) -> RepoResult<AttributeTaxonomy> {
    if !name.starts_with(ATTRIBUTE_TAXONOMY_PREFIX) || name.len() == ATTRIBUTE_TAXONOMY_PREFIX.len()
    {
        return Err(RepoError::Validation(format!(
            "Invalid attribute taxonomy name: {name}"
        )));
    }
    sqlx::query("INSERT OR IGNORE INTO attribute_taxonomy (name, label) VALUES (?, ?)")
        .bind(name)
        .bind(label)
        .execute(pool)
        .await?;
    find_attribute_taxonomy(pool, name)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create attribute taxonomy".into()))
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Term>> {
    let term =
        sqlx::query_as::<_, Term>("SELECT id, taxonomy, name, slug FROM term WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(term)
}

pub async fn find_by_slug(pool: &SqlitePool, taxonomy: &str, slug: &str) -> RepoResult<Option<Term>> {
    let term = sqlx::query_as::<_, Term>(
        "SELECT id, taxonomy, name, slug FROM term WHERE taxonomy = ? AND slug = ?",
    )
    .bind(taxonomy)
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(term)
}

/// Insert a term. A slug already present in the taxonomy fails with
/// [`RepoError::Duplicate`].
pub async fn insert(pool: &SqlitePool, taxonomy: &str, name: &str, slug: &str) -> RepoResult<Term> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO term (taxonomy, name, slug) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(taxonomy)
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;
    Ok(Term {
        id,
        taxonomy: taxonomy.to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Object terms
// ---------------------------------------------------------------------------

/// Term ids assigned to an object in one taxonomy, in assignment order
pub async fn object_term_ids(
    pool: &SqlitePool,
    object_id: i64,
    taxonomy: &str,
) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT term_id FROM product_term WHERE object_id = ? AND taxonomy = ? ORDER BY term_order",
    )
    .bind(object_id)
    .bind(taxonomy)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

pub async fn object_terms(pool: &SqlitePool, object_id: i64, taxonomy: &str) -> RepoResult<Vec<Term>> {
    let terms = sqlx::query_as::<_, Term>(
        "SELECT t.id, t.taxonomy, t.name, t.slug FROM product_term pt \
         JOIN term t ON t.id = pt.term_id \
         WHERE pt.object_id = ? AND pt.taxonomy = ? ORDER BY pt.term_order",
    )
    .bind(object_id)
    .bind(taxonomy)
    .fetch_all(pool)
    .await?;
    Ok(terms)
}

/// Replace an object's terms in one taxonomy inside an open transaction
pub(super) async fn replace_object_terms(
    conn: &mut SqliteConnection,
    object_id: i64,
    taxonomy: &str,
    term_ids: &[i64],
) -> RepoResult<()> {
    sqlx::query("DELETE FROM product_term WHERE object_id = ? AND taxonomy = ?")
        .bind(object_id)
        .bind(taxonomy)
        .execute(&mut *conn)
        .await?;
    for (order, term_id) in term_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO product_term (object_id, term_id, taxonomy, term_order) VALUES (?, ?, ?, ?)",
        )
        .bind(object_id)
        .bind(term_id)
        .bind(taxonomy)
        .bind(order as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Replace an object's terms in one taxonomy
pub async fn set_object_terms(
    pool: &SqlitePool,
    object_id: i64,
    taxonomy: &str,
    term_ids: &[i64],
) -> RepoResult<()> {
    let mut tx = pool.begin().await?;
    replace_object_terms(&mut tx, object_id, taxonomy, term_ids).await?;
    tx.commit().await?;
    Ok(())
}
