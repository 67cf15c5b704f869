//! Get-or-create for taxonomy terms

use crate::catalog::{CatalogError, CatalogStore};
use shared::util::term_name_from_slug;

/// Term id for `slug` in `taxonomy`, creating the term on first reference.
///
/// Returns 0 when no term could be resolved; callers skip the option.
pub async fn ensure_term(catalog: &dyn CatalogStore, taxonomy: &str, slug: &str) -> i64 {
    if slug.is_empty() {
        return 0;
    }

    match catalog.find_term_by_slug(taxonomy, slug).await {
        Ok(Some(term)) => return term.id,
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(taxonomy, slug, error = %e, "Term lookup failed");
            return 0;
        }
    }

    let name = term_name_from_slug(slug);
    match catalog.insert_term(taxonomy, &name, slug).await {
        Ok(term) => {
            tracing::debug!(taxonomy, slug, term_id = term.id, "Term created");
            term.id
        }
        // lost a race against a concurrent batch
        Err(CatalogError::TermExists { .. }) => catalog
            .find_term_by_slug(taxonomy, slug)
            .await
            .ok()
            .flatten()
            .map_or(0, |term| term.id),
        Err(e) => {
            tracing::warn!(taxonomy, slug, error = %e, "Term creation failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_ensure_term_reuses_existing() {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::new(db.pool, dir.path());

        let first = ensure_term(&catalog, "product_cat", "dark-blue").await;
        assert!(first > 0);
        assert_eq!(ensure_term(&catalog, "product_cat", "dark-blue").await, first);

        let term = catalog.find_term(first).await.unwrap().unwrap();
        assert_eq!(term.name, "Dark Blue");

        // same slug, different taxonomy
        assert_ne!(ensure_term(&catalog, "product_tag", "dark-blue").await, first);
    }

    #[tokio::test]
    async fn test_ensure_term_empty_slug() {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::new(db.pool, dir.path());
        assert_eq!(ensure_term(&catalog, "product_cat", "").await, 0);
    }
}
