//! Package image import with per-session dedup

use super::session::SessionState;
use crate::archive::IMAGES_DIR;
use crate::catalog::CatalogStore;
use shared::util::sanitize_file_name;

/// Attachment id for a package image, importing it at most once per session.
///
/// A cached mapping is reused while its attachment still exists. Missing
/// files and sideload failures yield 0 and the record continues without
/// the image.
pub async fn import_or_reuse(
    catalog: &dyn CatalogStore,
    file_name: &str,
    owner: Option<i64>,
    state: &mut SessionState,
) -> i64 {
    let file_name = sanitize_file_name(file_name);
    if file_name.is_empty() {
        return 0;
    }

    if let Some(&cached) = state.media_map.get(&file_name) {
        match catalog.find_attachment(cached).await {
            Ok(Some(_)) => return cached,
            Ok(None) => {
                tracing::debug!(file = %file_name, attachment_id = cached, "Cached attachment is gone, re-importing");
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Attachment lookup failed");
            }
        }
    }

    let source = state.dir.join(IMAGES_DIR).join(&file_name);
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::debug!(file = %file_name, "Image referenced but not in package");
        return 0;
    }

    let owner = owner.filter(|id| *id > 0);
    match catalog.sideload_attachment(&source, &file_name, owner).await {
        Ok(attachment) => {
            state.media_map.insert(file_name, attachment.id);
            attachment.id
        }
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "Image import failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::db::DbService;

    async fn setup() -> (SqliteCatalog, SessionState, tempfile::TempDir) {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(work.join(IMAGES_DIR)).unwrap();
        std::fs::write(work.join(IMAGES_DIR).join("shirt.jpg"), b"jpeg").unwrap();
        let catalog = SqliteCatalog::new(db.pool, dir.path().join("uploads"));
        (catalog, SessionState::new(work, 1, false, 5), dir)
    }

    #[tokio::test]
    async fn test_imports_once_per_session() {
        let (catalog, mut state, _dir) = setup().await;

        let first = import_or_reuse(&catalog, "shirt.jpg", None, &mut state).await;
        assert!(first > 0);
        assert_eq!(state.media_map["shirt.jpg"], first);

        let second = import_or_reuse(&catalog, "shirt.jpg", Some(9), &mut state).await;
        assert_eq!(second, first);

        let att = catalog.find_attachment(first).await.unwrap().unwrap();
        assert_eq!(att.mime_type, "image/jpeg");
        assert_eq!(att.parent_id, None);
    }

    #[tokio::test]
    async fn test_missing_and_unsafe_names() {
        let (catalog, mut state, _dir) = setup().await;
        assert_eq!(import_or_reuse(&catalog, "", None, &mut state).await, 0);
        assert_eq!(import_or_reuse(&catalog, "nope.png", None, &mut state).await, 0);
        // path components are stripped before lookup
        let id = import_or_reuse(&catalog, "../../images/shirt.jpg", None, &mut state).await;
        assert!(id > 0);
        assert!(state.media_map.contains_key("shirt.jpg"));
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_replaced() {
        let (catalog, mut state, _dir) = setup().await;
        state.media_map.insert("shirt.jpg".into(), 4242);
        let id = import_or_reuse(&catalog, "shirt.jpg", None, &mut state).await;
        assert!(id > 0);
        assert_ne!(id, 4242);
        assert_eq!(state.media_map["shirt.jpg"], id);
    }
}
