//! Porter settings
//!
//! Two lists stored as JSON rows in the `setting` table. Custom taxonomies
//! are registered with the catalog whenever they are loaded at startup or
//! saved, so export and import can use them right away.

use crate::catalog::CatalogStore;
use crate::db::repository::{RepoResult, setting};
use shared::error::AppResult;
use shared::models::{PorterSettings, PorterSettingsUpdate};
use sqlx::SqlitePool;
use std::sync::Arc;

pub const KEY_CUSTOM_META_KEYS: &str = "custom_meta_keys";
pub const KEY_CUSTOM_TAXONOMIES: &str = "custom_taxonomies";

#[derive(Clone)]
pub struct SettingsService {
    pool: SqlitePool,
    catalog: Arc<dyn CatalogStore>,
}

impl SettingsService {
    pub fn new(pool: SqlitePool, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { pool, catalog }
    }

    /// Current settings; absent rows read as empty lists
    pub async fn load(&self) -> RepoResult<PorterSettings> {
        Ok(PorterSettings {
            custom_meta_keys: setting::get(&self.pool, KEY_CUSTOM_META_KEYS)
                .await?
                .unwrap_or_default(),
            custom_taxonomies: setting::get(&self.pool, KEY_CUSTOM_TAXONOMIES)
                .await?
                .unwrap_or_default(),
        })
    }

    /// Sanitize and persist an update, returning what was stored
    pub async fn save(&self, update: &PorterSettingsUpdate) -> AppResult<PorterSettings> {
        let settings = PorterSettings::from_update(update);
        setting::put(&self.pool, KEY_CUSTOM_META_KEYS, &settings.custom_meta_keys).await?;
        setting::put(&self.pool, KEY_CUSTOM_TAXONOMIES, &settings.custom_taxonomies).await?;
        self.register_taxonomies(&settings).await?;

        crate::audit_log!(
            "settings.update",
            "settings",
            format!(
                "meta_keys={} taxonomies={}",
                settings.custom_meta_keys.len(),
                settings.custom_taxonomies.len()
            )
        );
        Ok(settings)
    }

    /// Make every configured custom taxonomy known to the catalog
    pub async fn register_taxonomies(&self, settings: &PorterSettings) -> AppResult<()> {
        for taxonomy in &settings.custom_taxonomies {
            self.catalog.register_taxonomy(taxonomy).await?;
        }
        Ok(())
    }
}
