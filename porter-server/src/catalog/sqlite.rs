//! SQLite-backed catalog with an on-disk media store

use super::{CatalogError, CatalogResult, CatalogStore};
use crate::db::repository::{RepoError, attachment, product, term};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::models::{
    ATTRIBUTE_TAXONOMY_PREFIX, Attachment, AttributeTaxonomy, Product, ProductType, StockStatus,
    TAXONOMY_CATEGORY, TAXONOMY_SHIPPING_CLASS, TAXONOMY_TAG, Term,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

const BUILTIN_TAXONOMIES: &[&str] = &[TAXONOMY_CATEGORY, TAXONOMY_TAG, TAXONOMY_SHIPPING_CLASS];

/// Catalog over the SQLite pool; media files live in `media_dir`
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
    media_dir: PathBuf,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            media_dir: media_dir.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// First free `name.ext`, `name-1.ext`, `name-2.ext`, ... in the media store
    async fn unique_media_name(&self, file_name: &str) -> CatalogResult<String> {
        let (stem, ext) = split_extension(file_name);
        let mut candidate = file_name.to_string();
        let mut n = 1;
        loop {
            let on_disk = tokio::fs::try_exists(self.media_dir.join(&candidate))
                .await
                .unwrap_or(false);
            if !on_disk && !attachment::file_name_taken(&self.pool, &candidate).await? {
                return Ok(candidate);
            }
            candidate = match ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            n += 1;
        }
    }
}

/// Split `photo.final.jpg` into (`photo.final`, Some(`jpg`))
pub(crate) fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_product(&self, id: i64) -> CatalogResult<Option<Product>> {
        Ok(product::find_by_id(&self.pool, id).await?)
    }

    async fn find_product_id_by_sku(&self, sku: &str) -> CatalogResult<Option<i64>> {
        Ok(product::find_id_by_sku(&self.pool, sku).await?)
    }

    async fn save_product(&self, p: &mut Product) -> CatalogResult<i64> {
        if let Some(owner) = product::find_id_by_sku(&self.pool, &p.sku).await?
            && owner != p.id
        {
            return Err(CatalogError::DuplicateSku(p.sku.clone()));
        }
        let id = match product::save(&self.pool, p).await {
            Ok(id) => id,
            Err(RepoError::Duplicate(_)) => return Err(CatalogError::DuplicateSku(p.sku.clone())),
            Err(RepoError::NotFound(_)) => return Err(CatalogError::ProductNotFound(p.id)),
            Err(e) => return Err(e.into()),
        };
        p.id = id;
        Ok(id)
    }

    async fn children(&self, parent_id: i64) -> CatalogResult<Vec<Product>> {
        let mut children = Vec::new();
        for id in product::child_ids(&self.pool, parent_id).await? {
            if let Some(child) = product::find_by_id(&self.pool, id).await? {
                children.push(child);
            }
        }
        Ok(children)
    }

    async fn set_object_terms(
        &self,
        object_id: i64,
        taxonomy: &str,
        term_ids: &[i64],
    ) -> CatalogResult<()> {
        if !self.taxonomy_exists(taxonomy).await? {
            return Err(CatalogError::TaxonomyNotRegistered(taxonomy.to_string()));
        }
        Ok(term::set_object_terms(&self.pool, object_id, taxonomy, term_ids).await?)
    }

    async fn object_terms(&self, object_id: i64, taxonomy: &str) -> CatalogResult<Vec<Term>> {
        Ok(term::object_terms(&self.pool, object_id, taxonomy).await?)
    }

    async fn taxonomy_exists(&self, taxonomy: &str) -> CatalogResult<bool> {
        if BUILTIN_TAXONOMIES.contains(&taxonomy) {
            return Ok(true);
        }
        if taxonomy.starts_with(ATTRIBUTE_TAXONOMY_PREFIX) {
            return Ok(term::find_attribute_taxonomy(&self.pool, taxonomy)
                .await?
                .is_some());
        }
        Ok(term::taxonomy_registered(&self.pool, taxonomy).await?)
    }

    async fn register_taxonomy(&self, taxonomy: &str) -> CatalogResult<()> {
        Ok(term::register_taxonomy(&self.pool, taxonomy, taxonomy).await?)
    }

    async fn find_term(&self, id: i64) -> CatalogResult<Option<Term>> {
        Ok(term::find_by_id(&self.pool, id).await?)
    }

    async fn find_term_by_slug(&self, taxonomy: &str, slug: &str) -> CatalogResult<Option<Term>> {
        Ok(term::find_by_slug(&self.pool, taxonomy, slug).await?)
    }

    async fn insert_term(&self, taxonomy: &str, name: &str, slug: &str) -> CatalogResult<Term> {
        if slug.is_empty() {
            return Err(RepoError::Validation("Term slug is required".into()).into());
        }
        match term::insert(&self.pool, taxonomy, name, slug).await {
            Ok(term) => Ok(term),
            Err(RepoError::Duplicate(_)) => Err(CatalogError::TermExists {
                taxonomy: taxonomy.to_string(),
                slug: slug.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_attribute_taxonomy(&self, name: &str) -> CatalogResult<Option<AttributeTaxonomy>> {
        Ok(term::find_attribute_taxonomy(&self.pool, name).await?)
    }

    async fn ensure_attribute_taxonomy(&self, name: &str, label: &str) -> CatalogResult<i64> {
        if let Some(existing) = term::find_attribute_taxonomy(&self.pool, name).await? {
            return Ok(existing.id);
        }
        let created = term::create_attribute_taxonomy(&self.pool, name, label).await?;
        tracing::debug!(taxonomy = %name, id = created.id, "Attribute taxonomy created");
        Ok(created.id)
    }

    async fn find_attachment(&self, id: i64) -> CatalogResult<Option<Attachment>> {
        Ok(attachment::find_by_id(&self.pool, id).await?)
    }

    async fn sideload_attachment(
        &self,
        source: &Path,
        file_name: &str,
        parent_id: Option<i64>,
    ) -> CatalogResult<Attachment> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| CatalogError::MediaStore(format!("Cannot create media dir: {e}")))?;

        let stored_name = self.unique_media_name(file_name).await?;
        let target = self.media_dir.join(&stored_name);
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| CatalogError::MediaStore(format!("Cannot copy {file_name}: {e}")))?;

        let mime = mime_guess::from_path(&stored_name).first_or_octet_stream();
        let title = split_extension(file_name).0;
        match attachment::insert(&self.pool, parent_id, title, &stored_name, mime.essence_str()).await
        {
            Ok(att) => Ok(att),
            Err(e) => {
                // keep the media dir consistent with the table
                let _ = tokio::fs::remove_file(&target).await;
                Err(e.into())
            }
        }
    }

    async fn set_attachment_parent(&self, id: i64, parent_id: i64) -> CatalogResult<()> {
        match attachment::set_parent(&self.pool, id, parent_id).await {
            Ok(()) => Ok(()),
            Err(RepoError::NotFound(_)) => Err(CatalogError::AttachmentNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn attachment_path(&self, id: i64) -> CatalogResult<Option<PathBuf>> {
        Ok(attachment::find_by_id(&self.pool, id)
            .await?
            .map(|att| self.media_dir.join(att.file_name)))
    }

    async fn refresh_derived_data(&self, product_id: i64) -> CatalogResult<()> {
        let Some(p) = product::find_by_id(&self.pool, product_id).await? else {
            return Err(CatalogError::ProductNotFound(product_id));
        };
        let now = Utc::now();

        let (prices, onsale, stock_quantity) = if p.product_type == ProductType::Variable {
            let children = self.children(product_id).await?;
            let prices: Vec<Decimal> = children.iter().filter_map(|c| c.active_price(now)).collect();
            let onsale = children.iter().any(|c| c.is_on_sale(now));
            let quantities: Vec<i64> = children
                .iter()
                .filter(|c| c.manage_stock)
                .filter_map(|c| c.stock_quantity)
                .collect();
            let total = (!quantities.is_empty()).then(|| quantities.iter().sum());
            (prices, onsale, total.or(p.stock_quantity))
        } else {
            (p.active_price(now).into_iter().collect(), p.is_on_sale(now), p.stock_quantity)
        };

        let row = product::LookupRow {
            product_id,
            sku: p.sku.clone(),
            min_price: prices.iter().min().map(Decimal::to_string),
            max_price: prices.iter().max().map(Decimal::to_string),
            onsale,
            stock_quantity,
            stock_status: p.stock_status.as_str().to_string(),
        };
        product::upsert_lookup(&self.pool, &row).await?;
        Ok(())
    }

    async fn sync_variable_product(&self, parent_id: i64) -> CatalogResult<()> {
        let Some(mut parent) = product::find_by_id(&self.pool, parent_id).await? else {
            return Err(CatalogError::ProductNotFound(parent_id));
        };
        let children = self.children(parent_id).await?;

        let status = if children.iter().any(|c| c.stock_status == StockStatus::InStock) {
            StockStatus::InStock
        } else if children.iter().any(|c| c.stock_status == StockStatus::OnBackorder) {
            StockStatus::OnBackorder
        } else {
            StockStatus::OutOfStock
        };

        if parent.stock_status != status {
            parent.stock_status = status;
            product::save(&self.pool, &parent).await?;
        }
        self.refresh_derived_data(parent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::models::ProductStatus;

    async fn catalog() -> (SqliteCatalog, tempfile::TempDir) {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        (SqliteCatalog::new(db.pool, dir.path().join("uploads")), dir)
    }

    fn simple(sku: &str, price: i64) -> Product {
        let mut p = Product::new(ProductType::Simple);
        p.name = format!("Product {sku}");
        p.sku = sku.to_string();
        p.regular_price = Some(Decimal::new(price, 2));
        p
    }

    #[tokio::test]
    async fn test_save_and_find_product() {
        let (catalog, _dir) = catalog().await;
        let cat = catalog.insert_term(TAXONOMY_CATEGORY, "Shirts", "shirts").await.unwrap();

        let mut p = simple("SKU-1", 1999);
        p.status = ProductStatus::Publish;
        p.category_ids = vec![cat.id];
        p.meta.insert("_brand".into(), serde_json::json!("acme"));
        let id = catalog.save_product(&mut p).await.unwrap();
        assert_eq!(p.id, id);

        let loaded = catalog.find_product(id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "SKU-1");
        assert_eq!(loaded.regular_price, Some(Decimal::new(1999, 2)));
        assert_eq!(loaded.category_ids, vec![cat.id]);
        assert_eq!(loaded.meta["_brand"], "acme");
        assert_eq!(loaded.status, ProductStatus::Publish);
        assert_eq!(catalog.find_product_id_by_sku("SKU-1").await.unwrap(), Some(id));
        assert_eq!(catalog.find_product_id_by_sku("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let (catalog, _dir) = catalog().await;
        catalog.save_product(&mut simple("DUP", 100)).await.unwrap();
        let err = catalog.save_product(&mut simple("DUP", 200)).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSku(sku) if sku == "DUP"));

        // empty SKUs never collide
        catalog.save_product(&mut simple("", 100)).await.unwrap();
        catalog.save_product(&mut simple("", 100)).await.unwrap();
    }

    #[tokio::test]
    async fn test_terms_and_taxonomies() {
        let (catalog, _dir) = catalog().await;
        assert!(catalog.taxonomy_exists(TAXONOMY_TAG).await.unwrap());
        assert!(!catalog.taxonomy_exists("pa_color").await.unwrap());
        assert!(!catalog.taxonomy_exists("pwb-brand").await.unwrap());

        let id = catalog.ensure_attribute_taxonomy("pa_color", "Color").await.unwrap();
        assert_eq!(catalog.ensure_attribute_taxonomy("pa_color", "Color").await.unwrap(), id);
        assert!(catalog.taxonomy_exists("pa_color").await.unwrap());

        catalog.register_taxonomy("pwb-brand").await.unwrap();
        assert!(catalog.taxonomy_exists("pwb-brand").await.unwrap());

        catalog.insert_term("pa_color", "Red", "red").await.unwrap();
        let err = catalog.insert_term("pa_color", "Red", "red").await.unwrap_err();
        assert!(matches!(err, CatalogError::TermExists { .. }));

        let err = catalog.set_object_terms(1, "unknown", &[]).await.unwrap_err();
        assert!(matches!(err, CatalogError::TaxonomyNotRegistered(_)));
    }

    #[tokio::test]
    async fn test_sideload_uses_unique_names() {
        let (catalog, dir) = catalog().await;
        let source = dir.path().join("shirt.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let a = catalog.sideload_attachment(&source, "shirt.jpg", None).await.unwrap();
        let b = catalog.sideload_attachment(&source, "shirt.jpg", Some(5)).await.unwrap();
        assert_eq!(a.file_name, "shirt.jpg");
        assert_eq!(b.file_name, "shirt-1.jpg");
        assert_eq!(a.mime_type, "image/jpeg");
        assert_eq!(a.title, "shirt");
        assert_eq!(b.parent_id, Some(5));

        let path = catalog.attachment_path(b.id).await.unwrap().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"jpeg");

        catalog.set_attachment_parent(a.id, 9).await.unwrap();
        assert_eq!(catalog.find_attachment(a.id).await.unwrap().unwrap().parent_id, Some(9));
        assert!(matches!(
            catalog.set_attachment_parent(999, 1).await.unwrap_err(),
            CatalogError::AttachmentNotFound(999)
        ));
    }

    #[tokio::test]
    async fn test_sync_variable_product() {
        let (catalog, _dir) = catalog().await;
        let mut parent = Product::new(ProductType::Variable);
        parent.sku = "PARENT".into();
        parent.stock_status = StockStatus::OutOfStock;
        let parent_id = catalog.save_product(&mut parent).await.unwrap();

        for (price, status) in [(1500, StockStatus::OutOfStock), (1200, StockStatus::InStock)] {
            let mut v = Product::new_variation(parent_id);
            v.regular_price = Some(Decimal::new(price, 2));
            v.stock_status = status;
            catalog.save_product(&mut v).await.unwrap();
        }

        catalog.sync_variable_product(parent_id).await.unwrap();

        let parent = catalog.find_product(parent_id).await.unwrap().unwrap();
        assert_eq!(parent.stock_status, StockStatus::InStock);
        let lookup = product::find_lookup(catalog.pool(), parent_id).await.unwrap().unwrap();
        assert_eq!(lookup.min_price.as_deref(), Some("12.00"));
        assert_eq!(lookup.max_price.as_deref(), Some("15.00"));
        assert_eq!(catalog.children(parent_id).await.unwrap().len(), 2);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.b.jpg"), ("a.b", Some("jpg")));
        assert_eq!(split_extension("README"), ("README", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
    }
}
