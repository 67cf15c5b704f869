//! Record reconciliation
//!
//! Turns one manifest entry into a created, updated or skipped catalog
//! entry. Re-running the same record converges on the same state: terms
//! are get-or-create, images go through the session media cache and
//! variations are matched before anything is created.

use super::fields::{self, datetime, decimal, key_or};
use super::media::import_or_reuse;
use super::session::SessionState;
use super::terms::ensure_term;
use super::variants;
use crate::catalog::{CatalogResult, CatalogStore};
use serde_json::Value;
use shared::models::{
    ATTRIBUTE_TAXONOMY_PREFIX, AttributeOptions, BackorderPolicy, CatalogVisibility, ImagesRecord,
    Product, ProductAttribute, ProductRecord, ProductStatus, ProductType, StockStatus,
    TAXONOMY_CATEGORY, TAXONOMY_SHIPPING_CLASS, TAXONOMY_TAG,
};
use shared::util::{clean, sanitize_title, term_name_from_slug};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Host hook around the save of a top-level entry
pub trait ImportHook: Send + Sync {
    /// Last chance to adjust or reject the entry before it is saved
    fn before_save(&self, _product: &mut Product, _record: &ProductRecord) -> Result<(), String> {
        Ok(())
    }

    /// Called once the entry, its terms and its variations are persisted
    fn after_save(&self, _product: &Product, _record: &ProductRecord) {}
}

/// Hook that accepts everything
pub struct AcceptAll;

impl ImportHook for AcceptAll {}

/// Result of reconciling one record; `Display` renders the log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Skipped { name: String, sku: String },
    Created { name: String, sku: String, product_id: i64 },
    Updated { name: String, sku: String, product_id: i64 },
    /// Type could not be instantiated or the hook said no
    Rejected { product_type: String },
    /// Storage failure while applying the record
    Failed { name: String, sku: String, reason: String },
    /// Manifest entry is not a JSON object
    Invalid,
}

impl ImportOutcome {
    pub fn product_id(&self) -> Option<i64> {
        match self {
            Self::Created { product_id, .. } | Self::Updated { product_id, .. } => Some(*product_id),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Failed { .. } | Self::Invalid)
    }
}

fn sku_label(sku: &str) -> &str {
    if sku.is_empty() { "N/A" } else { sku }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { name, sku } => {
                write!(f, "SKIPPED: {name} (SKU: {}) already exists.", sku_label(sku))
            }
            Self::Created { name, sku, .. } => {
                write!(f, "SUCCESS: Created \"{name}\" (SKU: {})", sku_label(sku))
            }
            Self::Updated { name, sku, .. } => {
                write!(f, "SUCCESS: Updated \"{name}\" (SKU: {})", sku_label(sku))
            }
            Self::Rejected { product_type } => {
                write!(f, "ERROR: Unable to create product of type {product_type}.")
            }
            Self::Failed { name, sku, reason } => write!(
                f,
                "ERROR: Failed to import \"{name}\" (SKU: {}): {reason}",
                sku_label(sku)
            ),
            Self::Invalid => write!(f, "ERROR: Invalid product record."),
        }
    }
}

/// Fresh entry for a declared type; unknown types become simple products
fn instantiate(product_type: &str) -> Option<Product> {
    match sanitize_title(product_type).as_str() {
        "variable" => Some(Product::new(ProductType::Variable)),
        // variations only exist under a variable parent
        "variation" => None,
        _ => Some(Product::new(ProductType::Simple)),
    }
}

/// Reconciliation engine over a catalog store
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
    hook: Arc<dyn ImportHook>,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            hook: Arc::new(AcceptAll),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ImportHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    /// Reconcile one manifest entry. Never fails: every problem ends up in
    /// the returned outcome.
    pub async fn reconcile(&self, entry: Value, state: &mut SessionState) -> ImportOutcome {
        let Some(record) = ProductRecord::from_value(entry) else {
            return ImportOutcome::Invalid;
        };

        match self.reconcile_record(&record, state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let sku = fields::text(record.sku.as_deref());
                tracing::warn!(sku = %sku, error = %e, "Record import failed");
                ImportOutcome::Failed {
                    name: fields::text(record.name.as_deref()),
                    sku,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn reconcile_record(
        &self,
        record: &ProductRecord,
        state: &mut SessionState,
    ) -> CatalogResult<ImportOutcome> {
        let catalog = self.catalog.as_ref();
        let sku = fields::text(record.sku.as_deref());
        let product_type = record
            .product_type
            .as_deref()
            .map(clean)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| ProductType::Simple.as_str().to_string());

        let existing = match catalog.find_product_id_by_sku(&sku).await? {
            Some(id) => catalog.find_product(id).await?,
            None => None,
        };

        let (mut product, is_new) = match existing {
            Some(found) if !state.update_existing => {
                return Ok(ImportOutcome::Skipped {
                    name: found.name,
                    sku,
                });
            }
            Some(found) => (found, false),
            None => match instantiate(&product_type) {
                Some(fresh) => (fresh, true),
                None => return Ok(ImportOutcome::Rejected { product_type }),
            },
        };

        self.populate(&mut product, record).await;
        let attribute_terms = self.apply_attributes(&mut product, record).await?;
        let deferred = self.apply_taxonomies(&mut product, record).await?;
        for (key, value) in &record.meta {
            if !key.is_empty() {
                product.meta.insert(key.clone(), value.clone());
            }
        }
        let media = self.apply_images(&mut product, &record.images, state).await;

        if let Err(reason) = self.hook.before_save(&mut product, record) {
            tracing::info!(sku = %sku, reason = %reason, "Record rejected by import hook");
            return Ok(ImportOutcome::Rejected { product_type });
        }

        let product_id = catalog.save_product(&mut product).await?;

        for (taxonomy, term_ids) in merge_terms(deferred, attribute_terms) {
            if term_ids.is_empty() || !catalog.taxonomy_exists(&taxonomy).await? {
                continue;
            }
            catalog.set_object_terms(product_id, &taxonomy, &term_ids).await?;
        }

        for attachment_id in media {
            if let Some(attachment) = catalog.find_attachment(attachment_id).await?
                && attachment.parent_id != Some(product_id)
            {
                catalog.set_attachment_parent(attachment_id, product_id).await?;
            }
        }

        if product.product_type == ProductType::Variable {
            let summary = variants::sync(catalog, &product, &record.variations, state).await?;
            tracing::debug!(
                product_id,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Variations synced"
            );
        }

        catalog.refresh_derived_data(product_id).await?;
        self.hook.after_save(&product, record);

        let name = product.name.clone();
        Ok(if is_new {
            ImportOutcome::Created { name, sku, product_id }
        } else {
            ImportOutcome::Updated { name, sku, product_id }
        })
    }

    /// Core scalar fields with their defaults
    async fn populate(&self, product: &mut Product, record: &ProductRecord) {
        let pricing = &record.pricing;
        let shipping = &record.shipping;

        product.name = fields::text(record.name.as_deref());
        product.slug = record.slug.as_deref().map(sanitize_title).unwrap_or_default();
        product.status = key_or(record.status.as_deref(), ProductStatus::from_key, ProductStatus::Draft);
        product.catalog_visibility = key_or(
            record.catalog_visibility.as_deref(),
            CatalogVisibility::from_key,
            CatalogVisibility::Visible,
        );
        product.description = record.description.clone().unwrap_or_default();
        product.short_description = record.short_description.clone().unwrap_or_default();
        product.menu_order = record.menu_order.unwrap_or(0);
        product.featured = record.featured;
        product.reviews_allowed = record.reviews_allowed;
        product.is_virtual = record.is_virtual;
        product.downloadable = record.downloadable;
        product.purchase_note = pricing.purchase_note.clone().unwrap_or_default();

        if let Some(sku) = record.sku.as_deref() {
            product.sku = clean(sku);
        }

        product.regular_price = decimal(pricing.regular_price.as_deref());
        product.sale_price = decimal(pricing.sale_price.as_deref());
        product.date_on_sale_from = datetime(pricing.sale_price_dates_from.as_deref());
        product.date_on_sale_to = datetime(pricing.sale_price_dates_to.as_deref());
        product.manage_stock = pricing.manage_stock;
        product.stock_quantity = pricing.stock_quantity;
        product.stock_status = key_or(pricing.stock_status.as_deref(), StockStatus::from_key, StockStatus::InStock);
        product.backorders = key_or(pricing.backorders.as_deref(), BackorderPolicy::from_key, BackorderPolicy::No);
        product.sold_individually = pricing.sold_individually;

        product.weight = decimal(shipping.weight.as_deref());
        product.length = decimal(shipping.length.as_deref());
        product.width = decimal(shipping.width.as_deref());
        product.height = decimal(shipping.height.as_deref());

        if let Some(class) = shipping.shipping_class.as_deref().filter(|c| !c.is_empty()) {
            let term_id =
                ensure_term(self.catalog.as_ref(), TAXONOMY_SHIPPING_CLASS, &sanitize_title(class)).await;
            if term_id > 0 {
                product.shipping_class_id = Some(term_id);
            }
        }

        if let Some(limit) = record.download_limit {
            product.download_limit = limit;
        }
        if let Some(expiry) = record.download_expiry {
            product.download_expiry = expiry;
        }
    }

    /// Attribute taxonomy id for a taxonomy-backed attribute name, or
    /// `None` when the attribute has to be stored as a local one.
    ///
    /// `pa_*` names are created on first use; other registered taxonomies
    /// are used as-is with id 0.
    async fn attribute_taxonomy(&self, name: &str) -> CatalogResult<Option<i64>> {
        if name.is_empty() || sanitize_title(name) != name {
            return Ok(None);
        }
        if let Some(suffix) = name.strip_prefix(ATTRIBUTE_TAXONOMY_PREFIX)
            && !suffix.is_empty()
        {
            if let Some(existing) = self.catalog.find_attribute_taxonomy(name).await? {
                return Ok(Some(existing.id));
            }
            let label = term_name_from_slug(suffix);
            let id = self.catalog.ensure_attribute_taxonomy(name, &label).await?;
            tracing::info!(taxonomy = %name, label = %label, "Attribute taxonomy registered from import");
            return Ok(Some(id));
        }
        Ok(self.catalog.taxonomy_exists(name).await?.then_some(0))
    }

    /// Replace the entry's attributes, returning taxonomy → term ids for
    /// taxonomy-backed ones
    async fn apply_attributes(
        &self,
        product: &mut Product,
        record: &ProductRecord,
    ) -> CatalogResult<BTreeMap<String, Vec<i64>>> {
        let mut attributes = Vec::with_capacity(record.attributes.len());
        let mut terms = BTreeMap::new();

        for attr in &record.attributes {
            let name = attr.name.clone().unwrap_or_default();
            let position = attr.position.unwrap_or(0);

            let taxonomy_id = if attr.is_taxonomy {
                self.attribute_taxonomy(&name).await?
            } else {
                None
            };

            let attribute = match taxonomy_id {
                Some(id) => {
                    let mut term_ids = Vec::new();
                    for option in &attr.options {
                        let term_id =
                            ensure_term(self.catalog.as_ref(), &name, &sanitize_title(option)).await;
                        if term_id > 0 {
                            term_ids.push(term_id);
                        }
                    }
                    if !term_ids.is_empty() {
                        terms.insert(name.clone(), term_ids.clone());
                    }
                    ProductAttribute {
                        id,
                        name,
                        options: AttributeOptions::Terms(term_ids),
                        position,
                        visible: attr.visible,
                        variation: attr.variation,
                    }
                }
                None => ProductAttribute {
                    id: 0,
                    name: attr.slug.clone().filter(|s| !s.is_empty()).unwrap_or(name),
                    options: AttributeOptions::Values(
                        attr.options.iter().map(|o| clean(o)).collect(),
                    ),
                    position,
                    visible: attr.visible,
                    variation: attr.variation,
                },
            };
            attributes.push(attribute);
        }

        product.attributes = attributes;
        Ok(terms)
    }

    /// Resolve `taxonomies` slugs. Categories and tags go straight onto the
    /// entry; every other taxonomy is returned for assignment after save.
    async fn apply_taxonomies(
        &self,
        product: &mut Product,
        record: &ProductRecord,
    ) -> CatalogResult<BTreeMap<String, Vec<i64>>> {
        let mut deferred = BTreeMap::new();

        for (taxonomy, slugs) in &record.taxonomies {
            if !self.catalog.taxonomy_exists(taxonomy).await? {
                tracing::debug!(taxonomy = %taxonomy, "Unknown taxonomy in record, ignored");
                continue;
            }

            let mut term_ids = Vec::new();
            for slug in slugs {
                let term_id = ensure_term(self.catalog.as_ref(), taxonomy, &sanitize_title(slug)).await;
                if term_id > 0 && !term_ids.contains(&term_id) {
                    term_ids.push(term_id);
                }
            }
            if term_ids.is_empty() {
                continue;
            }

            match taxonomy.as_str() {
                TAXONOMY_CATEGORY => product.category_ids = term_ids,
                TAXONOMY_TAG => product.tag_ids = term_ids,
                _ => {
                    deferred.insert(taxonomy.clone(), term_ids);
                }
            }
        }
        Ok(deferred)
    }

    /// Featured image and gallery; returns every attachment referenced
    async fn apply_images(
        &self,
        product: &mut Product,
        images: &ImagesRecord,
        state: &mut SessionState,
    ) -> Vec<i64> {
        let catalog = self.catalog.as_ref();
        let owner = (!product.is_new()).then_some(product.id);
        let mut assigned = Vec::new();

        if let Some(featured) = images.featured.as_deref().filter(|f| !f.is_empty()) {
            let id = import_or_reuse(catalog, featured, owner, state).await;
            if id > 0 {
                product.image_id = Some(id);
                assigned.push(id);
            }
        }

        let mut gallery = Vec::new();
        for file_name in &images.gallery {
            let id = import_or_reuse(catalog, file_name, owner, state).await;
            if id > 0 {
                if !gallery.contains(&id) {
                    gallery.push(id);
                }
                if !assigned.contains(&id) {
                    assigned.push(id);
                }
            }
        }
        // an empty gallery clears stale entries on update
        product.gallery_image_ids = gallery;

        assigned
    }
}

/// Union of two taxonomy → term id maps, de-duplicated per taxonomy
fn merge_terms(
    mut base: BTreeMap<String, Vec<i64>>,
    extra: BTreeMap<String, Vec<i64>>,
) -> BTreeMap<String, Vec<i64>> {
    for (taxonomy, term_ids) in extra {
        if term_ids.is_empty() {
            continue;
        }
        let merged = base.entry(taxonomy).or_default();
        for id in term_ids {
            if !merged.contains(&id) {
                merged.push(id);
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::IMAGES_DIR;
    use crate::catalog::SqliteCatalog;
    use crate::db::DbService;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        catalog: Arc<SqliteCatalog>,
        reconciler: Reconciler,
        _dir: tempfile::TempDir,
        work: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(work.join(IMAGES_DIR)).unwrap();
        std::fs::write(work.join(IMAGES_DIR).join("tee.jpg"), b"jpeg").unwrap();
        std::fs::write(work.join(IMAGES_DIR).join("back.jpg"), b"jpeg").unwrap();
        let catalog = Arc::new(SqliteCatalog::new(db.pool, dir.path().join("uploads")));
        Fixture {
            reconciler: Reconciler::new(catalog.clone()),
            catalog,
            _dir: dir,
            work,
        }
    }

    impl Fixture {
        fn state(&self, update_existing: bool) -> SessionState {
            SessionState::new(self.work.clone(), 1, update_existing, 5)
        }
    }

    fn tee() -> Value {
        json!({
            "type": "variable",
            "sku": "TEE",
            "name": "  <b>Tee</b> ",
            "status": "publish",
            "pricing": { "regular_price": "20.00", "stock_status": "bogus" },
            "shipping": { "weight": "0.2", "shipping_class": "Small Parcel" },
            "images": { "featured": "tee.jpg", "gallery": ["back.jpg", "tee.jpg", "missing.jpg"] },
            "taxonomies": { "product_cat": ["shirts", "Shirts"], "product_tag": ["summer"], "made_up": ["x"] },
            "attributes": [
                { "name": "pa_color", "is_taxonomy": true, "variation": true, "options": ["red", "blue"] },
                { "name": "Fit", "options": ["Slim ", "Regular"], "visible": true }
            ],
            "meta": { "_brand": "acme" },
            "variations": [
                { "sku": "TEE-R", "attributes": { "pa_color": "red" }, "price": { "regular_price": "20" }, "image": "tee.jpg" },
                { "attributes": { "pa_color": "blue" }, "price": { "regular_price": "22" } }
            ]
        })
    }

    #[test]
    fn test_log_lines() {
        let skipped = ImportOutcome::Skipped { name: "Tee".into(), sku: String::new() };
        assert_eq!(skipped.to_string(), "SKIPPED: Tee (SKU: N/A) already exists.");
        let created = ImportOutcome::Created { name: "Tee".into(), sku: "TEE".into(), product_id: 1 };
        assert_eq!(created.to_string(), "SUCCESS: Created \"Tee\" (SKU: TEE)");
        let rejected = ImportOutcome::Rejected { product_type: "grouped".into() };
        assert_eq!(rejected.to_string(), "ERROR: Unable to create product of type grouped.");
    }

    #[test]
    fn test_instantiate_falls_back_to_simple() {
        assert_eq!(instantiate("Variable").unwrap().product_type, ProductType::Variable);
        assert_eq!(instantiate("grouped").unwrap().product_type, ProductType::Simple);
        assert_eq!(instantiate("").unwrap().product_type, ProductType::Simple);
        assert!(instantiate("variation").is_none());
    }

    #[test]
    fn test_merge_terms() {
        let mut a = BTreeMap::new();
        a.insert("pa_color".to_string(), vec![1, 2]);
        let mut b = BTreeMap::new();
        b.insert("pa_color".to_string(), vec![2, 3]);
        b.insert("pa_size".to_string(), vec![]);
        let merged = merge_terms(a, b);
        assert_eq!(merged["pa_color"], vec![1, 2, 3]);
        assert!(!merged.contains_key("pa_size"));
    }

    #[tokio::test]
    async fn test_create_variable_product() {
        let fx = fixture().await;
        let mut state = fx.state(false);

        let outcome = fx.reconciler.reconcile(tee(), &mut state).await;
        assert_eq!(outcome.to_string(), "SUCCESS: Created \"Tee\" (SKU: TEE)");
        let id = outcome.product_id().unwrap();

        let p = fx.catalog.find_product(id).await.unwrap().unwrap();
        assert_eq!(p.product_type, ProductType::Variable);
        assert_eq!(p.status, ProductStatus::Publish);
        assert_eq!(p.regular_price, Some(Decimal::new(2000, 2)));
        assert_eq!(p.category_ids.len(), 1);
        assert_eq!(p.tag_ids.len(), 1);
        assert_eq!(p.meta["_brand"], json!("acme"));
        assert!(p.shipping_class_id.is_some());

        // featured and gallery share tee.jpg; missing.jpg is dropped
        assert_eq!(state.media_map.len(), 2);
        assert_eq!(p.gallery_image_ids.len(), 2);
        assert_eq!(p.image_id, Some(state.media_map["tee.jpg"]));
        let featured = fx.catalog.find_attachment(state.media_map["tee.jpg"]).await.unwrap().unwrap();
        assert_eq!(featured.parent_id, Some(id));

        let color = &p.attributes[0];
        assert!(color.id > 0);
        assert!(matches!(&color.options, AttributeOptions::Terms(ids) if ids.len() == 2));
        assert_eq!(fx.catalog.object_terms(id, "pa_color").await.unwrap().len(), 2);
        assert_eq!(
            p.attributes[1].options,
            AttributeOptions::Values(vec!["Slim".into(), "Regular".into()])
        );

        let children = fx.catalog.children(id).await.unwrap();
        assert_eq!(children.len(), 2);
        let red = children.iter().find(|c| c.sku == "TEE-R").unwrap();
        assert_eq!(red.image_id, Some(state.media_map["tee.jpg"]));
    }

    #[tokio::test]
    async fn test_skip_on_exists_does_not_mutate() {
        let fx = fixture().await;
        let mut state = fx.state(false);
        fx.reconciler.reconcile(tee(), &mut state).await;

        let mut changed = tee();
        changed["pricing"]["regular_price"] = json!("99");
        let outcome = fx.reconciler.reconcile(changed, &mut state).await;
        assert_eq!(outcome.to_string(), "SKIPPED: Tee (SKU: TEE) already exists.");

        let id = fx.catalog.find_product_id_by_sku("TEE").await.unwrap().unwrap();
        let p = fx.catalog.find_product(id).await.unwrap().unwrap();
        assert_eq!(p.regular_price, Some(Decimal::new(2000, 2)));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let fx = fixture().await;
        let mut state = fx.state(true);

        let first = fx.reconciler.reconcile(tee(), &mut state).await;
        let id = first.product_id().unwrap();
        let before = fx.catalog.find_product(id).await.unwrap().unwrap();

        let second = fx.reconciler.reconcile(tee(), &mut state).await;
        assert_eq!(second.to_string(), "SUCCESS: Updated \"Tee\" (SKU: TEE)");
        assert_eq!(second.product_id(), Some(id));

        let after = fx.catalog.find_product(id).await.unwrap().unwrap();
        assert_eq!(after.attributes, before.attributes);
        assert_eq!(after.category_ids, before.category_ids);
        assert_eq!(after.gallery_image_ids, before.gallery_image_ids);
        assert_eq!(fx.catalog.children(id).await.unwrap().len(), 2);
        assert_eq!(state.media_map.len(), 2);

        let colors = fx.catalog.object_terms(id, "pa_color").await.unwrap();
        assert_eq!(colors.len(), 2);
    }

    #[tokio::test]
    async fn test_terms_shared_across_records() {
        let fx = fixture().await;
        let mut state = fx.state(false);
        let a = json!({ "sku": "A", "attributes": [{ "name": "pa_size", "is_taxonomy": 1, "options": ["xl"] }] });
        let b = json!({ "sku": "B", "attributes": [{ "name": "pa_size", "is_taxonomy": 1, "options": ["XL"] }] });
        let a = fx.reconciler.reconcile(a, &mut state).await.product_id().unwrap();
        let b = fx.reconciler.reconcile(b, &mut state).await.product_id().unwrap();

        let ta = fx.catalog.object_terms(a, "pa_size").await.unwrap();
        let tb = fx.catalog.object_terms(b, "pa_size").await.unwrap();
        assert_eq!(ta.len(), 1);
        assert_eq!(ta, tb);
        assert_eq!(ta[0].name, "Xl");
    }

    #[tokio::test]
    async fn test_existing_attribute_taxonomy_is_reused() {
        let fx = fixture().await;
        let existing = fx.catalog.ensure_attribute_taxonomy("pa_material", "Fabric").await.unwrap();
        let mut state = fx.state(false);
        let record = json!({ "sku": "M", "attributes": [{ "name": "pa_material", "is_taxonomy": true, "options": ["cotton"] }] });
        let id = fx.reconciler.reconcile(record, &mut state).await.product_id().unwrap();

        let product = fx.catalog.find_product(id).await.unwrap().unwrap();
        assert_eq!(product.attributes[0].id, existing);
        let taxonomy = fx.catalog.find_attribute_taxonomy("pa_material").await.unwrap().unwrap();
        assert_eq!(taxonomy.id, existing);
        assert_eq!(taxonomy.label, "Fabric");
    }

    #[tokio::test]
    async fn test_defaults_for_sparse_record() {
        let fx = fixture().await;
        let mut state = fx.state(false);
        let outcome = fx
            .reconciler
            .reconcile(json!({ "type": "grouped", "pricing": { "sale_price_dates_from": "soon" } }), &mut state)
            .await;
        assert_eq!(outcome.to_string(), "SUCCESS: Created \"\" (SKU: N/A)");

        let p = fx.catalog.find_product(outcome.product_id().unwrap()).await.unwrap().unwrap();
        assert_eq!(p.product_type, ProductType::Simple);
        assert_eq!(p.status, ProductStatus::Draft);
        assert_eq!(p.stock_status, StockStatus::InStock);
        assert_eq!(p.backorders, BackorderPolicy::No);
        assert_eq!(p.date_on_sale_from, None);
        assert!(p.gallery_image_ids.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_and_rejected_records() {
        let fx = fixture().await;
        let mut state = fx.state(false);
        assert_eq!(
            fx.reconciler.reconcile(json!("oops"), &mut state).await,
            ImportOutcome::Invalid
        );
        let outcome = fx.reconciler.reconcile(json!({ "type": "variation" }), &mut state).await;
        assert_eq!(outcome.to_string(), "ERROR: Unable to create product of type variation.");
    }

    struct RejectAll;

    impl ImportHook for RejectAll {
        fn before_save(&self, _: &mut Product, _: &ProductRecord) -> Result<(), String> {
            Err("nope".into())
        }
    }

    struct CountSaves(AtomicUsize);

    impl ImportHook for CountSaves {
        fn after_save(&self, _: &Product, _: &ProductRecord) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_hooks() {
        let fx = fixture().await;
        let mut state = fx.state(false);

        let rejecting = fx.reconciler.clone().with_hook(Arc::new(RejectAll));
        let outcome = rejecting.reconcile(json!({ "sku": "X" }), &mut state).await;
        assert_eq!(outcome.to_string(), "ERROR: Unable to create product of type simple.");
        assert!(fx.catalog.find_product_id_by_sku("X").await.unwrap().is_none());

        let counter = Arc::new(CountSaves(AtomicUsize::new(0)));
        let counting = fx.reconciler.clone().with_hook(counter.clone());
        counting.reconcile(json!({ "sku": "Y" }), &mut state).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
