//! Variation sync for variable products
//!
//! Incoming variations are matched against existing children by SKU, then
//! by their normalized attribute map. Matches are updated in place (or left
//! alone when updates are off), everything else is created under the
//! parent. Children missing from the payload are never removed.

use super::fields::{self, decimal, key_or};
use super::media::import_or_reuse;
use super::session::SessionState;
use crate::catalog::{CatalogError, CatalogResult, CatalogStore};
use shared::models::{BackorderPolicy, Product, ProductStatus, ProductType, StockStatus, VariationRecord};
use shared::util::{clean, sanitize_title};
use std::collections::BTreeMap;

/// Per-parent counters, for logging
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VariantSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Slug-cased keys, cleaned values, key-ordered
pub fn normalize_attributes(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    attributes
        .iter()
        .map(|(key, value)| (sanitize_title(key), clean(value)))
        .collect()
}

/// Comparison form of an attribute map: normalized, values lowercased
fn match_key(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    normalize_attributes(attributes)
        .into_iter()
        .map(|(key, value)| (key, value.to_lowercase()))
        .collect()
}

/// Existing child of `parent` that the incoming record refers to
async fn find_existing(
    catalog: &dyn CatalogStore,
    parent_id: i64,
    record: &VariationRecord,
) -> CatalogResult<Option<Product>> {
    let sku = fields::text(record.sku.as_deref());
    if !sku.is_empty()
        && let Some(id) = catalog.find_product_id_by_sku(&sku).await?
        && let Some(variation) = catalog.find_product(id).await?
        && variation.product_type == ProductType::Variation
        && variation.parent_id == Some(parent_id)
    {
        return Ok(Some(variation));
    }

    let target = match_key(&record.attributes);
    Ok(catalog
        .children(parent_id)
        .await?
        .into_iter()
        .filter(|child| child.product_type == ProductType::Variation)
        .find(|child| match_key(&child.variation_attributes) == target))
}

/// Copy a variation record onto `variation`
pub fn populate_variation(variation: &mut Product, record: &VariationRecord) {
    if let Some(sku) = record.sku.as_deref() {
        variation.sku = clean(sku);
    }
    variation.status = key_or(record.status.as_deref(), ProductStatus::from_key, ProductStatus::Publish);
    variation.regular_price = decimal(record.price.regular_price.as_deref());
    variation.sale_price = decimal(record.price.sale_price.as_deref());
    variation.manage_stock = record.manage_stock;
    variation.stock_quantity = record.stock_quantity;
    variation.stock_status = key_or(record.stock_status.as_deref(), StockStatus::from_key, StockStatus::InStock);
    variation.backorders = key_or(record.backorders.as_deref(), BackorderPolicy::from_key, BackorderPolicy::No);
    variation.weight = decimal(record.weight.as_deref());
    variation.length = decimal(record.dimensions.length.as_deref());
    variation.width = decimal(record.dimensions.width.as_deref());
    variation.height = decimal(record.dimensions.height.as_deref());
    variation.downloadable = record.downloadable;
    variation.is_virtual = record.is_virtual;
    variation.download_limit = record.download_limit.unwrap_or(-1);
    variation.download_expiry = record.download_expiry.unwrap_or(-1);
    variation.purchase_note = record.purchase_note.clone().unwrap_or_default();
    variation.variation_attributes = normalize_attributes(&record.attributes);
}

/// `Parent - Red, XL`
fn variation_title(parent: &Product, attributes: &BTreeMap<String, String>) -> String {
    let values: Vec<&str> = attributes
        .values()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        parent.name.clone()
    } else {
        format!("{} - {}", parent.name, values.join(", "))
    }
}

/// Reconcile `records` against the children of `parent`, then resync the
/// parent's price range and stock status.
pub async fn sync(
    catalog: &dyn CatalogStore,
    parent: &Product,
    records: &[VariationRecord],
    state: &mut SessionState,
) -> CatalogResult<VariantSummary> {
    let mut summary = VariantSummary::default();

    for record in records {
        let existing = find_existing(catalog, parent.id, record).await?;
        if existing.is_some() && !state.update_existing {
            summary.skipped += 1;
            continue;
        }

        let is_new = existing.is_none();
        let mut variation = existing.unwrap_or_else(|| Product::new_variation(parent.id));
        populate_variation(&mut variation, record);
        variation.name = variation_title(parent, &variation.variation_attributes);

        match catalog.save_product(&mut variation).await {
            Ok(_) => {}
            Err(CatalogError::DuplicateSku(sku)) => {
                tracing::warn!(parent_id = parent.id, sku = %sku, "Variation SKU held by another product, skipped");
                summary.failed += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        if let Some(image) = record.image.as_deref().filter(|name| !name.is_empty()) {
            let image_id = import_or_reuse(catalog, image, Some(variation.id), state).await;
            if image_id > 0 {
                variation.image_id = Some(image_id);
                catalog.save_product(&mut variation).await?;
            }
        }

        if is_new {
            summary.created += 1;
        } else {
            summary.updated += 1;
        }
    }

    catalog.sync_variable_product(parent.id).await?;
    Ok(summary)
}
