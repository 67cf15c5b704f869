//! Export assembler
//!
//! Flattens catalog entries into package records, bundles every referenced
//! image once, and writes the package into an anonymous temp file. The
//! file disappears as soon as the returned handle is dropped, so a fully
//! streamed (or abandoned) download leaves nothing on disk.

use crate::archive::{ArchiveError, PackageWriter};
use crate::catalog::{CatalogError, CatalogStore};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    AttributeOptions, AttributeRecord, DimensionsRecord, ImagesRecord, PorterSettings,
    PricingRecord, Product, ProductRecord, ProductType, ShippingRecord, TAXONOMY_CATEGORY,
    TAXONOMY_TAG, VariationPriceRecord, VariationRecord,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No products were selected for export.")]
    EmptySelection,

    #[error("Unable to create a temporary file for the export package: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Unable to create the export archive: {0}")]
    ArchiveOpen(#[from] ArchiveError),

    #[error("Failed to encode products data to JSON: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Background task failed: {0}")]
    Join(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

impl From<tokio::task::JoinError> for ExportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ExportError::Join(err.to_string())
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        let message = err.to_string();
        match err {
            ExportError::EmptySelection => AppError::new(ErrorCode::EmptySelection),
            ExportError::TempFile(_) => AppError::with_message(ErrorCode::TempFileFailed, message),
            ExportError::ArchiveOpen(_) => AppError::with_message(ErrorCode::ArchiveOpenFailed, message),
            ExportError::Encoding(_) => AppError::with_message(ErrorCode::EncodingFailed, message),
            ExportError::Catalog(e) => e.into(),
            ExportError::Join(msg) => AppError::internal(msg),
        }
    }
}

/// A finished package, ready to stream
pub struct ExportPackage {
    /// Anonymous temp file positioned at the start
    pub file: tokio::fs::File,
    pub size: u64,
    /// `product-porter-YYYYmmdd-HHMMSS.zip`
    pub file_name: String,
    /// Entries written (missing ids are skipped)
    pub products: usize,
}

/// Download name for a package built at `at`
pub fn package_file_name(at: DateTime<Utc>) -> String {
    format!("product-porter-{}.zip", at.format("%Y%m%d-%H%M%S"))
}

fn format_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, false))
}

fn decimal_text(value: Option<rust_decimal::Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

/// Attachments bundled into one package: id → archive name
#[derive(Default)]
struct ImageBundle {
    names: HashMap<i64, String>,
    used: HashSet<String>,
    files: Vec<(String, PathBuf)>,
}

impl ImageBundle {
    /// Archive name for an attachment, bundling it on first use.
    /// Attachments without a readable backing file yield `None`.
    async fn add(&mut self, catalog: &dyn CatalogStore, attachment_id: Option<i64>) -> ExportResult<Option<String>> {
        let Some(id) = attachment_id.filter(|id| *id > 0) else {
            return Ok(None);
        };
        if let Some(name) = self.names.get(&id) {
            return Ok(Some(name.clone()));
        }

        let Some(path) = catalog.attachment_path(id).await? else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!(attachment_id = id, path = %path.display(), "Attachment file missing, not exported");
            return Ok(None);
        }
        let Some(base) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        let name = self.unique_name(base);
        self.names.insert(id, name.clone());
        self.files.push((name.clone(), path));
        Ok(Some(name))
    }

    fn unique_name(&mut self, file_name: &str) -> String {
        if self.used.insert(file_name.to_string()) {
            return file_name.to_string();
        }
        let (stem, ext) = crate::catalog::split_extension(file_name);
        let mut counter = 1;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{stem}-{counter}.{ext}"),
                None => format!("{stem}-{counter}"),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Builds export packages from the catalog
#[derive(Clone)]
pub struct Exporter {
    catalog: Arc<dyn CatalogStore>,
}

impl Exporter {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Build a package for `product_ids`, in order. Unknown ids are skipped.
    pub async fn export(&self, product_ids: &[i64], settings: &PorterSettings) -> ExportResult<ExportPackage> {
        if product_ids.is_empty() {
            return Err(ExportError::EmptySelection);
        }

        let mut images = ImageBundle::default();
        let mut records = Vec::with_capacity(product_ids.len());
        for &id in product_ids {
            let Some(product) = self.catalog.find_product(id).await? else {
                tracing::debug!(product_id = id, "Export skipped missing product");
                continue;
            };
            records.push(self.flatten(&product, settings, &mut images).await?);
        }

        let manifest = serde_json::to_vec_pretty(&records)?;
        let products = records.len();
        let files = images.files;

        let (file, size) = tokio::task::spawn_blocking(move || -> ExportResult<(std::fs::File, u64)> {
            let file = tempfile::tempfile().map_err(ExportError::TempFile)?;
            let mut writer = PackageWriter::new(file);
            for (name, path) in &files {
                writer.write_image(name, path)?;
            }
            writer.write_manifest(&manifest)?;
            let mut file = writer.finish()?;
            let size = file.seek(SeekFrom::End(0)).map_err(ArchiveError::from)?;
            file.seek(SeekFrom::Start(0)).map_err(ArchiveError::from)?;
            Ok((file, size))
        })
        .await??;

        tracing::info!(products, size, "Export package built");
        crate::audit_log!("export.package", "products", format!("count={products} bytes={size}"));

        Ok(ExportPackage {
            file: tokio::fs::File::from_std(file),
            size,
            file_name: package_file_name(Utc::now()),
            products,
        })
    }

    async fn term_slugs(&self, object_id: i64, taxonomy: &str) -> ExportResult<Vec<String>> {
        Ok(self
            .catalog
            .object_terms(object_id, taxonomy)
            .await?
            .into_iter()
            .map(|t| t.slug)
            .collect())
    }

    async fn flatten(
        &self,
        p: &Product,
        settings: &PorterSettings,
        images: &mut ImageBundle,
    ) -> ExportResult<ProductRecord> {
        let catalog = self.catalog.as_ref();

        let featured = images.add(catalog, p.image_id).await?;
        let mut gallery = Vec::new();
        for &id in &p.gallery_image_ids {
            if let Some(name) = images.add(catalog, Some(id)).await? {
                gallery.push(name);
            }
        }

        let mut taxonomies = BTreeMap::new();
        for taxonomy in [TAXONOMY_CATEGORY, TAXONOMY_TAG] {
            taxonomies.insert(taxonomy.to_string(), self.term_slugs(p.id, taxonomy).await?);
        }
        for taxonomy in &settings.custom_taxonomies {
            if catalog.taxonomy_exists(taxonomy).await? {
                taxonomies.insert(taxonomy.clone(), self.term_slugs(p.id, taxonomy).await?);
            }
        }

        let mut meta = BTreeMap::new();
        for key in &settings.custom_meta_keys {
            match p.meta.get(key) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) if s.is_empty() => {}
                Some(value) => {
                    meta.insert(key.clone(), value.clone());
                }
            }
        }

        let shipping_class = match p.shipping_class_id {
            Some(id) => catalog.find_term(id).await?.map(|t| t.slug),
            None => None,
        };

        let mut attributes = Vec::with_capacity(p.attributes.len());
        for attr in &p.attributes {
            let options = match &attr.options {
                AttributeOptions::Terms(ids) => {
                    let mut slugs = Vec::with_capacity(ids.len());
                    for &id in ids {
                        if let Some(term) = catalog.find_term(id).await? {
                            slugs.push(term.slug);
                        }
                    }
                    slugs
                }
                AttributeOptions::Values(values) => values.clone(),
            };
            attributes.push(AttributeRecord {
                id: Some(attr.id),
                name: Some(attr.name.clone()),
                slug: Some(attr.name.clone()),
                is_taxonomy: attr.is_taxonomy(),
                visible: attr.visible,
                variation: attr.variation,
                position: Some(attr.position),
                options,
            });
        }

        let variations = if p.product_type == ProductType::Variable {
            let mut out = Vec::new();
            for child in catalog.children(p.id).await? {
                if child.product_type != ProductType::Variation {
                    continue;
                }
                let image = images.add(catalog, child.image_id).await?;
                out.push(flatten_variation(&child, image));
            }
            out
        } else {
            Vec::new()
        };

        Ok(ProductRecord {
            id: Some(p.id),
            product_type: Some(p.product_type.as_str().to_string()),
            sku: Some(p.sku.clone()),
            name: Some(p.name.clone()),
            slug: Some(p.slug.clone()),
            status: Some(p.status.as_str().to_string()),
            description: Some(p.description.clone()),
            short_description: Some(p.short_description.clone()),
            catalog_visibility: Some(p.catalog_visibility.as_str().to_string()),
            featured: p.featured,
            reviews_allowed: p.reviews_allowed,
            menu_order: Some(p.menu_order),
            is_virtual: p.is_virtual,
            downloadable: p.downloadable,
            download_limit: Some(p.download_limit),
            download_expiry: Some(p.download_expiry),
            pricing: PricingRecord {
                regular_price: decimal_text(p.regular_price),
                sale_price: decimal_text(p.sale_price),
                sale_price_dates_from: format_date(p.date_on_sale_from),
                sale_price_dates_to: format_date(p.date_on_sale_to),
                manage_stock: p.manage_stock,
                stock_quantity: p.stock_quantity,
                stock_status: Some(p.stock_status.as_str().to_string()),
                backorders: Some(p.backorders.as_str().to_string()),
                sold_individually: p.sold_individually,
                purchase_note: Some(p.purchase_note.clone()),
            },
            shipping: ShippingRecord {
                weight: decimal_text(p.weight),
                length: decimal_text(p.length),
                width: decimal_text(p.width),
                height: decimal_text(p.height),
                shipping_class,
            },
            images: ImagesRecord { featured, gallery },
            taxonomies,
            attributes,
            meta,
            variations,
            date_created: format_date(p.date_created),
            date_modified: format_date(p.date_modified),
        })
    }
}

fn flatten_variation(v: &Product, image: Option<String>) -> VariationRecord {
    VariationRecord {
        id: Some(v.id),
        sku: Some(v.sku.clone()),
        status: Some(v.status.as_str().to_string()),
        price: VariationPriceRecord {
            regular_price: decimal_text(v.regular_price),
            sale_price: decimal_text(v.sale_price),
        },
        manage_stock: v.manage_stock,
        stock_quantity: v.stock_quantity,
        stock_status: Some(v.stock_status.as_str().to_string()),
        backorders: Some(v.backorders.as_str().to_string()),
        weight: decimal_text(v.weight),
        dimensions: DimensionsRecord {
            length: decimal_text(v.length),
            width: decimal_text(v.width),
            height: decimal_text(v.height),
        },
        image,
        attributes: v.variation_attributes.clone(),
        downloadable: v.downloadable,
        is_virtual: v.is_virtual,
        download_limit: Some(v.download_limit),
        download_expiry: Some(v.download_expiry),
        purchase_note: Some(v.purchase_note.clone()),
        date_created: format_date(v.date_created),
        date_modified: format_date(v.date_modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive;
    use crate::catalog::SqliteCatalog;
    use crate::db::DbService;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    async fn setup() -> (Arc<SqliteCatalog>, Exporter, tempfile::TempDir) {
        let db = DbService::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(SqliteCatalog::new(db.pool, dir.path().join("uploads")));
        (catalog.clone(), Exporter::new(catalog), dir)
    }

    async fn read_package(mut package: ExportPackage, into: &std::path::Path) -> Vec<Value> {
        let mut bytes = Vec::new();
        package.file.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len() as u64, package.size);
        archive::unpack(&bytes, into).unwrap();
        archive::read_manifest(into).unwrap()
    }

    #[test]
    fn test_package_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 7, 9, 8, 5, 3).unwrap();
        assert_eq!(package_file_name(at), "product-porter-20240709-080503.zip");
    }

    #[test]
    fn test_unique_names() {
        let mut bundle = ImageBundle::default();
        assert_eq!(bundle.unique_name("a.jpg"), "a.jpg");
        assert_eq!(bundle.unique_name("a.jpg"), "a-1.jpg");
        assert_eq!(bundle.unique_name("a.jpg"), "a-2.jpg");
        assert_eq!(bundle.unique_name("readme"), "readme");
        assert_eq!(bundle.unique_name("readme"), "readme-1");
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let (_catalog, exporter, _dir) = setup().await;
        let err = exporter.export(&[], &PorterSettings::default()).await.err().unwrap();
        assert!(matches!(err, ExportError::EmptySelection));
    }

    #[tokio::test]
    async fn test_export_flattens_and_bundles_images() {
        let (catalog, exporter, dir) = setup().await;

        let src = dir.path().join("shirt.jpg");
        std::fs::write(&src, b"jpeg").unwrap();
        let image = catalog.sideload_attachment(&src, "shirt.jpg", None).await.unwrap();
        let cat = catalog.insert_term(TAXONOMY_CATEGORY, "Shirts", "shirts").await.unwrap();
        catalog.register_taxonomy("brand").await.unwrap();
        let brand = catalog.insert_term("brand", "Acme", "acme").await.unwrap();

        let mut p = Product::new(ProductType::Variable);
        p.name = "Tee".into();
        p.sku = "TEE".into();
        p.regular_price = Some(Decimal::new(1999, 2));
        p.image_id = Some(image.id);
        p.gallery_image_ids = vec![image.id];
        p.category_ids = vec![cat.id];
        p.date_on_sale_from = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        p.meta.insert("_brand_note".into(), json!("hello"));
        p.meta.insert("_empty".into(), json!(""));
        p.meta.insert("_secret".into(), json!("hidden"));
        catalog.save_product(&mut p).await.unwrap();
        catalog.set_object_terms(p.id, "brand", &[brand.id]).await.unwrap();

        let mut v = Product::new_variation(p.id);
        v.sku = "TEE-R".into();
        v.image_id = Some(image.id);
        v.variation_attributes.insert("color".into(), "Red".into());
        catalog.save_product(&mut v).await.unwrap();

        let settings = PorterSettings {
            custom_meta_keys: vec!["_brand_note".into(), "_empty".into()],
            custom_taxonomies: vec!["brand".into(), "not_registered".into()],
        };
        let package = exporter.export(&[p.id, 9999], &settings).await.unwrap();
        assert_eq!(package.products, 1);
        assert!(package.file_name.starts_with("product-porter-"));

        let out = dir.path().join("out");
        let records = read_package(package, &out).await;
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r["type"], "variable");
        assert_eq!(r["pricing"]["regular_price"], "19.99");
        assert_eq!(r["pricing"]["sale_price_dates_from"], "2024-01-02T03:04:05+00:00");
        assert_eq!(r["images"]["featured"], "shirt.jpg");
        assert_eq!(r["images"]["gallery"], json!(["shirt.jpg"]));
        assert_eq!(r["taxonomies"]["product_cat"], json!(["shirts"]));
        assert_eq!(r["taxonomies"]["brand"], json!(["acme"]));
        assert!(r["taxonomies"].get("not_registered").is_none());
        assert_eq!(r["meta"], json!({ "_brand_note": "hello" }));
        assert_eq!(r["variations"][0]["sku"], "TEE-R");
        assert_eq!(r["variations"][0]["image"], "shirt.jpg");
        assert_eq!(r["variations"][0]["attributes"], json!({ "color": "Red" }));

        // one file for three references
        let bundled: Vec<_> = std::fs::read_dir(out.join(archive::IMAGES_DIR)).unwrap().collect();
        assert_eq!(bundled.len(), 1);
    }
}
