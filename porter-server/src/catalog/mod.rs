//! Catalog Store
//!
//! The import and export pipelines talk to the catalog only through
//! [`CatalogStore`]. [`SqliteCatalog`] is the production implementation
//! (SQLite rows plus a media directory on disk).

mod sqlite;

pub use sqlite::SqliteCatalog;
pub(crate) use sqlite::split_extension;

use crate::db::repository::RepoError;
use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::{Attachment, AttributeTaxonomy, Product, Term};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("SKU already in use: {0}")]
    DuplicateSku(String),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Term '{slug}' already exists in {taxonomy}")]
    TermExists { taxonomy: String, slug: String },

    #[error("Taxonomy not registered: {0}")]
    TaxonomyNotRegistered(String),

    #[error("Attachment {0} not found")]
    AttachmentNotFound(i64),

    #[error("Media store error: {0}")]
    MediaStore(String),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::DuplicateSku(sku) => {
                AppError::with_message(ErrorCode::DuplicateSku, message).with_detail("sku", sku)
            }
            CatalogError::ProductNotFound(id) => {
                AppError::with_message(ErrorCode::ProductNotFound, message).with_detail("id", id)
            }
            CatalogError::TermExists { .. } => AppError::with_message(ErrorCode::TermExists, message),
            CatalogError::TaxonomyNotRegistered(_) => {
                AppError::with_message(ErrorCode::TaxonomyNotRegistered, message)
            }
            CatalogError::AttachmentNotFound(_) => {
                AppError::with_message(ErrorCode::AttachmentNotFound, message)
            }
            CatalogError::MediaStore(_) => AppError::with_message(ErrorCode::MediaStoreFailed, message),
            CatalogError::Repo(e) => e.into(),
        }
    }
}

/// Catalog persistence used by the import and export pipelines
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- products ----

    async fn find_product(&self, id: i64) -> CatalogResult<Option<Product>>;

    /// Product id holding `sku`; always `None` for an empty SKU
    async fn find_product_id_by_sku(&self, sku: &str) -> CatalogResult<Option<i64>>;

    /// Insert (assigning `product.id`) or update. A non-empty SKU held by a
    /// different product fails with [`CatalogError::DuplicateSku`].
    async fn save_product(&self, product: &mut Product) -> CatalogResult<i64>;

    /// Variations of a product, ordered by menu order then id
    async fn children(&self, parent_id: i64) -> CatalogResult<Vec<Product>>;

    // ---- taxonomies and terms ----

    /// Replace the object's terms in one taxonomy
    async fn set_object_terms(
        &self,
        object_id: i64,
        taxonomy: &str,
        term_ids: &[i64],
    ) -> CatalogResult<()>;

    async fn object_terms(&self, object_id: i64, taxonomy: &str) -> CatalogResult<Vec<Term>>;

    async fn taxonomy_exists(&self, taxonomy: &str) -> CatalogResult<bool>;

    async fn register_taxonomy(&self, taxonomy: &str) -> CatalogResult<()>;

    async fn find_term(&self, id: i64) -> CatalogResult<Option<Term>>;

    async fn find_term_by_slug(&self, taxonomy: &str, slug: &str) -> CatalogResult<Option<Term>>;

    /// Fails with [`CatalogError::TermExists`] when the slug is taken
    async fn insert_term(&self, taxonomy: &str, name: &str, slug: &str) -> CatalogResult<Term>;

    async fn find_attribute_taxonomy(&self, name: &str) -> CatalogResult<Option<AttributeTaxonomy>>;

    /// Get-or-create a `pa_*` attribute taxonomy, returning its id
    async fn ensure_attribute_taxonomy(&self, name: &str, label: &str) -> CatalogResult<i64>;

    // ---- media ----

    async fn find_attachment(&self, id: i64) -> CatalogResult<Option<Attachment>>;

    /// Copy `source` into the media store and record it as an attachment
    async fn sideload_attachment(
        &self,
        source: &Path,
        file_name: &str,
        parent_id: Option<i64>,
    ) -> CatalogResult<Attachment>;

    async fn set_attachment_parent(&self, id: i64, parent_id: i64) -> CatalogResult<()>;

    /// Backing file of an attachment
    async fn attachment_path(&self, id: i64) -> CatalogResult<Option<PathBuf>>;

    // ---- derived data ----

    /// Recompute the lookup row of a product
    async fn refresh_derived_data(&self, product_id: i64) -> CatalogResult<()>;

    /// Recompute a variable product's stock status and price range from its
    /// variations
    async fn sync_variable_product(&self, parent_id: i64) -> CatalogResult<()>;
}
