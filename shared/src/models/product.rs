//! Catalog Model
//!
//! Products, variations, attributes, terms and media attachments as the
//! catalog store sees them. All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Built-in category taxonomy
pub const TAXONOMY_CATEGORY: &str = "product_cat";
/// Built-in tag taxonomy
pub const TAXONOMY_TAG: &str = "product_tag";
/// Built-in shipping class taxonomy
pub const TAXONOMY_SHIPPING_CLASS: &str = "product_shipping_class";
/// Prefix of attribute-backed taxonomies (`pa_color`, `pa_size`, ...)
pub const ATTRIBUTE_TAXONOMY_PREFIX: &str = "pa_";

/// Product type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum ProductType {
    #[default]
    Simple,
    Variable,
    Variation,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Variable => "variable",
            Self::Variation => "variation",
        }
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum ProductStatus {
    #[default]
    Draft,
    Pending,
    Private,
    Publish,
}

impl ProductStatus {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "private" => Some(Self::Private),
            "publish" => Some(Self::Publish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Publish => "publish",
        }
    }
}

/// Where the product shows up in the storefront
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum CatalogVisibility {
    #[default]
    Visible,
    Catalog,
    Search,
    Hidden,
}

impl CatalogVisibility {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "visible" => Some(Self::Visible),
            "catalog" => Some(Self::Catalog),
            "search" => Some(Self::Search),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Catalog => "catalog",
            Self::Search => "search",
            Self::Hidden => "hidden",
        }
    }
}

/// Stock status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum StockStatus {
    #[default]
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "instock" => Some(Self::InStock),
            "outofstock" => Some(Self::OutOfStock),
            "onbackorder" => Some(Self::OnBackorder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "instock",
            Self::OutOfStock => "outofstock",
            Self::OnBackorder => "onbackorder",
        }
    }
}

/// Backorder policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum BackorderPolicy {
    #[default]
    No,
    Notify,
    Yes,
}

impl BackorderPolicy {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "no" => Some(Self::No),
            "notify" => Some(Self::Notify),
            "yes" => Some(Self::Yes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Notify => "notify",
            Self::Yes => "yes",
        }
    }
}

/// Options carried by a product attribute
///
/// Taxonomy-backed attributes reference term IDs; local attributes carry
/// free-text values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum AttributeOptions {
    Terms(Vec<i64>),
    Values(Vec<String>),
}

impl Default for AttributeOptions {
    fn default() -> Self {
        Self::Values(Vec::new())
    }
}

/// Attribute attached to a product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    /// Attribute taxonomy id (0 for local attributes)
    pub id: i64,
    /// Taxonomy name (`pa_color`) or local attribute name
    pub name: String,
    pub options: AttributeOptions,
    pub position: i64,
    pub visible: bool,
    pub variation: bool,
}

impl ProductAttribute {
    pub fn is_taxonomy(&self) -> bool {
        matches!(self.options, AttributeOptions::Terms(_))
    }
}

/// Catalog entry: simple product, variable product or variation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 0 until persisted
    pub id: i64,
    /// Owning variable product (variations only)
    pub parent_id: Option<i64>,
    pub product_type: ProductType,
    pub name: String,
    pub slug: String,
    pub status: ProductStatus,
    pub catalog_visibility: CatalogVisibility,
    pub description: String,
    pub short_description: String,
    pub menu_order: i64,
    pub featured: bool,
    pub reviews_allowed: bool,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    pub downloadable: bool,
    /// -1 for unlimited
    pub download_limit: i64,
    /// -1 for never
    pub download_expiry: i64,
    pub sku: String,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub date_on_sale_from: Option<DateTime<Utc>>,
    pub date_on_sale_to: Option<DateTime<Utc>>,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub stock_status: StockStatus,
    pub backorders: BackorderPolicy,
    pub sold_individually: bool,
    pub purchase_note: String,
    pub weight: Option<Decimal>,
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub shipping_class_id: Option<i64>,
    pub image_id: Option<i64>,
    pub gallery_image_ids: Vec<i64>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub attributes: Vec<ProductAttribute>,
    /// Selected value per attribute (variations only)
    pub variation_attributes: BTreeMap<String, String>,
    pub meta: BTreeMap<String, Value>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
}

impl Product {
    /// Fresh, unsaved entry of the given type with catalog defaults applied
    pub fn new(product_type: ProductType) -> Self {
        Self {
            product_type,
            reviews_allowed: true,
            download_limit: -1,
            download_expiry: -1,
            status: match product_type {
                ProductType::Variation => ProductStatus::Publish,
                _ => ProductStatus::Draft,
            },
            ..Default::default()
        }
    }

    /// Fresh variation owned by `parent_id`
    pub fn new_variation(parent_id: i64) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new(ProductType::Variation)
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Whether the sale price applies at `now`
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        let Some(sale) = self.sale_price else {
            return false;
        };
        if let Some(regular) = self.regular_price
            && sale >= regular
        {
            return false;
        }
        if let Some(from) = self.date_on_sale_from
            && from > now
        {
            return false;
        }
        if let Some(to) = self.date_on_sale_to
            && to < now
        {
            return false;
        }
        true
    }

    /// Price a customer pays at `now`
    pub fn active_price(&self, now: DateTime<Utc>) -> Option<Decimal> {
        if self.is_on_sale(now) {
            self.sale_price
        } else {
            self.regular_price
        }
    }
}

/// Taxonomy term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Term {
    pub id: i64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
}

/// Global attribute definition backing a `pa_*` taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AttributeTaxonomy {
    pub id: i64,
    /// Taxonomy name including the `pa_` prefix
    pub name: String,
    pub label: String,
}

/// Media attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Attachment {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    /// File name inside the media store
    pub file_name: String,
    pub mime_type: String,
    pub created_at: i64,
}
