//! Product Repository
//!
//! Products and variations share one table. Category and tag assignments
//! live in `product_term` and are loaded alongside the row.

use super::{RepoError, RepoResult, term};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{
    BackorderPolicy, CatalogVisibility, Product, ProductStatus, ProductType, StockStatus,
    TAXONOMY_CATEGORY, TAXONOMY_TAG,
};
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

/// Columns written on insert and update, in bind order
const WRITE_COLUMNS: &[&str] = &[
    "parent_id",
    "product_type",
    "name",
    "slug",
    "status",
    "catalog_visibility",
    "description",
    "short_description",
    "menu_order",
    "featured",
    "reviews_allowed",
    "is_virtual",
    "downloadable",
    "download_limit",
    "download_expiry",
    "sku",
    "regular_price",
    "sale_price",
    "date_on_sale_from",
    "date_on_sale_to",
    "manage_stock",
    "stock_quantity",
    "stock_status",
    "backorders",
    "sold_individually",
    "purchase_note",
    "weight",
    "length",
    "width",
    "height",
    "shipping_class_id",
    "image_id",
    "gallery_image_ids",
    "attributes",
    "variation_attributes",
    "meta",
    "date_modified",
];

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    parent_id: Option<i64>,
    product_type: String,
    name: String,
    slug: String,
    status: String,
    catalog_visibility: String,
    description: String,
    short_description: String,
    menu_order: i64,
    featured: bool,
    reviews_allowed: bool,
    is_virtual: bool,
    downloadable: bool,
    download_limit: i64,
    download_expiry: i64,
    sku: String,
    regular_price: Option<String>,
    sale_price: Option<String>,
    date_on_sale_from: Option<i64>,
    date_on_sale_to: Option<i64>,
    manage_stock: bool,
    stock_quantity: Option<i64>,
    stock_status: String,
    backorders: String,
    sold_individually: bool,
    purchase_note: String,
    weight: Option<String>,
    length: Option<String>,
    width: Option<String>,
    height: Option<String>,
    shipping_class_id: Option<i64>,
    image_id: Option<i64>,
    gallery_image_ids: String,
    attributes: String,
    variation_attributes: String,
    meta: String,
    date_created: i64,
    date_modified: i64,
}

fn decimal(column: Option<String>) -> Option<Decimal> {
    column.and_then(|s| s.parse().ok())
}

fn timestamp(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

impl ProductRow {
    fn into_product(self, category_ids: Vec<i64>, tag_ids: Vec<i64>) -> RepoResult<Product> {
        let product_type = match self.product_type.as_str() {
            "variable" => ProductType::Variable,
            "variation" => ProductType::Variation,
            _ => ProductType::Simple,
        };
        Ok(Product {
            id: self.id,
            parent_id: self.parent_id,
            product_type,
            name: self.name,
            slug: self.slug,
            status: ProductStatus::from_key(&self.status).unwrap_or_default(),
            catalog_visibility: CatalogVisibility::from_key(&self.catalog_visibility)
                .unwrap_or_default(),
            description: self.description,
            short_description: self.short_description,
            menu_order: self.menu_order,
            featured: self.featured,
            reviews_allowed: self.reviews_allowed,
            is_virtual: self.is_virtual,
            downloadable: self.downloadable,
            download_limit: self.download_limit,
            download_expiry: self.download_expiry,
            sku: self.sku,
            regular_price: decimal(self.regular_price),
            sale_price: decimal(self.sale_price),
            date_on_sale_from: self.date_on_sale_from.and_then(timestamp),
            date_on_sale_to: self.date_on_sale_to.and_then(timestamp),
            manage_stock: self.manage_stock,
            stock_quantity: self.stock_quantity,
            stock_status: StockStatus::from_key(&self.stock_status).unwrap_or_default(),
            backorders: BackorderPolicy::from_key(&self.backorders).unwrap_or_default(),
            sold_individually: self.sold_individually,
            purchase_note: self.purchase_note,
            weight: decimal(self.weight),
            length: decimal(self.length),
            width: decimal(self.width),
            height: decimal(self.height),
            shipping_class_id: self.shipping_class_id,
            image_id: self.image_id,
            gallery_image_ids: serde_json::from_str(&self.gallery_image_ids)?,
            category_ids,
            tag_ids,
            attributes: serde_json::from_str(&self.attributes)?,
            variation_attributes: serde_json::from_str(&self.variation_attributes)?,
            meta: serde_json::from_str(&self.meta)?,
            date_created: timestamp(self.date_created),
            date_modified: timestamp(self.date_modified),
        })
    }
}

type ProductQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind `WRITE_COLUMNS` in order
fn bind_product<'q>(
    query: ProductQuery<'q>,
    p: &'q Product,
    now: i64,
) -> RepoResult<ProductQuery<'q>> {
    let text = |d: Option<Decimal>| d.map(|d| d.to_string());
    Ok(query
        .bind(p.parent_id)
        .bind(p.product_type.as_str())
        .bind(&p.name)
        .bind(&p.slug)
        .bind(p.status.as_str())
        .bind(p.catalog_visibility.as_str())
        .bind(&p.description)
        .bind(&p.short_description)
        .bind(p.menu_order)
        .bind(p.featured)
        .bind(p.reviews_allowed)
        .bind(p.is_virtual)
        .bind(p.downloadable)
        .bind(p.download_limit)
        .bind(p.download_expiry)
        .bind(&p.sku)
        .bind(text(p.regular_price))
        .bind(text(p.sale_price))
        .bind(p.date_on_sale_from.map(|d| d.timestamp_millis()))
        .bind(p.date_on_sale_to.map(|d| d.timestamp_millis()))
        .bind(p.manage_stock)
        .bind(p.stock_quantity)
        .bind(p.stock_status.as_str())
        .bind(p.backorders.as_str())
        .bind(p.sold_individually)
        .bind(&p.purchase_note)
        .bind(text(p.weight))
        .bind(text(p.length))
        .bind(text(p.width))
        .bind(text(p.height))
        .bind(p.shipping_class_id)
        .bind(p.image_id)
        .bind(serde_json::to_string(&p.gallery_image_ids)?)
        .bind(serde_json::to_string(&p.attributes)?)
        .bind(serde_json::to_string(&p.variation_attributes)?)
        .bind(serde_json::to_string(&p.meta)?)
        .bind(now))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Product>> {
    let Some(row) = sqlx::query_as::<_, ProductRow>("SELECT * FROM product WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let categories = term::object_term_ids(pool, id, TAXONOMY_CATEGORY).await?;
    let tags = term::object_term_ids(pool, id, TAXONOMY_TAG).await?;
    row.into_product(categories, tags).map(Some)
}

pub async fn find_id_by_sku(pool: &SqlitePool, sku: &str) -> RepoResult<Option<i64>> {
    if sku.is_empty() {
        return Ok(None);
    }
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM product WHERE sku = ? LIMIT 1")
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Variation ids of a product, in creation order
pub async fn child_ids(pool: &SqlitePool, parent_id: i64) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM product WHERE parent_id = ? ORDER BY menu_order, id",
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Insert or update a product together with its category and tag
/// assignments. Returns the product id.
///
/// A SKU already used by another product fails with [`RepoError::Duplicate`].
pub async fn save(pool: &SqlitePool, product: &Product) -> RepoResult<i64> {
    let now = Utc::now().timestamp_millis();
    let mut tx = pool.begin().await?;

    let id = if product.is_new() {
        let placeholders = vec!["?"; WRITE_COLUMNS.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO product ({}, date_created) VALUES ({placeholders}) RETURNING id",
            WRITE_COLUMNS.join(", ")
        );
        let query = bind_product(sqlx::query(&sql), product, now)?.bind(now);
        let row = query.fetch_one(&mut *tx).await?;
        sqlx::Row::try_get::<i64, _>(&row, "id")?
    } else {
        let assignments = WRITE_COLUMNS
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE product SET {assignments} WHERE id = ?");
        let query = bind_product(sqlx::query(&sql), product, now)?.bind(product.id);
        let rows = query.execute(&mut *tx).await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Product {} not found", product.id)));
        }
        product.id
    };

    term::replace_object_terms(&mut tx, id, TAXONOMY_CATEGORY, &product.category_ids).await?;
    term::replace_object_terms(&mut tx, id, TAXONOMY_TAG, &product.tag_ids).await?;

    tx.commit().await?;
    Ok(id)
}

/// Lookup row derived from a product
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LookupRow {
    pub product_id: i64,
    pub sku: String,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub onsale: bool,
    pub stock_quantity: Option<i64>,
    pub stock_status: String,
}

pub async fn upsert_lookup(pool: &SqlitePool, row: &LookupRow) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO product_lookup (product_id, sku, min_price, max_price, onsale, stock_quantity, stock_status) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(product_id) DO UPDATE SET sku = excluded.sku, min_price = excluded.min_price, \
         max_price = excluded.max_price, onsale = excluded.onsale, \
         stock_quantity = excluded.stock_quantity, stock_status = excluded.stock_status",
    )
    .bind(row.product_id)
    .bind(&row.sku)
    .bind(&row.min_price)
    .bind(&row.max_price)
    .bind(row.onsale)
    .bind(row.stock_quantity)
    .bind(&row.stock_status)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_lookup(pool: &SqlitePool, product_id: i64) -> RepoResult<Option<LookupRow>> {
    let row = sqlx::query_as::<_, LookupRow>("SELECT * FROM product_lookup WHERE product_id = ?")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}
