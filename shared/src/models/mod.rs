//! Data models
//!
//! Catalog entities, the package record schema and porter settings.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

pub mod product;
pub mod record;
pub mod settings;

// Re-exports
pub use product::*;
pub use record::{
    AttributeRecord, DimensionsRecord, ImagesRecord, PricingRecord, ProductRecord,
    ShippingRecord, VariationPriceRecord, VariationRecord,
};
pub use settings::*;
