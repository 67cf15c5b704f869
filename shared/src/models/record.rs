//! Package record schema
//!
//! One [`ProductRecord`] per entry in `products.json`. Records come from
//! untrusted packages, so every field deserializes leniently: a missing or
//! wrongly-typed value becomes the field's empty state instead of failing
//! the whole record. Defaults for enum-like fields are applied by the
//! importer, which sees `None` for "absent".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lenient field decoders
///
/// Each function accepts any JSON value and coerces it; none of them fail.
pub mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if b { "1".into() } else { String::new() }),
            _ => None,
        }
    }

    /// Truthiness of a loosely-typed flag.
    pub fn truthy(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null => false,
        }
    }

    fn integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(truthy(&Value::deserialize(d)?))
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(integer(&Value::deserialize(d)?))
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
            Value::Object(map) => map.into_iter().filter_map(|(_, v)| scalar_to_string(v)).collect(),
            other => scalar_to_string(other).into_iter().collect(),
        })
    }

    /// Nested object; anything that does not decode becomes `T::default()`.
    pub fn object<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => T::default(),
        })
    }

    /// List of nested objects; entries that are not objects are dropped.
    pub fn object_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match Value::deserialize(d)? {
            Value::Array(items) => items,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    pub fn list_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Vec<String>>, D::Error> {
        let Value::Object(map) = Value::deserialize(d)? else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .map(|(key, value)| {
                let list = match value {
                    Value::Array(items) => {
                        items.into_iter().filter_map(scalar_to_string).collect()
                    }
                    other => scalar_to_string(other).into_iter().collect(),
                };
                (key, list)
            })
            .collect())
    }

    pub fn string_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        let Value::Object(map) = Value::deserialize(d)? else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key, v)))
            .collect())
    }

    pub fn value_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        })
    }
}

/// Pricing and inventory block of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub regular_price: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sale_price: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sale_price_dates_from: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sale_price_dates_to: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub manage_stock: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub stock_quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stock_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub backorders: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub sold_individually: bool,
    #[serde(default, deserialize_with = "lenient::string")]
    pub purchase_note: Option<String>,
}

/// Shipping block of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub height: Option<String>,
    /// Shipping class slug
    #[serde(default, deserialize_with = "lenient::string")]
    pub shipping_class: Option<String>,
}

/// Image references by archive file name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagesRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub featured: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub gallery: Vec<String>,
}

/// Attribute entry of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(default, deserialize_with = "lenient::int")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_taxonomy: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub visible: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub variation: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub position: Option<i64>,
    /// Term slugs for taxonomy attributes, literal values otherwise
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub options: Vec<String>,
}

/// Variation price block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationPriceRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub regular_price: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sale_price: Option<String>,
}

/// Variation dimensions block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionsRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub height: Option<String>,
}

/// Variation entry of a variable product record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationRecord {
    #[serde(default, deserialize_with = "lenient::int")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub price: VariationPriceRecord,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub manage_stock: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub stock_quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stock_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub backorders: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub dimensions: DimensionsRecord,
    /// Archive image file name
    #[serde(default, deserialize_with = "lenient::string")]
    pub image: Option<String>,
    /// Attribute name → selected value
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub downloadable: bool,
    #[serde(default, rename = "virtual", deserialize_with = "lenient::flag")]
    pub is_virtual: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub download_limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub download_expiry: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub purchase_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::string")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::string")]
    pub date_modified: Option<String>,
}

/// One product in `products.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Source catalog id (informational only)
    #[serde(default, deserialize_with = "lenient::int")]
    pub id: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub catalog_visibility: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub featured: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub reviews_allowed: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub menu_order: Option<i64>,
    #[serde(default, rename = "virtual", deserialize_with = "lenient::flag")]
    pub is_virtual: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub downloadable: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub download_limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub download_expiry: Option<i64>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub pricing: PricingRecord,
    #[serde(default, deserialize_with = "lenient::object")]
    pub shipping: ShippingRecord,
    #[serde(default, deserialize_with = "lenient::object")]
    pub images: ImagesRecord,
    /// Taxonomy → term slugs
    #[serde(default, deserialize_with = "lenient::list_map")]
    pub taxonomies: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "lenient::object_list")]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default, deserialize_with = "lenient::value_map")]
    pub meta: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::object_list")]
    pub variations: Vec<VariationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::string")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::string")]
    pub date_modified: Option<String>,
}

impl ProductRecord {
    /// Decode one manifest entry. Returns `None` when the entry is not a
    /// JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
