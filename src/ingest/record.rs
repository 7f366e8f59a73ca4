// src/ingest/record.rs
// =============================================================================
// Turns one product hit of the payload into a flat row.
//
// Steps, in order:
// 1. preprocess: lift a few deeply nested values to top-level keys and drop
//    keys known to be useless
// 2. RawRecord:  decode the hit into a typed structure where every field is
//    optional and a value of the wrong JSON type counts as absent
// 3. project:    derive the computed columns and produce a ProjectedRecord,
//    which has exactly the canonical columns
//
// Rust concepts:
// - serde attributes: rename, default and deserialize_with
// - Option<T>: Every field of the site's payload may be missing
// =============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

// Nested values lifted to a top-level key: (path, new key)
pub const NESTED_FIELDS: &[(&[&str], &str)] = &[(
    &["delivery_offers", "min_fee", "as_float"],
    "delivery_offers_min_fee",
)];

// Keys dropped before decoding
pub const PRUNED_KEYS: &[&str] = &[
    "detail_price",
    "is_seller_b2b",
    "is_mmf",
    "has_3x_payment",
    "market",
    "model_markets",
    "is_sample",
    "has_sample",
    "image_fullpath",
    "brand_image_fullpath",
    "url",
    "default_title",
    "legacy_unit",
    "attribute_facet",
    "top_attributes",
    "catalog_attribute",
    "reranking_positions",
    "experiences",
    "score",
    "me_id",
    "energy_efficiency",
    "seller_id",
    "brand_id",
    "category_slug",
];

// The canonical columns of the dataset, in order
pub const COLUMNS: &[&str] = &[
    "objectID",
    "model_id",
    "article_id",
    "title",
    "price",
    "vat_rate",
    "ecopart",
    "discount",
    "delivery_offers_min_fee",
    "ranking_score_v1",
    "seller_name",
    "seller_country_id",
    "brand_name",
    "rating",
    "rating_count",
    "unit_type",
    "unit_price",
    "min_quantity",
    "models_count",
    "categories.l0",
    "categories.l1",
    "categories.l2",
    "categories.last",
    "n_categories.l0",
    "n_categories.l1",
    "n_categories.l2",
    "n_thumbnails",
    "n_attributes",
    "n_topsales",
    "has_brand_image",
    "has_free_delivery",
    "has_relay_delivery",
    "has_1day_delivery",
    "on_sale",
    "indexable",
];

// Lifts nested values and removes pruned keys, in place
pub fn preprocess(hit: &mut Map<String, Value>) {
    for (path, key) in NESTED_FIELDS {
        let value = lookup(hit, path).filter(|v| !v.is_null()).cloned();
        if let Some(value) = value {
            hit.insert(key.to_string(), value);
        }
    }

    // The parents of lifted values are not needed any more
    for (path, _) in NESTED_FIELDS {
        hit.remove(path[0]);
    }

    for key in PRUNED_KEYS {
        hit.remove(*key);
    }
}

fn lookup<'a>(hit: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(hit.get(*first)?, |node, key| node.get(*key))
}

// A product hit as found in the payload
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "objectID", default, deserialize_with = "lenient_string")]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub model_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub article_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vat_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ecopart: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub discount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delivery_offers_min_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ranking_score_v1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub seller_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub seller_country_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rating_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub min_quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub models_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub categories: Categories,
    #[serde(default, deserialize_with = "entry_count")]
    pub thumbnails: usize,
    #[serde(default, deserialize_with = "entry_count")]
    pub catalog_attribute_facet: usize,
    #[serde(default, deserialize_with = "lenient")]
    pub banner: Banner,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_image_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_free_delivery: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_relay_delivery: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_1day_delivery: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub on_sale: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub indexable: Option<bool>,
}

// Category names per hierarchy level; a product can sit in several
#[derive(Debug, Default, Deserialize)]
pub struct Categories {
    #[serde(default, deserialize_with = "string_list")]
    pub l0: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub l1: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub l2: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub last: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Banner {
    #[serde(default, deserialize_with = "string_list")]
    pub categories: Vec<String>,
}

impl RawRecord {
    // Decodes one hit; None if the hit is not a JSON object
    pub fn from_hit(hit: Value) -> Option<RawRecord> {
        let Value::Object(mut map) = hit else {
            return None;
        };
        preprocess(&mut map);
        serde_json::from_value(Value::Object(map)).ok()
    }

    // Flattens the record to the canonical columns
    //
    // Returns None when the record has no objectID, since it could not be
    // deduplicated.
    pub fn project(self) -> Option<ProjectedRecord> {
        let object_id = self.object_id.filter(|id| !id.is_empty())?;
        let categories = self.categories;

        Some(ProjectedRecord {
            object_id,
            model_id: self.model_id,
            article_id: self.article_id,
            title: self.title.map(|t| t.trim().to_string()),
            price: self.price,
            vat_rate: self.vat_rate,
            ecopart: self.ecopart,
            discount: self.discount,
            delivery_offers_min_fee: self.delivery_offers_min_fee,
            ranking_score_v1: self.ranking_score_v1,
            seller_name: self.seller_name,
            seller_country_id: self.seller_country_id,
            brand_name: self.brand_name,
            rating: self.rating,
            rating_count: self.rating_count,
            unit_type: self.unit_type,
            unit_price: self.unit_price,
            min_quantity: self.min_quantity,
            models_count: self.models_count,
            category_l0: first_entry(&categories.l0),
            category_l1: first_entry(&categories.l1),
            category_l2: first_entry(&categories.l2),
            category_last: first_entry(&categories.last),
            n_categories_l0: distinct_count(&categories.l0),
            n_categories_l1: distinct_count(&categories.l1),
            n_categories_l2: distinct_count(&categories.l2),
            n_thumbnails: self.thumbnails as u64,
            n_attributes: self.catalog_attribute_facet as u64,
            n_topsales: self
                .banner
                .categories
                .iter()
                .filter(|c| c.contains("topSales"))
                .count() as u64,
            has_brand_image: self
                .brand_image_path
                .is_some_and(|path| !path.is_empty()),
            has_free_delivery: self.has_free_delivery,
            has_relay_delivery: self.has_relay_delivery,
            has_1day_delivery: self.has_1day_delivery,
            on_sale: self.on_sale,
            indexable: self.indexable,
        })
    }
}

fn first_entry(values: &[String]) -> Option<String> {
    values.first().map(|v| v.trim().to_string())
}

fn distinct_count(values: &[String]) -> u64 {
    values.iter().collect::<HashSet<_>>().len() as u64
}

// One row of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub model_id: Option<i64>,
    pub article_id: Option<i64>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub vat_rate: Option<f64>,
    pub ecopart: Option<f64>,
    pub discount: Option<f64>,
    pub delivery_offers_min_fee: Option<f64>,
    pub ranking_score_v1: Option<f64>,
    pub seller_name: Option<String>,
    pub seller_country_id: Option<i64>,
    pub brand_name: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub unit_type: Option<String>,
    pub unit_price: Option<f64>,
    pub min_quantity: Option<i64>,
    pub models_count: Option<i64>,
    #[serde(rename = "categories.l0")]
    pub category_l0: Option<String>,
    #[serde(rename = "categories.l1")]
    pub category_l1: Option<String>,
    #[serde(rename = "categories.l2")]
    pub category_l2: Option<String>,
    #[serde(rename = "categories.last")]
    pub category_last: Option<String>,
    #[serde(rename = "n_categories.l0")]
    pub n_categories_l0: u64,
    #[serde(rename = "n_categories.l1")]
    pub n_categories_l1: u64,
    #[serde(rename = "n_categories.l2")]
    pub n_categories_l2: u64,
    pub n_thumbnails: u64,
    pub n_attributes: u64,
    pub n_topsales: u64,
    pub has_brand_image: bool,
    pub has_free_delivery: Option<bool>,
    pub has_relay_delivery: Option<bool>,
    pub has_1day_delivery: Option<bool>,
    pub on_sale: Option<bool>,
    pub indexable: Option<bool>,
}

// A single value of a row, by column kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<&'a str>),
    Bool(Option<bool>),
}

impl ProjectedRecord {
    // Looks a column up by its canonical name
    pub fn cell(&self, column: &str) -> Option<Cell<'_>> {
        let count = |n: u64| Cell::Int(Some(n as i64));
        let cell = match column {
            "objectID" => Cell::Text(Some(&self.object_id)),
            "model_id" => Cell::Int(self.model_id),
            "article_id" => Cell::Int(self.article_id),
            "title" => Cell::Text(self.title.as_deref()),
            "price" => Cell::Float(self.price),
            "vat_rate" => Cell::Float(self.vat_rate),
            "ecopart" => Cell::Float(self.ecopart),
            "discount" => Cell::Float(self.discount),
            "delivery_offers_min_fee" => Cell::Float(self.delivery_offers_min_fee),
            "ranking_score_v1" => Cell::Float(self.ranking_score_v1),
            "seller_name" => Cell::Text(self.seller_name.as_deref()),
            "seller_country_id" => Cell::Int(self.seller_country_id),
            "brand_name" => Cell::Text(self.brand_name.as_deref()),
            "rating" => Cell::Float(self.rating),
            "rating_count" => Cell::Int(self.rating_count),
            "unit_type" => Cell::Text(self.unit_type.as_deref()),
            "unit_price" => Cell::Float(self.unit_price),
            "min_quantity" => Cell::Int(self.min_quantity),
            "models_count" => Cell::Int(self.models_count),
            "categories.l0" => Cell::Text(self.category_l0.as_deref()),
            "categories.l1" => Cell::Text(self.category_l1.as_deref()),
            "categories.l2" => Cell::Text(self.category_l2.as_deref()),
            "categories.last" => Cell::Text(self.category_last.as_deref()),
            "n_categories.l0" => count(self.n_categories_l0),
            "n_categories.l1" => count(self.n_categories_l1),
            "n_categories.l2" => count(self.n_categories_l2),
            "n_thumbnails" => count(self.n_thumbnails),
            "n_attributes" => count(self.n_attributes),
            "n_topsales" => count(self.n_topsales),
            "has_brand_image" => Cell::Bool(Some(self.has_brand_image)),
            "has_free_delivery" => Cell::Bool(self.has_free_delivery),
            "has_relay_delivery" => Cell::Bool(self.has_relay_delivery),
            "has_1day_delivery" => Cell::Bool(self.has_1day_delivery),
            "on_sale" => Cell::Bool(self.on_sale),
            "indexable" => Cell::Bool(self.indexable),
            _ => return None,
        };
        Some(cell)
    }
}

// -----------------------------------------------------------------------------
// Lenient decoders: a value of an unexpected type decodes as "absent"
// -----------------------------------------------------------------------------

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    })
}

// A list of strings; a lone string is a list of one
fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

// Number of entries of an array or object, 0 for anything else
fn entry_count<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.len(),
        Value::Object(entries) => entries.len(),
        _ => 0,
    })
}

// A nested structure, or its default when it has an unexpected shape
fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_hit() -> Value {
        json!({
            "objectID": "A1",
            "model_id": 42,
            "article_id": "1001",
            "title": "  Teak table  ",
            "price": 199.9,
            "delivery_offers": { "min_fee": { "as_float": 4.9 }, "min_time_fee": { "as_float": 1.0 } },
            "prices": { "per_item": { "unit": "m2" } },
            "seller_name": "Jardin & Co",
            "rating_count": 12,
            "categories": {
                "l0": [" Garden ", "Garden", "Outdoor"],
                "l1": ["Tables"],
                "l2": "Teak tables",
                "last": ["Teak tables"]
            },
            "thumbnails": ["a.jpg", "b.jpg", "c.jpg"],
            "catalog_attribute_facet": { "color": "brown", "material": "teak" },
            "banner": { "categories": ["topSales_garden", "new", "topSales_tables"] },
            "brand_image_path": "/brands/jc.png",
            "has_free_delivery": true,
            "on_sale": "false",
            "url": "/p/teak-table",
            "score": 3
        })
    }

    #[test]
    fn test_preprocess_lifts_and_prunes() {
        let Value::Object(mut map) = sample_hit() else {
            panic!("sample hit is an object");
        };

        preprocess(&mut map);

        assert_eq!(map["delivery_offers_min_fee"], json!(4.9));
        assert!(!map.contains_key("delivery_offers"));
        assert!(!map.contains_key("url"));
        assert!(!map.contains_key("score"));
        assert!(map.contains_key("prices"));
    }

    #[test]
    fn test_project_derives_columns() {
        let record = RawRecord::from_hit(sample_hit())
            .and_then(RawRecord::project)
            .expect("record should project");

        assert_eq!(record.object_id, "A1");
        assert_eq!(record.model_id, Some(42));
        assert_eq!(record.article_id, Some(1001));
        assert_eq!(record.title.as_deref(), Some("Teak table"));
        assert_eq!(record.delivery_offers_min_fee, Some(4.9));
        assert_eq!(record.category_l0.as_deref(), Some("Garden"));
        assert_eq!(record.category_l2.as_deref(), Some("Teak tables"));
        assert_eq!(record.n_categories_l0, 3);
        assert_eq!(record.n_categories_l1, 1);
        assert_eq!(record.n_thumbnails, 3);
        assert_eq!(record.n_attributes, 2);
        assert_eq!(record.n_topsales, 2);
        assert!(record.has_brand_image);
        assert_eq!(record.has_free_delivery, Some(true));
        assert_eq!(record.on_sale, Some(false));
        assert_eq!(record.indexable, None);
    }

    #[test]
    fn test_missing_fields_are_null() {
        let record = RawRecord::from_hit(json!({ "objectID": 7 }))
            .and_then(RawRecord::project)
            .unwrap();

        assert_eq!(record.object_id, "7");
        assert_eq!(record.price, None);
        assert_eq!(record.category_l0, None);
        assert_eq!(record.n_thumbnails, 0);
        assert!(!record.has_brand_image);
    }

    #[test]
    fn test_wrong_types_are_treated_as_absent() {
        let record = RawRecord::from_hit(json!({
            "objectID": "B2",
            "price": { "amount": 10 },
            "categories": "not an object",
            "thumbnails": 5,
            "brand_image_path": ""
        }))
        .and_then(RawRecord::project)
        .unwrap();

        assert_eq!(record.price, None);
        assert_eq!(record.category_l0, None);
        assert_eq!(record.n_thumbnails, 0);
        assert!(!record.has_brand_image);
    }

    #[test]
    fn test_record_without_object_id_is_dropped() {
        let raw = RawRecord::from_hit(json!({ "title": "orphan" })).unwrap();
        assert!(raw.project().is_none());
        assert!(RawRecord::from_hit(json!("not a hit")).is_none());
    }

    #[test]
    fn test_every_column_has_a_cell() {
        let record = RawRecord::from_hit(sample_hit())
            .and_then(RawRecord::project)
            .unwrap();
        for column in COLUMNS {
            assert!(record.cell(column).is_some(), "no cell for {}", column);
        }
        assert_eq!(record.cell("n_topsales"), Some(Cell::Int(Some(2))));
        assert_eq!(record.cell("categories.l3"), None);
    }

    #[test]
    fn test_serialized_names_match_columns() {
        let record = RawRecord::from_hit(sample_hit())
            .and_then(RawRecord::project)
            .unwrap();
        let Value::Object(map) = serde_json::to_value(&record).unwrap() else {
            panic!("record serializes to an object");
        };
        let names: Vec<&str> = map.keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = COLUMNS.to_vec();
        expected.sort();
        let mut names_sorted = names.clone();
        names_sorted.sort();
        assert_eq!(names_sorted, expected);
    }
}
