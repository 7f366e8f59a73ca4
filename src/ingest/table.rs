// src/ingest/table.rs
// =============================================================================
// A small column-typed table of projected records.
//
// Chunk outputs and the final dataset are both Tables. A Table is always:
// - deduplicated by objectID (the first occurrence wins)
// - described by a schema listing the canonical columns in order, with the
//   narrowest integer width that holds each integer column
//
// Tables are stored as JSON and written atomically.
// =============================================================================

use super::record::{Cell, ProjectedRecord, COLUMNS};
use crate::config::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

// Storage width of an integer column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntWidth {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl IntWidth {
    // Candidates, narrowest first
    const ORDER: [IntWidth; 8] = [
        IntWidth::U8,
        IntWidth::I8,
        IntWidth::U16,
        IntWidth::I16,
        IntWidth::U32,
        IntWidth::I32,
        IntWidth::U64,
        IntWidth::I64,
    ];

    fn bounds(self) -> (i128, i128) {
        match self {
            IntWidth::U8 => (0, u8::MAX as i128),
            IntWidth::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntWidth::U16 => (0, u16::MAX as i128),
            IntWidth::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntWidth::U32 => (0, u32::MAX as i128),
            IntWidth::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntWidth::U64 => (0, u64::MAX as i128),
            IntWidth::I64 => (i64::MIN as i128, i64::MAX as i128),
        }
    }

    /// The narrowest width holding every value in `min..=max`
    pub fn fit(min: i64, max: i64) -> IntWidth {
        IntWidth::ORDER
            .into_iter()
            .find(|width| {
                let (lo, hi) = width.bounds();
                lo <= min as i128 && max as i128 <= hi
            })
            .unwrap_or(IntWidth::I64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int(IntWidth),
    Float,
    Text,
    Categorical,
    Bool,
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntWidth::U8 => "u8",
            IntWidth::I8 => "i8",
            IntWidth::U16 => "u16",
            IntWidth::I16 => "i16",
            IntWidth::U32 => "u32",
            IntWidth::I32 => "i32",
            IntWidth::U64 => "u64",
            IntWidth::I64 => "i64",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int(width) => write!(f, "{}", width),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Categorical => write!(f, "category"),
            ColumnType::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<ProjectedRecord>,
}

impl Table {
    // Builds a table, dropping repeated objectIDs
    pub fn new(rows: Vec<ProjectedRecord>) -> Self {
        let rows = dedup_by_object_id(rows);
        Table {
            columns: infer_schema(&rows),
            rows,
        }
    }

    // Concatenates tables in order and deduplicates across them
    pub fn concat(tables: Vec<Table>) -> Self {
        Table::new(tables.into_iter().flat_map(|t| t.rows).collect())
    }

    // Types low-cardinality text columns as categorical
    //
    // A text column qualifies when it has fewer distinct values than half the
    // number of rows.
    pub fn with_categoricals(mut self) -> Self {
        let threshold = self.rows.len() as f64 * 0.5;
        for column in &mut self.columns {
            if column.kind != ColumnType::Text {
                continue;
            }
            let distinct: HashSet<&str> = self
                .rows
                .iter()
                .filter_map(|row| match row.cell(&column.name) {
                    Some(Cell::Text(Some(value))) => Some(value),
                    _ => None,
                })
                .collect();
            if (distinct.len() as f64) < threshold {
                column.kind = ColumnType::Categorical;
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn load(path: &Path) -> Result<Table> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to decode table {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        write_atomic(path, &bytes)
    }
}

fn dedup_by_object_id(rows: Vec<ProjectedRecord>) -> Vec<ProjectedRecord> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.object_id.clone()))
        .collect()
}

// One ColumnInfo per canonical column
fn infer_schema(rows: &[ProjectedRecord]) -> Vec<ColumnInfo> {
    COLUMNS
        .iter()
        .map(|name| ColumnInfo {
            name: name.to_string(),
            kind: column_type(rows, name),
        })
        .collect()
}

fn column_type(rows: &[ProjectedRecord], name: &str) -> ColumnType {
    // The column kind is fixed per name; a probe record tells which one
    match ProjectedRecord::probe().cell(name) {
        Some(Cell::Int(_)) => {
            let values = rows.iter().filter_map(|row| match row.cell(name) {
                Some(Cell::Int(value)) => value,
                _ => None,
            });
            let (min, max) = values.fold((0, 0), |(lo, hi), v| (lo.min(v), hi.max(v)));
            ColumnType::Int(IntWidth::fit(min, max))
        }
        Some(Cell::Float(_)) => ColumnType::Float,
        Some(Cell::Bool(_)) => ColumnType::Bool,
        _ => ColumnType::Text,
    }
}

impl ProjectedRecord {
    // An empty record, used to read the kind of each column
    fn probe() -> ProjectedRecord {
        ProjectedRecord {
            object_id: String::new(),
            model_id: None,
            article_id: None,
            title: None,
            price: None,
            vat_rate: None,
            ecopart: None,
            discount: None,
            delivery_offers_min_fee: None,
            ranking_score_v1: None,
            seller_name: None,
            seller_country_id: None,
            brand_name: None,
            rating: None,
            rating_count: None,
            unit_type: None,
            unit_price: None,
            min_quantity: None,
            models_count: None,
            category_l0: None,
            category_l1: None,
            category_l2: None,
            category_last: None,
            n_categories_l0: 0,
            n_categories_l1: 0,
            n_categories_l2: 0,
            n_thumbnails: 0,
            n_attributes: 0,
            n_topsales: 0,
            has_brand_image: false,
            has_free_delivery: None,
            has_relay_delivery: None,
            has_1day_delivery: None,
            on_sale: None,
            indexable: None,
        }
    }
}
