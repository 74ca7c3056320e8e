//! FILENAME: core/pivot-engine/src/grouping.rs
//! Grouping & Key Encoding - Working rows into row × column buckets.
//!
//! Each axis turns a row into an ordered tuple of bucket labels, one per
//! axis field, encoded as a JSON array string. An axis with no fields puts
//! every row under the single key `Total`.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use records::{bucket_value, label_or_blank, Granularity};

use crate::accessor::ValueAccessor;
use crate::definition::{PivotAxisField, PivotConfig};
use crate::expand::WorkingRecord;
use crate::rules::FieldRules;

/// Key used by an axis without fields.
pub const TOTAL_KEY: &str = "Total";

/// Decoded composite key. Most pivots have a handful of axis fields.
pub type KeyParts = SmallVec<[String; 4]>;

/// rowKey → colKey → rows.
pub type Buckets<'a> = BTreeMap<String, BTreeMap<String, Vec<WorkingRecord<'a>>>>;

// ============================================================================
// KEY ENCODING
// ============================================================================

pub fn encode_key(parts: &[String]) -> String {
    if parts.is_empty() {
        return TOTAL_KEY.to_string();
    }
    serde_json::to_string(parts).unwrap_or_else(|_| parts.join("|"))
}

/// Inverse of `encode_key`. Keys that are not JSON string arrays are split on `|`.
pub fn decode_key(key: &str) -> KeyParts {
    match serde_json::from_str::<Vec<String>>(key) {
        Ok(parts) => parts.into_iter().collect(),
        Err(_) => key.split('|').map(str::to_string).collect(),
    }
}

// ============================================================================
// AXIS LABELING
// ============================================================================

/// Produces bucket labels for one axis.
pub struct AxisLabeler<'f> {
    fields: &'f [PivotAxisField],
    /// Bucketing per field; None keeps the literal value.
    groupings: Vec<Option<Granularity>>,
}

impl<'f> AxisLabeler<'f> {
    pub fn new(fields: &'f [PivotAxisField], rules: &FieldRules) -> Self {
        let groupings = fields
            .iter()
            .map(|f| {
                f.date_grouping
                    .filter(|g| *g != Granularity::Day && rules.is_date_field(&f.field))
            })
            .collect();
        AxisLabeler { fields, groupings }
    }

    pub fn labels<'a>(&self, row: WorkingRecord<'a>, accessor: &ValueAccessor<'_, 'a>) -> KeyParts {
        self.fields
            .iter()
            .zip(&self.groupings)
            .map(|(field, grouping)| {
                let value = accessor.resolve(row, &field.field);
                match grouping {
                    Some(g) => bucket_value(value, *g),
                    None => label_or_blank(value),
                }
            })
            .collect()
    }

    pub fn key<'a>(&self, row: WorkingRecord<'a>, accessor: &ValueAccessor<'_, 'a>) -> String {
        encode_key(&self.labels(row, accessor))
    }
}

/// Partitions rows by (row key, column key). Rows keep their input order
/// inside a bucket; only populated buckets exist.
pub fn group_records<'a>(
    rows: &[WorkingRecord<'a>],
    config: &PivotConfig,
    accessor: &ValueAccessor<'_, 'a>,
) -> Buckets<'a> {
    let row_axis = AxisLabeler::new(&config.rows, accessor.rules());
    let col_axis = AxisLabeler::new(&config.columns, accessor.rules());

    let mut buckets: Buckets<'a> = BTreeMap::new();
    for &row in rows {
        let row_key = row_axis.key(row, accessor);
        let col_key = col_axis.key(row, accessor);
        buckets
            .entry(row_key)
            .or_default()
            .entry(col_key)
            .or_default()
            .push(row);
    }
    buckets
}
