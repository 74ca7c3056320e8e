//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot Result - What the presentation layer renders.
//!
//! Created fresh on every recomputation and never mutated afterwards.
//! Maps are ordered so two runs over the same input serialize identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grouping::{decode_key, KeyParts};

/// valueKey → number.
pub type ValueMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResult {
    /// Encoded row keys in display order.
    pub row_keys: Vec<String>,

    /// Encoded column keys in display order.
    pub col_keys: Vec<String>,

    /// Value keys in declaration order.
    pub value_keys: Vec<String>,

    /// rowKey → colKey → valueKey → number. Only populated cells exist.
    pub data: BTreeMap<String, BTreeMap<String, ValueMap>>,

    /// Row totals: rowKey → valueKey → number.
    pub totals: BTreeMap<String, ValueMap>,

    /// Column totals: colKey → valueKey → number.
    pub col_totals: BTreeMap<String, ValueMap>,

    pub grand_total: ValueMap,
}

impl PivotResult {
    pub fn cell(&self, row_key: &str, col_key: &str, value_key: &str) -> Option<f64> {
        self.data.get(row_key)?.get(col_key)?.get(value_key).copied()
    }

    pub fn row_total(&self, row_key: &str, value_key: &str) -> Option<f64> {
        self.totals.get(row_key)?.get(value_key).copied()
    }

    pub fn col_total(&self, col_key: &str, value_key: &str) -> Option<f64> {
        self.col_totals.get(col_key)?.get(value_key).copied()
    }

    pub fn grand(&self, value_key: &str) -> f64 {
        self.grand_total.get(value_key).copied().unwrap_or(0.0)
    }

    /// No populated cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decoded labels of every row key, in display order.
    pub fn row_labels(&self) -> Vec<KeyParts> {
        self.row_keys.iter().map(|k| decode_key(k)).collect()
    }

    /// Decoded labels of every column key, in display order.
    pub fn col_labels(&self) -> Vec<KeyParts> {
        self.col_keys.iter().map(|k| decode_key(k)).collect()
    }
}
