//! FILENAME: core/pivot-engine/src/aggregate.rs
//! Aggregator - Reduces a bucket to one number per value field.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde_json::Value;

use records::{coerce_number, non_blank, value_to_label};

use crate::accessor::ValueAccessor;
use crate::definition::{AggregationType, ValueField};
use crate::expand::WorkingRecord;

/// Running state for one (bucket, value field) pair.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub sum: f64,
    /// Rows seen, blank or not.
    pub count: u64,
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Stringified non-blank values, for distinct counts.
    pub distinct: FxHashSet<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one row's value. Blank values only count as a row.
    pub fn add(&mut self, value: Option<&Value>) {
        self.count += 1;
        let Some(value) = non_blank(value) else {
            return;
        };
        self.distinct.insert(value_to_label(value));
        if let Some(n) = coerce_number(value) {
            self.add_number(n);
        }
    }

    pub fn add_number(&mut self, value: f64) {
        self.count_numbers += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Computes the final aggregate value. Empty input yields 0.
    pub fn compute(&self, aggregation: AggregationType) -> f64 {
        match aggregation {
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.count as f64,
            AggregationType::Average => {
                if self.count_numbers > 0 {
                    self.sum / (self.count_numbers as f64)
                } else {
                    0.0
                }
            }
            AggregationType::Min => self.min.unwrap_or(0.0),
            AggregationType::Max => self.max.unwrap_or(0.0),
            AggregationType::DistinctCount => self.distinct.len() as f64,
        }
    }
}

/// Aggregates one bucket for every value field, keyed by value key.
pub fn aggregate_bucket<'a>(
    rows: &[WorkingRecord<'a>],
    values: &[ValueField],
    accessor: &ValueAccessor<'_, 'a>,
) -> BTreeMap<String, f64> {
    let mut cell = BTreeMap::new();
    for value_field in values {
        let key = value_field.value_key();
        if cell.contains_key(&key) {
            continue;
        }
        let mut acc = Accumulator::new();
        for &row in rows {
            acc.add(accessor.resolve(row, &value_field.field));
        }
        cell.insert(key, acc.compute(value_field.aggregation));
    }
    cell
}
