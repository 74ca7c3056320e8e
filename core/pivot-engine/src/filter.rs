//! FILENAME: core/pivot-engine/src/filter.rs
//! Filter Engine - Include-list predicates over working rows.
//!
//! Filters compose conjunctively. A row survives a filter when the string
//! form of its value is one of the allowed values. Date fields with a
//! grouping compare bucket labels on both sides.

use rustc_hash::FxHashSet;

use records::{bucket_date, bucket_value, label_or_blank, parse_date, Granularity};

use crate::accessor::ValueAccessor;
use crate::definition::FilterSpec;
use crate::expand::WorkingRecord;
use crate::rules::FieldRules;

/// A filter with its allowed set prepared for lookups.
#[derive(Debug)]
struct CompiledFilter<'f> {
    field: &'f str,
    allowed: FxHashSet<String>,
    grouping: Option<Granularity>,
}

impl<'f> CompiledFilter<'f> {
    fn compile(spec: &'f FilterSpec, rules: &FieldRules) -> Self {
        let grouping = spec.date_grouping.filter(|_| rules.is_date_field(&spec.field));
        let allowed = spec
            .values
            .iter()
            .map(|value| match grouping {
                Some(g) => parse_date(value).map(|d| bucket_date(d, g)).unwrap_or_else(|| value.clone()),
                None => value.clone(),
            })
            .collect();

        CompiledFilter {
            field: &spec.field,
            allowed,
            grouping,
        }
    }

    fn accepts<'a>(&self, row: WorkingRecord<'a>, accessor: &ValueAccessor<'_, 'a>) -> bool {
        let value = accessor.resolve(row, self.field);
        let label = match self.grouping {
            Some(g) => bucket_value(value, g),
            None => label_or_blank(value),
        };
        self.allowed.contains(&label)
    }
}

/// Keeps the rows that pass every active filter. Order is preserved.
pub fn apply_filters<'a>(
    rows: Vec<WorkingRecord<'a>>,
    filters: &[FilterSpec],
    accessor: &ValueAccessor<'_, 'a>,
) -> Vec<WorkingRecord<'a>> {
    let compiled: Vec<CompiledFilter> = filters
        .iter()
        .filter(|f| f.is_active())
        .map(|f| CompiledFilter::compile(f, accessor.rules()))
        .collect();
    if compiled.is_empty() {
        return rows;
    }

    let before = rows.len();
    let kept: Vec<WorkingRecord<'a>> = rows
        .into_iter()
        .filter(|row| compiled.iter().all(|f| f.accepts(*row, accessor)))
        .collect();
    log::debug!(target: "pivot", "filters kept {} of {} rows", kept.len(), before);
    kept
}
