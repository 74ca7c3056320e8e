//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - Recomputes a PivotResult from a dataset and a config.
//!
//! Algorithm:
//! 1. Resolve relationships for the reference collections the config touches
//! 2. Build the join context (lookup indexes for this computation only)
//! 3. Expand vouchers into working rows for the selected repeating group
//! 4. Apply filters
//! 5. Bucket rows by (row key, column key)
//! 6. Sort keys, aggregate every populated cell
//! 7. Row totals, column totals, grand total
//!
//! Every run is a full replace. Nothing is cached between runs and no input
//! is mutated.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use records::Dataset;

use crate::aggregate::aggregate_bucket;
use crate::accessor::ValueAccessor;
use crate::catalog::FieldCatalog;
use crate::definition::PivotConfig;
use crate::error::PivotError;
use crate::expand::{expand_records, expansion_group};
use crate::filter::apply_filters;
use crate::grouping::{group_records, Buckets};
use crate::join::JoinContext;
use crate::relationship::{Relationship, RelationshipResolver, ResolverSettings};
use crate::rules::FieldRules;
use crate::sort::{axis_field_types, compare_col_keys, compare_row_keys, settle_field_types};
use crate::view::{PivotResult, ValueMap};

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// The main calculation engine.
pub struct PivotCalculator<'a> {
    dataset: &'a Dataset,
    config: &'a PivotConfig,

    /// User-supplied relationships. They win over resolved ones.
    relationships: &'a [Relationship],

    rules: Cow<'a, FieldRules>,

    /// Field kinds for typed row sorting. Without it, numeric positions are inferred.
    catalog: Option<&'a FieldCatalog>,

    resolver_settings: ResolverSettings,
}

impl<'a> PivotCalculator<'a> {
    pub fn new(dataset: &'a Dataset, config: &'a PivotConfig) -> Self {
        PivotCalculator {
            dataset,
            config,
            relationships: &[],
            rules: Cow::Owned(FieldRules::default()),
            catalog: None,
            resolver_settings: ResolverSettings::default(),
        }
    }

    pub fn with_relationships(mut self, relationships: &'a [Relationship]) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn with_rules(mut self, rules: &'a FieldRules) -> Self {
        self.rules = Cow::Borrowed(rules);
        self
    }

    pub fn with_catalog(mut self, catalog: &'a FieldCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_resolver_settings(mut self, settings: ResolverSettings) -> Self {
        self.resolver_settings = settings;
        self
    }

    /// Executes the full calculation.
    pub fn calculate(&self) -> Result<PivotResult, PivotError> {
        let result = self.calculate_cancellable(&|| false)?;
        Ok(result.unwrap_or_default())
    }

    /// Same as `calculate`, checking `is_cancelled` between stages.
    /// Returns `Ok(None)` once cancelled.
    pub fn calculate_cancellable(&self, is_cancelled: &dyn Fn() -> bool) -> Result<Option<PivotResult>, PivotError> {
        let config = self.config;
        if config.values.is_empty() {
            return Err(PivotError::NoValueFields);
        }
        let rules: &FieldRules = &self.rules;

        // Step 1: relationships
        let selected = config.selected_fields();
        let relationships = RelationshipResolver::new(self.dataset, rules)
            .with_settings(self.resolver_settings.clone())
            .resolve(&selected, self.relationships);
        if is_cancelled() {
            return Ok(None);
        }

        // Step 2-3: join context and working rows
        let group = expansion_group(config, self.dataset, rules, &relationships);
        let join = JoinContext::new(self.dataset, relationships, rules);
        let accessor = ValueAccessor::new(&join, rules);
        let rows = expand_records(&self.dataset.primary, group.as_deref());
        if is_cancelled() {
            return Ok(None);
        }

        // Step 4: filters
        let rows = apply_filters(rows, &config.filters, &accessor);
        if is_cancelled() {
            return Ok(None);
        }

        // Step 5: buckets
        let buckets = group_records(&rows, config, &accessor);
        if is_cancelled() {
            return Ok(None);
        }

        // Step 6-7: order, aggregate, totals
        let (row_keys, col_keys) = self.ordered_keys(&buckets, rules);
        let mut result = PivotResult {
            row_keys,
            col_keys,
            value_keys: config.value_keys(),
            ..PivotResult::default()
        };

        for (row_key, cols) in &buckets {
            let cells = result.data.entry(row_key.clone()).or_default();
            for (col_key, bucket_rows) in cols {
                cells.insert(col_key.clone(), aggregate_bucket(bucket_rows, &config.values, &accessor));
            }
        }
        compute_totals(&mut result);

        log::debug!(
            target: "pivot",
            "recomputed {} rows into {} x {} keys",
            rows.len(),
            result.row_keys.len(),
            result.col_keys.len()
        );
        Ok(Some(result))
    }

    fn ordered_keys(&self, buckets: &Buckets<'_>, rules: &FieldRules) -> (Vec<String>, Vec<String>) {
        let mut row_keys: Vec<String> = buckets.keys().cloned().collect();
        let row_types = settle_field_types(&axis_field_types(&self.config.rows, rules, self.catalog), &row_keys);
        row_keys.sort_by(|a, b| compare_row_keys(a, b, &row_types));

        let col_set: BTreeSet<&String> = buckets.values().flat_map(|cols| cols.keys()).collect();
        let mut col_keys: Vec<String> = col_set.into_iter().cloned().collect();
        col_keys.sort_by(|a, b| compare_col_keys(a, b));

        (row_keys, col_keys)
    }
}

// ============================================================================
// TOTALS
// ============================================================================

fn add_into(target: &mut ValueMap, source: &ValueMap) {
    for (value_key, n) in source {
        *target.entry(value_key.clone()).or_insert(0.0) += n;
    }
}

/// Row total = Σ cells across columns; column total = Σ cells across rows;
/// grand total = Σ row totals. Sums run in display order.
fn compute_totals(result: &mut PivotResult) {
    let mut totals: BTreeMap<String, ValueMap> = BTreeMap::new();
    let mut col_totals: BTreeMap<String, ValueMap> = BTreeMap::new();
    let mut grand_total: ValueMap = result.value_keys.iter().map(|k| (k.clone(), 0.0)).collect();

    for row_key in &result.row_keys {
        let Some(cells) = result.data.get(row_key) else {
            continue;
        };
        let row_total = totals.entry(row_key.clone()).or_default();
        for col_key in &result.col_keys {
            if let Some(cell) = cells.get(col_key) {
                add_into(row_total, cell);
            }
        }
    }

    for col_key in &result.col_keys {
        let col_total = col_totals.entry(col_key.clone()).or_default();
        for row_key in &result.row_keys {
            if let Some(cell) = result.data.get(row_key).and_then(|cells| cells.get(col_key)) {
                add_into(col_total, cell);
            }
        }
    }

    for row_key in &result.row_keys {
        if let Some(row_total) = totals.get(row_key) {
            add_into(&mut grand_total, row_total);
        }
    }

    result.totals = totals;
    result.col_totals = col_totals;
    result.grand_total = grand_total;
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Recomputes a pivot with default rules. The main entry point.
pub fn recompute(
    dataset: &Dataset,
    relationships: &[Relationship],
    config: &PivotConfig,
) -> Result<PivotResult, PivotError> {
    PivotCalculator::new(dataset, config)
        .with_relationships(relationships)
        .calculate()
}

/// `recompute` with row positions typed by a prebuilt catalog.
pub fn recompute_with_catalog(
    dataset: &Dataset,
    relationships: &[Relationship],
    catalog: &FieldCatalog,
    config: &PivotConfig,
) -> Result<PivotResult, PivotError> {
    PivotCalculator::new(dataset, config)
        .with_relationships(relationships)
        .with_catalog(catalog)
        .calculate()
}

/// Cancellable variant of `recompute`. `Ok(None)` means the run was abandoned.
pub fn recompute_cancellable(
    dataset: &Dataset,
    relationships: &[Relationship],
    config: &PivotConfig,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<Option<PivotResult>, PivotError> {
    PivotCalculator::new(dataset, config)
        .with_relationships(relationships)
        .calculate_cancellable(is_cancelled)
}
