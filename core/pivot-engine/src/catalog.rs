//! FILENAME: core/pivot-engine/src/catalog.rs
//! Field Catalog - Schema discovery over semi-structured records.
//!
//! Vouchers do not share one shape: keys come and go per record and
//! repeating groups nest to different depths. The catalog walks a sample
//! of vouchers plus every master-data record once per dataset snapshot and
//! produces an ordered list of selectable fields, each classified as a
//! category or a value. Classification happens here, once, and is reused by
//! every later computation.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use records::{coerce_number, is_blank, Collection, Dataset, Record};

use crate::definition::AggregationType;
use crate::rules::{last_segment, FieldRules};

/// Hierarchy level of top-level voucher fields.
pub const VOUCHER_LEVEL: &str = "voucher";

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Groupable dimension (names, dates, ids, codes).
    Category,
    /// Aggregatable measure.
    Value,
}

/// One selectable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Dotted path, reference fields prefixed by their collection.
    pub path: String,
    pub label: String,
    pub kind: FieldKind,
    /// `voucher`, a repeating-group path, or a reference collection name.
    pub hierarchy_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_aggregation: Option<AggregationType>,
}

/// Classifies a field from its name and one sampled value.
///
/// Ladder: forced-category name pattern, then numeric token, then the
/// runtime type of the sample.
pub fn classify_field(path: &str, sample: Option<&Value>, rules: &FieldRules) -> FieldKind {
    let name = last_segment(path).to_ascii_lowercase();

    if rules.is_forced_category(&name) {
        return FieldKind::Category;
    }
    if rules.has_numeric_token(&name) {
        return FieldKind::Value;
    }

    match sample {
        Some(Value::Number(_)) => FieldKind::Value,
        Some(v @ Value::String(_)) if coerce_number(v).is_some() => FieldKind::Value,
        _ => FieldKind::Category,
    }
}

fn default_aggregation(path: &str, kind: FieldKind, rules: &FieldRules) -> Option<AggregationType> {
    match kind {
        FieldKind::Category => None,
        FieldKind::Value => {
            let name = last_segment(path).to_ascii_lowercase();
            if rules.has_average_token(&name) {
                Some(AggregationType::Average)
            } else {
                Some(AggregationType::Sum)
            }
        }
    }
}

/// `party_ledger name` -> `Party Ledger Name`.
pub fn humanize(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn level_caption(level: &str) -> String {
    match level {
        "customers" => "Customers".to_string(),
        "stockitems" => "Stock Items".to_string(),
        other => other.split('.').map(humanize).collect::<Vec<_>>().join(" › "),
    }
}

fn field_label(path: &str, level: &str) -> String {
    let name = humanize(last_segment(path));
    if level == VOUCHER_LEVEL {
        name
    } else {
        format!("{} › {}", level_caption(level), name)
    }
}

// ============================================================================
// SAMPLING
// ============================================================================

/// First `sample_size` records plus every later record whose top-level key
/// set has not been seen yet.
pub fn sample_records(records: &[Record], sample_size: usize) -> Vec<&Record> {
    let mut seen: FxHashSet<Vec<&str>> = FxHashSet::default();
    let mut sample = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let mut keys: Vec<&str> = record
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();

        let is_new_shape = seen.insert(keys);
        if i < sample_size || is_new_shape {
            sample.push(record);
        }
    }

    sample
}

// ============================================================================
// BUILDER
// ============================================================================

struct PendingField<'a> {
    path: String,
    level: String,
    sample: Option<&'a Value>,
}

struct CatalogBuilder<'a, 'r> {
    rules: &'r FieldRules,
    pending: Vec<PendingField<'a>>,
    index: FxHashMap<String, usize>,
}

impl<'a, 'r> CatalogBuilder<'a, 'r> {
    fn new(rules: &'r FieldRules) -> Self {
        CatalogBuilder {
            rules,
            pending: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Records a field occurrence. First occurrence fixes the order; the first
    /// non-blank occurrence fixes the sample.
    fn note(&mut self, path: String, level: &str, value: &'a Value) {
        let sample = if is_blank(value) { None } else { Some(value) };
        match self.index.get(&path) {
            Some(&i) => {
                let pending = &mut self.pending[i];
                if pending.sample.is_none() {
                    pending.sample = sample;
                }
            }
            None => {
                self.index.insert(path.clone(), self.pending.len());
                self.pending.push(PendingField {
                    path,
                    level: level.to_string(),
                    sample,
                });
            }
        }
    }

    fn walk(&mut self, record: &'a Value, prefix: &str, level: &str, root: bool, depth: usize) {
        let Some(map) = record.as_object() else {
            return;
        };

        for (key, value) in map {
            if self.rules.is_internal(key) {
                continue;
            }
            let path = join_path(prefix, key);

            match value {
                Value::Array(items) if items.iter().any(Value::is_object) => {
                    if !self.rules.is_repeating_group(key) {
                        self.note(path.clone(), level, value);
                    }
                    if depth + 1 < self.rules.max_depth {
                        let child_level = if root && level == VOUCHER_LEVEL {
                            key.to_string()
                        } else {
                            format!("{}.{}", level, key)
                        };
                        for item in items.iter().filter(|v| v.is_object()) {
                            self.walk(item, &path, &child_level, false, depth + 1);
                        }
                    }
                }
                Value::Object(_) => {
                    if depth + 1 < self.rules.max_depth {
                        self.walk(value, &path, level, false, depth + 1);
                    }
                }
                _ => self.note(path, level, value),
            }
        }
    }

    fn finish(self) -> FieldCatalog {
        let rules = self.rules;
        let fields: Vec<FieldDescriptor> = self
            .pending
            .into_iter()
            .map(|p| {
                let kind = classify_field(&p.path, p.sample, rules);
                FieldDescriptor {
                    label: field_label(&p.path, &p.level),
                    default_aggregation: default_aggregation(&p.path, kind, rules),
                    kind,
                    hierarchy_level: p.level,
                    path: p.path,
                }
            })
            .collect();
        FieldCatalog::from_fields(fields)
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Ordered field list for one dataset snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl FieldCatalog {
    /// Scans a sample of vouchers and all master data.
    pub fn build(dataset: &Dataset, rules: &FieldRules) -> Self {
        let mut builder = CatalogBuilder::new(rules);

        let sample = sample_records(&dataset.primary, rules.sample_size);
        for record in &sample {
            builder.walk(record, "", VOUCHER_LEVEL, true, 0);
        }

        for collection in Collection::REFERENCES {
            let name = collection.name();
            for record in dataset.collection(collection) {
                builder.walk(record, name, name, false, 0);
            }
        }

        let catalog = builder.finish();
        log::debug!(
            target: "catalog",
            "built catalog fields={} sampled_vouchers={} customers={} stockitems={}",
            catalog.len(),
            sample.len(),
            dataset.customers.len(),
            dataset.stockitems.len()
        );
        catalog
    }

    pub fn from_fields(fields: Vec<FieldDescriptor>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i))
            .collect();
        FieldCatalog { fields, index }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FieldDescriptor> {
        if self.index.is_empty() && !self.fields.is_empty() {
            // Deserialized catalogs carry no index.
            return self.fields.iter().find(|f| f.path == path);
        }
        self.index.get(path).and_then(|&i| self.fields.get(i))
    }

    pub fn is_value_field(&self, path: &str) -> bool {
        matches!(self.get(path), Some(f) if f.kind == FieldKind::Value)
    }

    /// Descriptors grouped by hierarchy level, levels in first-seen order.
    pub fn by_hierarchy(&self) -> Vec<(&str, Vec<&FieldDescriptor>)> {
        let mut groups: Vec<(&str, Vec<&FieldDescriptor>)> = Vec::new();
        for field in &self.fields {
            match groups.iter_mut().find(|(level, _)| *level == field.hierarchy_level) {
                Some((_, members)) => members.push(field),
                None => groups.push((field.hierarchy_level.as_str(), vec![field])),
            }
        }
        groups
    }
}
