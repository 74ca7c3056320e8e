//! FILENAME: core/pivot-engine/src/accessor.rs
//! Value Accessor - Field path to value.
//!
//! A field path is resolved by an ordered pipeline of strategies. Each one
//! either claims the path (`Found` / `Missing`) or passes it on:
//!
//! 1. `ReferenceJoinResolver`  - `customers.*` / `stockitems.*` through the join context
//! 2. `NestedArrayResolver`    - dotted paths inside the row's expanded entry
//! 3. `CrossReferenceResolver` - dotted paths via the owning voucher, then direct traversal
//! 4. `DirectKeyResolver`      - exact key, then case-insensitive key
//! 5. `SynonymResolver`        - named synonyms, then a substring scan
//!
//! Null, empty and whitespace-only strings are "no value" at every step.

use serde_json::Value;

use records::{get_key, get_key_any_case, get_key_ci, label_or_blank, non_blank, split_reference_path};

use crate::expand::WorkingRecord;
use crate::join::{JoinContext, ReferenceIndex};
use crate::rules::{first_segment, FieldRules};

/// Outcome of one strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Found(&'a Value),
    /// The strategy owns this path and it has no value. Stops the pipeline.
    Missing,
    /// Not applicable; the next strategy runs.
    Pass,
}

impl<'a> Resolution<'a> {
    fn found_or_missing(value: Option<&'a Value>) -> Self {
        match value {
            Some(v) => Resolution::Found(v),
            None => Resolution::Missing,
        }
    }

    fn found_or_pass(value: Option<&'a Value>) -> Self {
        match value {
            Some(v) => Resolution::Found(v),
            None => Resolution::Pass,
        }
    }
}

pub trait FieldResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve<'a>(
        &self,
        row: WorkingRecord<'a>,
        path: &str,
        join: &JoinContext<'a>,
        rules: &FieldRules,
    ) -> Resolution<'a>;
}

// ============================================================================
// TRAVERSAL HELPERS
// ============================================================================

/// Walks `segments` from `value`. Arrays yield their first entry carrying a value.
pub fn traverse<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.iter().find_map(|item| traverse(item, segments)),
        _ => match segments.split_first() {
            None => non_blank(Some(value)),
            Some((head, rest)) => {
                let next = get_key_any_case(value, head)?;
                traverse(next, rest)
            }
        },
    }
}

fn traverse_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    traverse(value, &segments)
}

/// Remainder of a dotted path after its leading segment.
fn tail(path: &str) -> &str {
    path.split_once('.').map(|(_, rest)| rest).unwrap_or("")
}

/// Dotted path against the row: the expanded entry when the leading segment
/// names it, the voucher otherwise.
fn resolve_on_row<'a>(row: WorkingRecord<'a>, path: &str) -> Option<&'a Value> {
    if path.contains('.') {
        if let Some(entry) = row.entry_for(first_segment(path)) {
            return traverse_path(entry, tail(path));
        }
    }
    traverse_path(row.record, path)
}

/// Scalar key on the entry first, then on the voucher.
fn row_key<'a>(row: WorkingRecord<'a>, key: &str) -> Option<&'a Value> {
    row.nested
        .and_then(|ctx| non_blank(get_key_any_case(ctx.entry, key)))
        .or_else(|| non_blank(get_key_any_case(row.record, key)))
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// Reference-prefixed paths through the resolved relationship.
#[derive(Debug, Default)]
pub struct ReferenceJoinResolver;

impl ReferenceJoinResolver {
    fn find_target<'a>(row: WorkingRecord<'a>, from_field: &str, index: &ReferenceIndex<'a>) -> Option<&'a Value> {
        if let Some(hit) = row_key(row, from_field).and_then(|key| index.lookup(key)) {
            return Some(hit);
        }

        // `partyledgernameid` -> `partyledgername`, matched against reference names
        let lower = from_field.to_ascii_lowercase();
        if let Some(name_field) = lower.strip_suffix("id").filter(|n| n.ends_with("name")) {
            if let Some(hit) = row_key(row, name_field).and_then(|name| index.lookup_name(name)) {
                return Some(hit);
            }
        }

        // any other `...nameid` key on the row
        let sources = row.nested.map(|ctx| ctx.entry).into_iter().chain(std::iter::once(row.record));
        for source in sources {
            let Some(map) = source.as_object() else {
                continue;
            };
            for (key, value) in map {
                if !key.to_ascii_lowercase().ends_with("nameid") || non_blank(Some(value)).is_none() {
                    continue;
                }
                if let Some(hit) = index.lookup(value) {
                    return Some(hit);
                }
            }
        }
        None
    }
}

impl FieldResolver for ReferenceJoinResolver {
    fn name(&self) -> &'static str {
        "reference-join"
    }

    fn resolve<'a>(&self, row: WorkingRecord<'a>, path: &str, join: &JoinContext<'a>, _rules: &FieldRules) -> Resolution<'a> {
        let Some((target, rest)) = split_reference_path(path) else {
            return Resolution::Pass;
        };
        let (Some(relationship), Some(index)) = (join.relationship(target), join.reference(target)) else {
            return Resolution::Missing;
        };

        let segments: Vec<&str> = rest.split('.').collect();
        if segments.len() > 2 {
            return Resolution::Missing;
        }

        match Self::find_target(row, &relationship.from_field, index) {
            Some(target_record) => Resolution::found_or_missing(traverse(target_record, &segments)),
            None => Resolution::Missing,
        }
    }
}

/// Dotted paths whose leading segment is the row's expanded group.
#[derive(Debug, Default)]
pub struct NestedArrayResolver;

impl FieldResolver for NestedArrayResolver {
    fn name(&self) -> &'static str {
        "nested-array"
    }

    fn resolve<'a>(&self, row: WorkingRecord<'a>, path: &str, _join: &JoinContext<'a>, _rules: &FieldRules) -> Resolution<'a> {
        if !path.contains('.') {
            return Resolution::Pass;
        }
        match row.entry_for(first_segment(path)) {
            Some(entry) => Resolution::found_or_missing(traverse_path(entry, tail(path))),
            None => Resolution::Pass,
        }
    }
}

/// Other dotted paths: the owning voucher by master id, then the row's own record.
#[derive(Debug, Default)]
pub struct CrossReferenceResolver;

impl FieldResolver for CrossReferenceResolver {
    fn name(&self) -> &'static str {
        "cross-reference"
    }

    fn resolve<'a>(&self, row: WorkingRecord<'a>, path: &str, join: &JoinContext<'a>, rules: &FieldRules) -> Resolution<'a> {
        if !path.contains('.') {
            return Resolution::Pass;
        }
        let owner = non_blank(get_key(row.record, &rules.master_id_field))
            .and_then(|id| join.primary_by_master_id(id))
            .filter(|owner| !std::ptr::eq(*owner, row.record));

        let value = owner
            .and_then(|owner| traverse_path(owner, path))
            .or_else(|| traverse_path(row.record, path));
        Resolution::found_or_pass(value)
    }
}

#[derive(Debug, Default)]
pub struct DirectKeyResolver;

impl FieldResolver for DirectKeyResolver {
    fn name(&self) -> &'static str {
        "direct-key"
    }

    fn resolve<'a>(&self, row: WorkingRecord<'a>, path: &str, _join: &JoinContext<'a>, _rules: &FieldRules) -> Resolution<'a> {
        let value = non_blank(get_key(row.record, path)).or_else(|| non_blank(get_key_ci(row.record, path)));
        Resolution::found_or_pass(value)
    }
}

/// Named synonyms (`item`, `category`, `date`, `customer`, `party`), then a
/// substring scan for the requests that allow one.
#[derive(Debug, Default)]
pub struct SynonymResolver;

impl SynonymResolver {
    fn scan<'a>(source: &'a Value, needles: &[String], rules: &FieldRules) -> Option<&'a Value> {
        source.as_object()?.iter().find_map(|(key, value)| {
            if rules.is_internal(key) || value.is_array() || value.is_object() {
                return None;
            }
            let lower = key.to_ascii_lowercase();
            if needles.iter().any(|n| lower.contains(n.as_str())) {
                non_blank(Some(value))
            } else {
                None
            }
        })
    }
}

impl FieldResolver for SynonymResolver {
    fn name(&self) -> &'static str {
        "synonym"
    }

    fn resolve<'a>(&self, row: WorkingRecord<'a>, path: &str, _join: &JoinContext<'a>, rules: &FieldRules) -> Resolution<'a> {
        if let Some(candidates) = rules.synonyms_for(path) {
            let hit = candidates.iter().find_map(|candidate| resolve_on_row(row, candidate));
            if hit.is_some() {
                return Resolution::found_or_pass(hit);
            }
        }

        if let Some(needles) = rules.substring_needles(path) {
            let hit = row
                .nested
                .and_then(|ctx| Self::scan(ctx.entry, needles, rules))
                .or_else(|| Self::scan(row.record, needles, rules));
            return Resolution::found_or_pass(hit);
        }

        Resolution::Pass
    }
}

pub fn default_strategies() -> Vec<Box<dyn FieldResolver>> {
    vec![
        Box::new(ReferenceJoinResolver),
        Box::new(NestedArrayResolver),
        Box::new(CrossReferenceResolver),
        Box::new(DirectKeyResolver),
        Box::new(SynonymResolver),
    ]
}

// ============================================================================
// ACCESSOR
// ============================================================================

pub struct ValueAccessor<'j, 'a> {
    join: &'j JoinContext<'a>,
    rules: &'j FieldRules,
    strategies: Vec<Box<dyn FieldResolver>>,
}

impl<'j, 'a> ValueAccessor<'j, 'a> {
    pub fn new(join: &'j JoinContext<'a>, rules: &'j FieldRules) -> Self {
        ValueAccessor {
            join,
            rules,
            strategies: default_strategies(),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn FieldResolver>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn rules(&self) -> &'j FieldRules {
        self.rules
    }

    /// The value at `path` for this row, or None.
    pub fn resolve(&self, row: WorkingRecord<'a>, path: &str) -> Option<&'a Value> {
        for strategy in &self.strategies {
            match strategy.resolve(row, path, self.join, self.rules) {
                Resolution::Found(value) => return non_blank(Some(value)),
                Resolution::Missing => {
                    log::trace!(target: "pivot", "{} has no value for {}", strategy.name(), path);
                    return None;
                }
                Resolution::Pass => {}
            }
        }
        None
    }

    /// String form of the resolved value, `(blank)` when absent.
    pub fn label(&self, row: WorkingRecord<'a>, path: &str) -> String {
        label_or_blank(self.resolve(row, path))
    }
}
