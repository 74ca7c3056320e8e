//! FILENAME: core/pivot-engine/src/join.rs
//! Join Context - Per-computation lookup indexes.
//!
//! Built once at the start of a recompute from the dataset snapshot and the
//! resolved relationships, then passed explicitly to every stage that
//! resolves field values. Nothing here outlives the computation.

use rustc_hash::FxHashMap;

use records::{get_key, get_key_any_case, non_blank, value_to_label, Collection, Dataset, Record};
use serde_json::Value;

use crate::relationship::{Relationship, RelationshipSet};
use crate::rules::FieldRules;

// ============================================================================
// REFERENCE INDEX
// ============================================================================

/// Lookup over one reference collection keyed by a relationship's `toField`.
#[derive(Debug)]
pub struct ReferenceIndex<'a> {
    records: &'a [Record],
    exact: FxHashMap<String, usize>,
    lower: FxHashMap<String, usize>,
    /// `toField` read under any key casing, lowercased.
    any_case: FxHashMap<String, usize>,
    by_name: FxHashMap<String, usize>,
}

impl<'a> ReferenceIndex<'a> {
    /// First occurrence of a key wins.
    pub fn build(records: &'a [Record], to_field: &str, name_field: &str) -> Self {
        let mut exact = FxHashMap::default();
        let mut lower = FxHashMap::default();
        let mut any_case = FxHashMap::default();
        let mut by_name = FxHashMap::default();

        for (idx, record) in records.iter().enumerate() {
            if let Some(key) = non_blank(get_key(record, to_field)) {
                let label = value_to_label(key).trim().to_string();
                lower.entry(label.to_lowercase()).or_insert(idx);
                exact.entry(label).or_insert(idx);
            }
            if let Some(key) = non_blank(get_key_any_case(record, to_field)) {
                any_case
                    .entry(value_to_label(key).trim().to_lowercase())
                    .or_insert(idx);
            }
            if let Some(name) = non_blank(get_key_any_case(record, name_field)) {
                by_name
                    .entry(value_to_label(name).trim().to_lowercase())
                    .or_insert(idx);
            }
        }

        ReferenceIndex {
            records,
            exact,
            lower,
            any_case,
            by_name,
        }
    }

    /// Exact key, then case-insensitive key, then a record whose `toField`
    /// carries the value under a differently cased key name.
    pub fn lookup(&self, key: &Value) -> Option<&'a Record> {
        let label = value_to_label(key);
        let label = label.trim();
        if let Some(&idx) = self.exact.get(label) {
            return self.records.get(idx);
        }
        let lower = label.to_lowercase();
        if let Some(&idx) = self.lower.get(&lower) {
            return self.records.get(idx);
        }
        self.any_case.get(&lower).and_then(|&idx| self.records.get(idx))
    }

    /// Case-insensitive lookup by display name.
    pub fn lookup_name(&self, name: &Value) -> Option<&'a Record> {
        let key = value_to_label(name).trim().to_lowercase();
        self.by_name.get(&key).and_then(|&idx| self.records.get(idx))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// JOIN CONTEXT
// ============================================================================

#[derive(Debug)]
pub struct JoinContext<'a> {
    dataset: &'a Dataset,
    relationships: RelationshipSet,
    references: FxHashMap<Collection, ReferenceIndex<'a>>,
    primary_by_master_id: FxHashMap<String, usize>,
}

impl<'a> JoinContext<'a> {
    /// Indexes every reference collection that has a relationship, plus the
    /// primary collection by master id.
    pub fn new(dataset: &'a Dataset, relationships: RelationshipSet, rules: &FieldRules) -> Self {
        let mut references = FxHashMap::default();
        for relationship in relationships.iter() {
            if relationship.from_collection != Collection::Primary {
                continue;
            }
            let target = relationship.to_collection;
            let index = ReferenceIndex::build(
                dataset.collection(target),
                &relationship.to_field,
                &rules.reference_name_field,
            );
            log::trace!(target: "join", "indexed {} {} records by {}", index.len(), target.name(), relationship.to_field);
            references.insert(target, index);
        }

        let mut primary_by_master_id = FxHashMap::default();
        for (idx, record) in dataset.primary.iter().enumerate() {
            if let Some(id) = non_blank(get_key(record, &rules.master_id_field)) {
                primary_by_master_id.entry(value_to_label(id)).or_insert(idx);
            }
        }

        JoinContext {
            dataset,
            relationships,
            references,
            primary_by_master_id,
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn relationships(&self) -> &RelationshipSet {
        &self.relationships
    }

    pub fn relationship(&self, target: Collection) -> Option<&Relationship> {
        self.relationships.for_target(target)
    }

    pub fn reference(&self, target: Collection) -> Option<&ReferenceIndex<'a>> {
        self.references.get(&target)
    }

    /// The top-level voucher carrying `master_id`.
    pub fn primary_by_master_id(&self, master_id: &Value) -> Option<&'a Record> {
        let primary: &'a [Record] = &self.dataset.primary;
        self.primary_by_master_id
            .get(&value_to_label(master_id))
            .and_then(|&idx| primary.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_lookup_ladder() {
        let records = vec![
            json!({"masterid": "C1", "name": "Acme"}),
            json!({"masterid": "c1", "name": "Shadow"}),
            json!({"MasterId": "C3", "name": "Cased"}),
            json!({"masterid": 42, "name": "Numeric"}),
        ];
        let index = ReferenceIndex::build(&records, "masterid", "name");

        assert_eq!(index.lookup(&json!("C1")).unwrap()["name"], "Acme");
        assert_eq!(index.lookup(&json!("c1")).unwrap()["name"], "Shadow");
        // differently cased key names resolve through the any-case index
        assert_eq!(index.lookup(&json!("c3")).unwrap()["name"], "Cased");
        assert_eq!(index.lookup(&json!("42")).unwrap()["name"], "Numeric");
        assert!(index.lookup(&json!("C9")).is_none());

        assert_eq!(index.lookup_name(&json!(" acme ")).unwrap()["masterid"], "C1");
    }

    #[test]
    fn test_misses_on_large_collections_stay_misses() {
        let records: Vec<Value> = (0..5_000)
            .map(|i| json!({"MasterID": format!("C{}", i), "name": format!("N{}", i)}))
            .collect();
        let index = ReferenceIndex::build(&records, "masterid", "name");
        for _ in 0..5_000 {
            assert!(index.lookup(&json!("walk-in")).is_none());
        }
        assert_eq!(index.lookup(&json!("c4999")).unwrap()["name"], "N4999");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let records = vec![json!({"masterid": "C1", "name": "First"}), json!({"masterid": "C1", "name": "Second"})];
        let index = ReferenceIndex::build(&records, "masterid", "name");
        assert_eq!(index.lookup(&json!("C1")).unwrap()["name"], "First");
    }

    #[test]
    fn test_context_indexes_related_collections_only() {
        let dataset = Dataset::new(vec![json!({"masterid": 7, "partyledgernameid": "C1"})])
            .with_customers(vec![json!({"masterid": "C1", "name": "Acme"})])
            .with_stockitems(vec![json!({"masterid": "S1", "name": "Bolt"})]);
        let relationships: RelationshipSet =
            vec![Relationship::new("partyledgernameid", Collection::Customers, "masterid")]
                .into_iter()
                .collect();
        let ctx = JoinContext::new(&dataset, relationships, &FieldRules::default());

        assert!(ctx.reference(Collection::Customers).is_some());
        assert!(ctx.reference(Collection::StockItems).is_none());
        assert_eq!(ctx.primary_by_master_id(&json!("7")).unwrap()["partyledgernameid"], "C1");
    }
}
