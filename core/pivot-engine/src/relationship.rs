//! FILENAME: core/pivot-engine/src/relationship.rs
//! Relationship Resolver - Joins from vouchers to master data.
//!
//! Resolution order for each reference collection the selected fields touch:
//! 1. A user-supplied relationship for the pair, as is.
//! 2. The wired default from the join precedence table, when it validates.
//! 3. Heuristic candidates (shared id name, exact name, normalized name,
//!    first field on each side), first that validates.
//! 4. The wired default unvalidated; misses then surface as blanks.
//!
//! A candidate validates when at least one sampled voucher join value
//! matches a reference key.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use records::{get_key_any_case, split_reference_path, value_to_label, Collection, Dataset, Record};

use crate::catalog::sample_records;
use crate::rules::{first_segment, FieldRules};

// ============================================================================
// RELATIONSHIP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Left,
}

/// A directed join from one collection's field to another's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_collection: Collection,
    pub from_field: String,
    pub to_collection: Collection,
    pub to_field: String,
    #[serde(default)]
    pub join_type: JoinType,
}

impl Relationship {
    /// Join from the primary collection to a reference collection.
    pub fn new(from_field: impl Into<String>, to_collection: Collection, to_field: impl Into<String>) -> Self {
        Relationship {
            from_collection: Collection::Primary,
            from_field: from_field.into(),
            to_collection,
            to_field: to_field.into(),
            join_type: JoinType::Left,
        }
    }
}

/// Active relationships, at most one per (from, to) pair and never both
/// directions of a pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipSet {
    by_pair: BTreeMap<(Collection, Collection), Relationship>,
}

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the relationship for its pair. The reverse
    /// direction, if present, is dropped.
    pub fn insert(&mut self, relationship: Relationship) -> Option<Relationship> {
        let pair = (relationship.from_collection, relationship.to_collection);
        self.by_pair.remove(&(pair.1, pair.0));
        self.by_pair.insert(pair, relationship)
    }

    pub fn get(&self, from: Collection, to: Collection) -> Option<&Relationship> {
        self.by_pair.get(&(from, to))
    }

    /// The primary → `target` relationship.
    pub fn for_target(&self, target: Collection) -> Option<&Relationship> {
        self.get(Collection::Primary, target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.by_pair.values()
    }

    pub fn len(&self) -> usize {
        self.by_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Relationship> {
        self.by_pair.values().cloned().collect()
    }
}

impl FromIterator<Relationship> for RelationshipSet {
    /// Later entries for the same pair win.
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut set = RelationshipSet::new();
        for relationship in iter {
            set.insert(relationship);
        }
        set
    }
}

// ============================================================================
// JOIN PRECEDENCE
// ============================================================================

/// When a wired default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinTrigger {
    /// Some selected field lives inside a ledger-entry repeating group.
    LedgerEntries,
    Always,
}

/// One row of the join precedence table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDefault {
    pub target: Collection,
    pub trigger: JoinTrigger,
    pub from_field: String,
    pub to_field: String,
}

/// Evaluated top to bottom; the first row whose target and trigger match wins.
pub fn default_join_precedence() -> Vec<JoinDefault> {
    vec![
        JoinDefault {
            target: Collection::Customers,
            trigger: JoinTrigger::LedgerEntries,
            from_field: "ledgernameid".to_string(),
            to_field: "masterid".to_string(),
        },
        JoinDefault {
            target: Collection::Customers,
            trigger: JoinTrigger::Always,
            from_field: "partyledgernameid".to_string(),
            to_field: "masterid".to_string(),
        },
        JoinDefault {
            target: Collection::StockItems,
            trigger: JoinTrigger::Always,
            from_field: "stockitemnameid".to_string(),
            to_field: "masterid".to_string(),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverSettings {
    pub precedence: Vec<JoinDefault>,
    /// Name fragments that mark an id-like join field.
    pub id_tokens: Vec<String>,
    /// Vouchers checked when validating a candidate.
    pub validation_sample: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            precedence: default_join_precedence(),
            id_tokens: vec!["masterid".into(), "id".into(), "guid".into()],
            validation_sample: 200,
        }
    }
}

// ============================================================================
// INVOLVEMENT
// ============================================================================

/// Which reference collections a field selection reaches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Involvement {
    pub collections: BTreeSet<Collection>,
    /// A selected field sits inside a ledger-entry repeating group.
    pub ledger_entries: bool,
}

/// Reference-prefixed fields involve their collection; fields inside a
/// repeating group involve the collection that group conventionally joins to.
pub fn involved_collections(fields: &[&str], rules: &FieldRules) -> Involvement {
    let mut involvement = Involvement::default();
    for field in fields {
        if let Some((collection, _)) = split_reference_path(field) {
            involvement.collections.insert(collection);
            continue;
        }
        if !field.contains('.') {
            continue;
        }
        if let Some(group) = rules.repeating_group(first_segment(field)) {
            if let Some(reference) = group.reference {
                involvement.collections.insert(reference);
            }
            if group.ledger_entries {
                involvement.ledger_entries = true;
            }
        }
    }
    involvement
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct RelationshipResolver<'a> {
    dataset: &'a Dataset,
    rules: &'a FieldRules,
    settings: ResolverSettings,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(dataset: &'a Dataset, rules: &'a FieldRules) -> Self {
        RelationshipResolver {
            dataset,
            rules,
            settings: ResolverSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// User relationships first, then one resolved relationship for every
    /// other reference collection the selection involves.
    pub fn resolve(&self, selected_fields: &[&str], user: &[Relationship]) -> RelationshipSet {
        let mut set: RelationshipSet = user.iter().cloned().collect();
        let involvement = involved_collections(selected_fields, self.rules);

        for &target in &involvement.collections {
            if set.for_target(target).is_some() {
                continue;
            }
            if let Some(relationship) = self.resolve_target(target, &involvement) {
                set.insert(relationship);
            }
        }
        set
    }

    pub fn resolve_target(&self, target: Collection, involvement: &Involvement) -> Option<Relationship> {
        let default = self.default_for(target, involvement);

        if let Some(candidate) = &default {
            if self.validate(&candidate.from_field, target, &candidate.to_field) > 0 {
                log::debug!(target: "join", "{} joined by default {} -> {}", target.name(), candidate.from_field, candidate.to_field);
                return default;
            }
        }

        for (from, to) in self.heuristic_candidates(target) {
            if self.validate(&from, target, &to) > 0 {
                log::debug!(target: "join", "{} joined by heuristic {} -> {}", target.name(), from, to);
                return Some(Relationship::new(from, target, to));
            }
        }

        log::debug!(target: "join", "{} has no validated join, using configured default", target.name());
        default
    }

    /// First precedence row matching the target and the selection.
    pub fn default_for(&self, target: Collection, involvement: &Involvement) -> Option<Relationship> {
        self.settings
            .precedence
            .iter()
            .filter(|row| row.target == target)
            .find(|row| match row.trigger {
                JoinTrigger::LedgerEntries => involvement.ledger_entries,
                JoinTrigger::Always => true,
            })
            .map(|row| Relationship::new(row.from_field.clone(), target, row.to_field.clone()))
    }

    /// Candidate (from, to) pairs in heuristic priority order, deduplicated.
    pub fn heuristic_candidates(&self, target: Collection) -> Vec<(String, String)> {
        let from_names = self.from_field_names(target);
        let to_names = self.to_field_names(target);
        let mut candidates: Vec<(String, String)> = Vec::new();
        let mut push = |pair: (String, String)| {
            if !candidates.contains(&pair) {
                candidates.push(pair);
            }
        };

        // 1. shared id-like name
        for from in &from_names {
            let lower = from.to_ascii_lowercase();
            if !self.settings.id_tokens.iter().any(|t| lower.contains(t.as_str())) {
                continue;
            }
            if let Some(to) = to_names.iter().find(|t| t.eq_ignore_ascii_case(from)) {
                push((from.clone(), to.clone()));
            }
        }

        // 2. exact, case-insensitive
        for from in &from_names {
            if let Some(to) = to_names.iter().find(|t| t.eq_ignore_ascii_case(from)) {
                push((from.clone(), to.clone()));
            }
        }

        // 3. normalized
        for from in &from_names {
            let normalized = normalize_name(from);
            if let Some(to) = to_names.iter().find(|t| normalize_name(t) == normalized) {
                push((from.clone(), to.clone()));
            }
        }

        // 4. first available on each side
        if let (Some(from), Some(to)) = (from_names.first(), to_names.first()) {
            push((from.clone(), to.clone()));
        }

        candidates
    }

    /// Number of sampled vouchers whose join value matches a reference key.
    pub fn validate(&self, from_field: &str, target: Collection, to_field: &str) -> usize {
        let keys: FxHashSet<String> = self
            .dataset
            .collection(target)
            .iter()
            .filter_map(|r| get_key_any_case(r, to_field))
            .map(normalized_label)
            .collect();
        if keys.is_empty() {
            return 0;
        }

        self.dataset
            .primary
            .iter()
            .take(self.settings.validation_sample)
            .filter(|record| {
                self.join_values(record, from_field, target)
                    .into_iter()
                    .any(|v| keys.contains(&normalized_label(v)))
            })
            .count()
    }

    /// Values of `field` on a voucher: top level first, then inside every
    /// repeating group that joins to `target`.
    fn join_values<'r>(&self, record: &'r Record, field: &str, target: Collection) -> Vec<&'r Value> {
        let mut values: Vec<&Value> = get_key_any_case(record, field).into_iter().collect();
        for group in self.groups_for(target) {
            if let Some(Value::Array(entries)) = get_key_any_case(record, group) {
                values.extend(entries.iter().filter_map(|e| get_key_any_case(e, field)));
            }
        }
        values
    }

    fn groups_for(&self, target: Collection) -> impl Iterator<Item = &str> {
        self.rules
            .repeating_groups
            .iter()
            .filter(move |g| g.reference == Some(target))
            .map(|g| g.name.as_str())
    }

    fn from_field_names(&self, target: Collection) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let sample = sample_records(&self.dataset.primary, self.rules.sample_size);
        let groups: Vec<&str> = self.groups_for(target).collect();

        for record in sample {
            self.collect_scalar_keys(record, &mut names);
            for group in &groups {
                if let Some(Value::Array(entries)) = get_key_any_case(record, group) {
                    for entry in entries {
                        self.collect_scalar_keys(entry, &mut names);
                    }
                }
            }
        }
        names
    }

    fn to_field_names(&self, target: Collection) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in self.dataset.collection(target).iter().take(self.settings.validation_sample) {
            self.collect_scalar_keys(record, &mut names);
        }
        names
    }

    fn collect_scalar_keys(&self, record: &Value, names: &mut Vec<String>) {
        let Some(map) = record.as_object() else {
            return;
        };
        for (key, value) in map {
            if self.rules.is_internal(key) || value.is_array() || value.is_object() {
                continue;
            }
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
}

/// Lowercase with `_` and spaces removed.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn normalized_label(value: &Value) -> String {
    value_to_label(value).trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            json!({
                "masterid": "V1", "partyledgername": "Acme", "partyledgernameid": "C1",
                "allinventoryentries": [{"stockitemname": "Bolt", "stockitemnameid": "S1"}],
                "ledgerentries": [{"ledgername": "Sales", "ledgernameid": "C9"}]
            }),
        ])
        .with_customers(vec![
            json!({"masterid": "C1", "name": "Acme"}),
            json!({"masterid": "C9", "name": "Sales"}),
        ])
        .with_stockitems(vec![json!({"masterid": "S1", "name": "Bolt"})])
    }

    #[test]
    fn test_involvement_from_prefixes_and_groups() {
        let rules = FieldRules::default();
        let inv = involved_collections(&["customers.name", "allinventoryentries.amount"], &rules);
        assert!(inv.collections.contains(&Collection::Customers));
        assert!(inv.collections.contains(&Collection::StockItems));
        assert!(!inv.ledger_entries);

        let inv = involved_collections(&["ledgerentries.amount", "region"], &rules);
        assert_eq!(inv.collections.iter().copied().collect::<Vec<_>>(), vec![Collection::Customers]);
        assert!(inv.ledger_entries);
    }

    #[test]
    fn test_wired_defaults_and_ledger_precedence() {
        let data = dataset();
        let rules = FieldRules::default();
        let resolver = RelationshipResolver::new(&data, &rules);

        let set = resolver.resolve(&["customers.name", "stockitems.name"], &[]);
        assert_eq!(set.for_target(Collection::Customers).unwrap().from_field, "partyledgernameid");
        assert_eq!(set.for_target(Collection::StockItems).unwrap().from_field, "stockitemnameid");

        // Ledger-entry selection wins over the party default, even with
        // inventory fields selected too.
        let set = resolver.resolve(&["customers.name", "ledgerentries.amount", "allinventoryentries.rate"], &[]);
        assert_eq!(set.for_target(Collection::Customers).unwrap().from_field, "ledgernameid");
        assert_eq!(set.for_target(Collection::StockItems).unwrap().from_field, "stockitemnameid");
    }

    #[test]
    fn test_user_relationship_overrides() {
        let data = dataset();
        let rules = FieldRules::default();
        let user = Relationship::new("partyledgername", Collection::Customers, "name");
        let set = RelationshipResolver::new(&data, &rules).resolve(&["customers.name"], &[user.clone()]);
        assert_eq!(set.for_target(Collection::Customers), Some(&user));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_heuristic_when_default_fields_absent() {
        let data = Dataset::new(vec![json!({"customer_code": "K-1", "amount": 5})])
            .with_customers(vec![json!({"CustomerCode": "K-1", "name": "Acme"})]);
        let rules = FieldRules::default();
        let resolver = RelationshipResolver::new(&data, &rules);

        let candidates = resolver.heuristic_candidates(Collection::Customers);
        assert!(candidates.contains(&("customer_code".to_string(), "CustomerCode".to_string())));

        let set = resolver.resolve(&["customers.name"], &[]);
        let rel = set.for_target(Collection::Customers).unwrap();
        assert_eq!((rel.from_field.as_str(), rel.to_field.as_str()), ("customer_code", "CustomerCode"));
    }

    #[test]
    fn test_first_available_fields_follow_document_order() {
        let data = Dataset::new(vec![json!({"zcode": "K-1", "amount": 5})])
            .with_customers(vec![json!({"zkey": "K-1", "name": "Acme"})]);
        let rules = FieldRules::default();
        let resolver = RelationshipResolver::new(&data, &rules);

        assert_eq!(
            resolver.heuristic_candidates(Collection::Customers),
            vec![("zcode".to_string(), "zkey".to_string())]
        );
        let set = resolver.resolve(&["customers.name"], &[]);
        assert_eq!(set.for_target(Collection::Customers).unwrap().from_field, "zcode");
    }

    #[test]
    fn test_unvalidated_default_is_the_fallback() {
        let data = Dataset::new(vec![json!({"x": 1})]).with_customers(vec![json!({"y": 2})]);
        let rules = FieldRules::default();
        let set = RelationshipResolver::new(&data, &rules).resolve(&["customers.y"], &[]);
        assert_eq!(set.for_target(Collection::Customers).unwrap().from_field, "partyledgernameid");
    }

    #[test]
    fn test_set_is_never_bidirectional() {
        let mut set = RelationshipSet::new();
        set.insert(Relationship::new("a", Collection::Customers, "b"));
        set.insert(Relationship {
            from_collection: Collection::Customers,
            from_field: "b".into(),
            to_collection: Collection::Primary,
            to_field: "a".into(),
            join_type: JoinType::Left,
        });
        assert_eq!(set.len(), 1);
        assert!(set.for_target(Collection::Customers).is_none());
    }

    #[test]
    fn test_relationship_json_shape() {
        let rel = Relationship::new("partyledgernameid", Collection::Customers, "masterid");
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(
            json,
            json!({"fromCollection": "primary", "fromField": "partyledgernameid",
                   "toCollection": "customers", "toField": "masterid", "joinType": "left"})
        );
    }
}
