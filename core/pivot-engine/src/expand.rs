//! FILENAME: core/pivot-engine/src/expand.rs
//! Row Expansion - Vouchers to working rows.
//!
//! A selection that reaches into a repeating group (line items, ledger
//! postings) is computed per entry, not per voucher. Each voucher becomes
//! one working row per entry of the chosen group; a voucher without entries
//! still yields one row with no nested context. Only one group is expanded.

use serde_json::Value;

use records::{get_key_any_case, split_reference_path, Collection, Dataset, Record};

use crate::catalog::sample_records;
use crate::definition::PivotConfig;
use crate::relationship::RelationshipSet;
use crate::rules::{first_segment, FieldRules};

/// The repeating-group entry a working row was expanded from.
#[derive(Debug, Clone, Copy)]
pub struct NestedContext<'a> {
    pub group: &'a str,
    pub entry: &'a Record,
}

/// One unit of grouping and aggregation.
#[derive(Debug, Clone, Copy)]
pub struct WorkingRecord<'a> {
    /// The top-level voucher.
    pub record: &'a Record,
    pub nested: Option<NestedContext<'a>>,
}

impl<'a> WorkingRecord<'a> {
    pub fn top(record: &'a Record) -> Self {
        WorkingRecord { record, nested: None }
    }

    pub fn nested(record: &'a Record, group: &'a str, entry: &'a Record) -> Self {
        WorkingRecord {
            record,
            nested: Some(NestedContext { group, entry }),
        }
    }

    /// The nested entry when the row was expanded from `group`.
    pub fn entry_for(&self, group: &str) -> Option<&'a Record> {
        self.nested
            .filter(|ctx| ctx.group.eq_ignore_ascii_case(group))
            .map(|ctx| ctx.entry)
    }
}

fn is_record_array(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.first().map(Value::is_object).unwrap_or(false))
}

/// Picks the group to expand.
///
/// The first selected field (rows, columns, values, filters) whose leading
/// segment is a known repeating group, or an array of records in the sampled
/// vouchers, decides. Failing that, a reference field whose join field only
/// exists inside a group of the joined collection expands that group.
pub fn expansion_group(
    config: &PivotConfig,
    dataset: &Dataset,
    rules: &FieldRules,
    relationships: &RelationshipSet,
) -> Option<String> {
    let sample = sample_records(&dataset.primary, rules.sample_size);
    let fields = config.selected_fields();

    for field in &fields {
        if !field.contains('.') || split_reference_path(field).is_some() {
            continue;
        }
        let head = first_segment(field);
        if let Some(group) = rules.repeating_group(head) {
            return Some(group.name.clone());
        }
        let is_array = sample
            .iter()
            .any(|r| get_key_any_case(r, head).map(is_record_array).unwrap_or(false));
        if is_array {
            return Some(head.to_string());
        }
    }

    for field in &fields {
        let Some((target, _)) = split_reference_path(field) else {
            continue;
        };
        let Some(relationship) = relationships.for_target(target) else {
            continue;
        };
        if let Some(group) = join_group(&sample, rules, target, &relationship.from_field) {
            return Some(group);
        }
    }

    None
}

/// A group of `target` whose entries carry `from_field` while the sampled
/// vouchers themselves do not.
fn join_group(sample: &[&Record], rules: &FieldRules, target: Collection, from_field: &str) -> Option<String> {
    let on_voucher = sample.iter().any(|r| get_key_any_case(r, from_field).is_some());
    if on_voucher {
        return None;
    }
    rules
        .repeating_groups
        .iter()
        .filter(|g| g.reference == Some(target))
        .find(|g| {
            sample.iter().any(|r| match get_key_any_case(r, &g.name) {
                Some(Value::Array(entries)) => entries.iter().any(|e| get_key_any_case(e, from_field).is_some()),
                _ => false,
            })
        })
        .map(|g| g.name.clone())
}

/// Expands vouchers into working rows.
pub fn expand_records<'a>(records: &'a [Record], group: Option<&'a str>) -> Vec<WorkingRecord<'a>> {
    let Some(group) = group else {
        return records.iter().map(WorkingRecord::top).collect();
    };

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let before = rows.len();
        if let Some(Value::Array(entries)) = get_key_any_case(record, group) {
            rows.extend(
                entries
                    .iter()
                    .filter(|e| e.is_object())
                    .map(|entry| WorkingRecord::nested(record, group, entry)),
            );
        }
        if rows.len() == before {
            rows.push(WorkingRecord::top(record));
        }
    }
    log::trace!(target: "pivot", "expanded {} vouchers into {} rows by {}", records.len(), rows.len(), group);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AggregationType, PivotAxisField, ValueField};
    use crate::relationship::Relationship;
    use serde_json::json;

    fn vouchers() -> Vec<Record> {
        vec![
            json!({"masterid": 1, "allinventoryentries": [{"stockitemnameid": "S1", "amount": 10}, {"stockitemnameid": "S2", "amount": 5}]}),
            json!({"masterid": 2, "allinventoryentries": []}),
            json!({"masterid": 3}),
        ]
    }

    #[test]
    fn test_left_join_expansion() {
        let records = vouchers();
        let rows = expand_records(&records, Some("allinventoryentries"));
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].entry_for("allinventoryentries").unwrap()["stockitemnameid"], "S2");
        assert!(rows[2].nested.is_none());
        assert!(rows[3].nested.is_none());

        assert_eq!(expand_records(&records, None).len(), 3);
    }

    #[test]
    fn test_group_from_selected_field() {
        let dataset = Dataset::new(vouchers());
        let rules = FieldRules::default();
        let mut config = PivotConfig::default();
        config.rows.push(PivotAxisField::new("region", "Region"));
        config.values.push(ValueField::new("allinventoryentries.amount", AggregationType::Sum));

        let group = expansion_group(&config, &dataset, &rules, &RelationshipSet::new());
        assert_eq!(group.as_deref(), Some("allinventoryentries"));
    }

    #[test]
    fn test_unknown_record_arrays_are_groups() {
        let dataset = Dataset::new(vec![json!({"lines": [{"qty": 1}]})]);
        let rules = FieldRules::default();
        let mut config = PivotConfig::default();
        config.values.push(ValueField::new("lines.qty", AggregationType::Sum));
        let group = expansion_group(&config, &dataset, &rules, &RelationshipSet::new());
        assert_eq!(group.as_deref(), Some("lines"));
    }

    #[test]
    fn test_reference_field_expands_its_join_group() {
        let dataset = Dataset::new(vouchers());
        let rules = FieldRules::default();
        let mut config = PivotConfig::default();
        config.rows.push(PivotAxisField::new("stockitems.name", "Stock Item › Name"));
        config.values.push(ValueField::new("masterid", AggregationType::Count));
        let relationships: RelationshipSet =
            std::iter::once(Relationship::new("stockitemnameid", Collection::StockItems, "masterid")).collect();

        let group = expansion_group(&config, &dataset, &rules, &relationships);
        assert_eq!(group.as_deref(), Some("allinventoryentries"));
    }
}
