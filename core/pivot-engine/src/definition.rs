//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot report.
//! These structures are designed to be:
//! - Serializable (they are persisted inside report definitions)
//! - Round-trippable through JSON without loss
//! - Immutable snapshots of user intent

use records::Granularity;
use serde::{Deserialize, Serialize};

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    Sum,
    Count,
    Average,
    Min,
    Max,
    DistinctCount,
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::Sum
    }
}

impl AggregationType {
    /// Wire name, also used when building value keys.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Count => "count",
            AggregationType::Average => "average",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::DistinctCount => "distinctCount",
        }
    }

    /// Caption prefix used for generated labels ("Sum of Amount").
    pub fn caption(self) -> &'static str {
        match self {
            AggregationType::Sum => "Sum",
            AggregationType::Count => "Count",
            AggregationType::Average => "Average",
            AggregationType::Min => "Min",
            AggregationType::Max => "Max",
            AggregationType::DistinctCount => "Distinct Count",
        }
    }
}

// ============================================================================
// FIELD DEFINITIONS
// ============================================================================

/// A field placed on the row or column axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotAxisField {
    /// Dotted field path (`region`, `allinventoryentries.stockitemname`, `customers.parent`).
    pub field: String,

    /// Display name from the field catalog.
    pub label: String,

    /// User override for the display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,

    /// Date bucketing for date fields. Ignored for non-date fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_grouping: Option<Granularity>,
}

impl PivotAxisField {
    pub fn new(field: impl Into<String>, label: impl Into<String>) -> Self {
        PivotAxisField {
            field: field.into(),
            label: label.into(),
            custom_label: None,
            date_grouping: None,
        }
    }

    pub fn with_date_grouping(mut self, granularity: Granularity) -> Self {
        self.date_grouping = Some(granularity);
        self
    }

    pub fn display_label(&self) -> &str {
        self.custom_label.as_deref().unwrap_or(&self.label)
    }
}

/// Represents a value field with its aggregation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueField {
    /// Dotted field path of the measure.
    pub field: String,

    /// Display name (e.g., "Sum of Amount").
    pub label: String,

    /// The aggregation function to apply.
    pub aggregation: AggregationType,

    /// Presentation hint, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Presentation hint, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
}

impl ValueField {
    pub fn new(field: impl Into<String>, aggregation: AggregationType) -> Self {
        let field = field.into();
        let label = format!("{} of {}", aggregation.caption(), field);
        ValueField {
            field,
            label,
            aggregation,
            format: None,
            scale_factor: None,
            custom_label: None,
        }
    }

    /// Key under which this field's numbers appear in a `PivotResult`.
    /// Field plus aggregation, so `sum` and `count` of one field never collide.
    pub fn value_key(&self) -> String {
        format!("{}_{}", self.field, self.aggregation.as_str())
    }

    pub fn display_label(&self) -> &str {
        self.custom_label.as_deref().unwrap_or(&self.label)
    }
}

// ============================================================================
// FILTER DEFINITIONS
// ============================================================================

/// Include-list filter on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub field: String,

    /// Allowed string forms. An empty list leaves the filter inactive.
    #[serde(default)]
    pub values: Vec<String>,

    /// Bucketing applied to both sides before comparison (date fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_grouping: Option<Granularity>,
}

impl FilterSpec {
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterSpec {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            date_grouping: None,
        }
    }

    pub fn with_date_grouping(mut self, granularity: Granularity) -> Self {
        self.date_grouping = Some(granularity);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.values.is_empty()
    }
}

// ============================================================================
// MAIN CONFIG STRUCT
// ============================================================================

/// The complete, serializable definition of a pivot.
/// This is the "source of truth" saved with the report definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// Fields placed on the row axis (ordered from outer to inner).
    #[serde(default)]
    pub rows: Vec<PivotAxisField>,

    /// Fields placed on the column axis (ordered from outer to inner).
    #[serde(default)]
    pub columns: Vec<PivotAxisField>,

    #[serde(default)]
    pub values: Vec<ValueField>,
}

impl PivotConfig {
    /// A pivot is computable once it has at least one measure and one axis field.
    pub fn is_computable(&self) -> bool {
        !self.values.is_empty() && (!self.rows.is_empty() || !self.columns.is_empty())
    }

    /// Every field path the config touches, in rows, columns, values, filters order.
    /// Duplicates are kept; callers that care dedupe.
    pub fn selected_fields(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|f| f.field.as_str())
            .chain(self.columns.iter().map(|f| f.field.as_str()))
            .chain(self.values.iter().map(|f| f.field.as_str()))
            .chain(self.filters.iter().map(|f| f.field.as_str()))
            .collect()
    }

    /// Value keys in declaration order, duplicates removed.
    pub fn value_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.values.len());
        for vf in &self.values {
            let key = vf.value_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computable_invariant() {
        let mut config = PivotConfig::default();
        assert!(!config.is_computable());

        config.values.push(ValueField::new("amount", AggregationType::Sum));
        assert!(!config.is_computable());

        config.columns.push(PivotAxisField::new("region", "Region"));
        assert!(config.is_computable());
    }

    #[test]
    fn test_value_keys_distinguish_aggregations() {
        let sum = ValueField::new("amount", AggregationType::Sum);
        let count = ValueField::new("amount", AggregationType::Count);
        assert_eq!(sum.value_key(), "amount_sum");
        assert_eq!(count.value_key(), "amount_count");
        assert_eq!(sum.label, "Sum of amount");
    }

    #[test]
    fn test_config_json_shape() {
        let json = r#"{
            "filters": [{"field": "date", "values": ["Apr-24"], "dateGrouping": "month"}],
            "rows": [{"field": "region", "label": "Region", "customLabel": "Zone"}],
            "columns": [],
            "values": [{"field": "amount", "label": "Amount", "aggregation": "distinctCount", "scaleFactor": 1000.0}]
        }"#;
        let config: PivotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.filters[0].date_grouping, Some(Granularity::Month));
        assert_eq!(config.rows[0].display_label(), "Zone");
        assert_eq!(config.values[0].aggregation, AggregationType::DistinctCount);

        let back: PivotConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
