//! FILENAME: core/records/src/record.rs
//! PURPOSE: Record model shared by the catalog, the accessor and the pivot engine.
//! CONTEXT: Records arrive from the record source as JSON-like objects. They are
//! never mutated; every stage borrows them from a `Dataset` snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A voucher or master-data row. Always a JSON object at the top level,
/// with arbitrary nesting below it.
pub type Record = Value;

/// Sentinel label used wherever a value is missing or cannot be bucketed.
pub const BLANK_LABEL: &str = "(blank)";

// ============================================================================
// COLLECTIONS
// ============================================================================

/// The three named collections a report can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Vouchers (transactions).
    Primary,
    /// Customers / ledgers master data.
    Customers,
    /// Stock items master data.
    StockItems,
}

impl Collection {
    /// The reference (master-data) collections, in resolution order.
    pub const REFERENCES: [Collection; 2] = [Collection::Customers, Collection::StockItems];

    /// Name used in field paths and in persisted relationships.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Primary => "primary",
            Collection::Customers => "customers",
            Collection::StockItems => "stockitems",
        }
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        match name.to_ascii_lowercase().as_str() {
            "primary" | "vouchers" => Some(Collection::Primary),
            "customers" => Some(Collection::Customers),
            "stockitems" => Some(Collection::StockItems),
            _ => None,
        }
    }

    /// Path prefix that routes a field to this collection (`customers.`).
    /// The primary collection has none.
    pub fn path_prefix(self) -> Option<&'static str> {
        match self {
            Collection::Primary => None,
            Collection::Customers => Some("customers."),
            Collection::StockItems => Some("stockitems."),
        }
    }

    pub fn is_reference(self) -> bool {
        self != Collection::Primary
    }
}

/// Splits `customers.name` into (`Customers`, `name`).
/// Returns None for paths that do not start with a reference prefix.
pub fn split_reference_path(path: &str) -> Option<(Collection, &str)> {
    Collection::REFERENCES.iter().find_map(|&collection| {
        let prefix = collection.path_prefix()?;
        let head = path.get(..prefix.len())?;
        let rest = path.get(prefix.len()..)?;
        if !rest.is_empty() && head.eq_ignore_ascii_case(prefix) {
            Some((collection, rest))
        } else {
            None
        }
    })
}

// ============================================================================
// DATASET
// ============================================================================

/// Read-only snapshot of all three collections for one computation.
/// Callers clone (or share behind an `Arc`) before a computation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub primary: Vec<Record>,
    #[serde(default)]
    pub customers: Vec<Record>,
    #[serde(default)]
    pub stockitems: Vec<Record>,
}

impl Dataset {
    pub fn new(primary: Vec<Record>) -> Self {
        Dataset {
            primary,
            customers: Vec::new(),
            stockitems: Vec::new(),
        }
    }

    pub fn with_customers(mut self, customers: Vec<Record>) -> Self {
        self.customers = customers;
        self
    }

    pub fn with_stockitems(mut self, stockitems: Vec<Record>) -> Self {
        self.stockitems = stockitems;
        self
    }

    pub fn collection(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Primary => &self.primary,
            Collection::Customers => &self.customers,
            Collection::StockItems => &self.stockitems,
        }
    }
}

// ============================================================================
// VALUE HELPERS
// ============================================================================

/// Null, empty strings and whitespace-only strings carry no value.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Normalizes "no value" to None.
pub fn non_blank(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !is_blank(v))
}

/// Exact key lookup on an object, blank-normalized.
pub fn get_key<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    non_blank(record.as_object()?.get(key))
}

/// Case-insensitive key lookup on an object, blank-normalized.
/// The first matching key in map order wins.
pub fn get_key_ci<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    let map = record.as_object()?;
    map.iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(key))
        .find_map(|(_, v)| non_blank(Some(v)))
}

/// Exact key first, then case-insensitive.
pub fn get_key_any_case<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    get_key(record, key).or_else(|| get_key_ci(record, key))
}

/// Formats a number the way labels expect: integral values lose the `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// String form of a value as used by filters, labels and distinct counts.
pub fn value_to_label(value: &Value) -> String {
    match value {
        Value::Null => BLANK_LABEL.to_string(),
        Value::String(s) if s.trim().is_empty() => BLANK_LABEL.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Array(items) if items.is_empty() => BLANK_LABEL.to_string(),
        other => other.to_string(),
    }
}

/// Same as `value_to_label` for an optional value.
pub fn label_or_blank(value: Option<&Value>) -> String {
    match non_blank(value) {
        Some(v) => value_to_label(v),
        None => BLANK_LABEL.to_string(),
    }
}

/// Parses a numeric-looking string. Thousands separators are tolerated.
pub fn parse_numeric_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric coercion used by aggregation: numbers as is, numeric strings parsed,
/// everything else ignored.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    }
}
