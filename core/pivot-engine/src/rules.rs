//! FILENAME: core/pivot-engine/src/rules.rs
//! Field Rules - Declarative naming knowledge.
//!
//! Everything the engine "knows" about field names lives here as data:
//! which names are always categories, which tokens mark a measure, which
//! arrays are repeating groups, which synonyms a request may stand for.
//! The defaults match ledger/voucher exports; a JSON document can replace
//! any list.

use records::Collection;
use serde::{Deserialize, Serialize};

use crate::error::PivotError;

// ============================================================================
// NAME PATTERNS
// ============================================================================

/// Match rule applied to a lowercase field name (last path segment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamePattern {
    Exact(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

impl NamePattern {
    pub fn matches(&self, lower_name: &str) -> bool {
        match self {
            NamePattern::Exact(p) => lower_name == p,
            NamePattern::Contains(p) => lower_name.contains(p.as_str()),
            NamePattern::Prefix(p) => lower_name.starts_with(p.as_str()),
            NamePattern::Suffix(p) => lower_name.ends_with(p.as_str()),
        }
    }
}

// ============================================================================
// REPEATING GROUPS
// ============================================================================

/// A known array-of-records field inside vouchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatingGroup {
    pub name: String,

    /// Reference collection its entries conventionally join to.
    #[serde(default)]
    pub reference: Option<Collection>,

    /// Ledger postings (switch the customers join to `ledgernameid`).
    #[serde(default)]
    pub ledger_entries: bool,
}

impl RepeatingGroup {
    fn new(name: &str, reference: Option<Collection>, ledger_entries: bool) -> Self {
        RepeatingGroup {
            name: name.to_string(),
            reference,
            ledger_entries,
        }
    }
}

/// A request name and the concrete field names it may stand for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub request: String,
    pub candidates: Vec<String>,
}

/// Last-resort substring scan: a request and the key fragments it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringRule {
    pub request: String,
    pub needles: Vec<String>,
}

// ============================================================================
// FIELD RULES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldRules {
    /// Keys starting with this prefix are internal markers and never fields.
    pub internal_prefix: String,

    /// Leading primary records always sampled by the catalog.
    pub sample_size: usize,

    /// Maximum nesting depth the catalog walks into.
    pub max_depth: usize,

    /// Names that are categories regardless of how numeric they look.
    pub category_patterns: Vec<NamePattern>,

    /// Tokens that mark a measure.
    pub numeric_tokens: Vec<String>,

    /// Measure tokens whose natural default aggregation is an average.
    pub average_tokens: Vec<String>,

    /// Tokens that mark a date field.
    pub date_tokens: Vec<String>,

    pub repeating_groups: Vec<RepeatingGroup>,

    /// Master id key shared by vouchers and master data.
    pub master_id_field: String,

    /// Display-name key of master-data records.
    pub reference_name_field: String,

    pub synonyms: Vec<Synonym>,

    pub substring_rules: Vec<SubstringRule>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldRules {
    fn default() -> Self {
        let category_patterns = vec![
            NamePattern::Contains("date".into()),
            NamePattern::Exact("id".into()),
            NamePattern::Suffix("id".into()),
            NamePattern::Contains("guid".into()),
            NamePattern::Contains("masterid".into()),
            NamePattern::Contains("code".into()),
            NamePattern::Contains("name".into()),
            NamePattern::Suffix("number".into()),
            NamePattern::Contains("phone".into()),
            NamePattern::Contains("mobile".into()),
            NamePattern::Contains("gst".into()),
            NamePattern::Exact("pan".into()),
            NamePattern::Prefix("pan_".into()),
            NamePattern::Contains("panno".into()),
            NamePattern::Contains("pannumber".into()),
            NamePattern::Contains("period".into()),
            NamePattern::Contains("pincode".into()),
            NamePattern::Contains("pin_code".into()),
            NamePattern::Contains("zipcode".into()),
        ];

        FieldRules {
            internal_prefix: "_".to_string(),
            sample_size: 10,
            max_depth: 5,
            category_patterns,
            numeric_tokens: strings(&[
                "amount", "qty", "quantity", "profit", "cost", "expense", "price", "rate",
                "total", "discount", "tax",
            ]),
            average_tokens: strings(&["rate", "price", "percent", "margin"]),
            date_tokens: strings(&["date"]),
            repeating_groups: vec![
                RepeatingGroup::new("allinventoryentries", Some(Collection::StockItems), false),
                RepeatingGroup::new("inventoryentries", Some(Collection::StockItems), false),
                RepeatingGroup::new("ledgerentries", Some(Collection::Customers), true),
                RepeatingGroup::new("allledgerentries", Some(Collection::Customers), true),
                RepeatingGroup::new("batchallocations", None, false),
                RepeatingGroup::new("accountingallocations", None, false),
                RepeatingGroup::new("billallocations", None, false),
            ],
            master_id_field: "masterid".to_string(),
            reference_name_field: "name".to_string(),
            synonyms: vec![
                Synonym {
                    request: "item".into(),
                    candidates: strings(&[
                        "stockitemname",
                        "stockitem",
                        "itemname",
                        "item_name",
                        "allinventoryentries.stockitemname",
                        "inventoryentries.stockitemname",
                    ]),
                },
                Synonym {
                    request: "category".into(),
                    candidates: strings(&[
                        "stockcategory",
                        "stockgroup",
                        "category",
                        "stockitemcategory",
                        "stockitemgroup",
                    ]),
                },
                Synonym {
                    request: "date".into(),
                    candidates: strings(&[
                        "date",
                        "voucherdate",
                        "vchdate",
                        "transactiondate",
                        "txndate",
                    ]),
                },
                Synonym {
                    request: "customer".into(),
                    candidates: strings(&[
                        "partyledgername",
                        "partyname",
                        "customername",
                        "customer",
                        "party",
                    ]),
                },
                Synonym {
                    request: "party".into(),
                    candidates: strings(&[
                        "partyledgername",
                        "partyname",
                        "customername",
                        "customer",
                        "party",
                    ]),
                },
            ],
            substring_rules: vec![
                SubstringRule {
                    request: "item".into(),
                    needles: strings(&["item"]),
                },
                SubstringRule {
                    request: "category".into(),
                    needles: strings(&["category", "group"]),
                },
            ],
        }
    }
}

impl FieldRules {
    /// Loads rules from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, PivotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_internal(&self, key: &str) -> bool {
        !self.internal_prefix.is_empty() && key.starts_with(&self.internal_prefix)
    }

    pub fn is_forced_category(&self, lower_name: &str) -> bool {
        self.category_patterns.iter().any(|p| p.matches(lower_name))
    }

    pub fn has_numeric_token(&self, lower_name: &str) -> bool {
        self.numeric_tokens.iter().any(|t| lower_name.contains(t.as_str()))
    }

    pub fn has_average_token(&self, lower_name: &str) -> bool {
        self.average_tokens.iter().any(|t| lower_name.contains(t.as_str()))
    }

    /// A field is a date field when its last path segment carries a date token.
    pub fn is_date_field(&self, path: &str) -> bool {
        let last = last_segment(path).to_ascii_lowercase();
        self.date_tokens.iter().any(|t| last.contains(t.as_str()))
    }

    pub fn repeating_group(&self, name: &str) -> Option<&RepeatingGroup> {
        self.repeating_groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn is_repeating_group(&self, name: &str) -> bool {
        self.repeating_group(name).is_some()
    }

    pub fn synonyms_for(&self, request: &str) -> Option<&[String]> {
        self.synonyms
            .iter()
            .find(|s| s.request.eq_ignore_ascii_case(request))
            .map(|s| s.candidates.as_slice())
    }

    pub fn substring_needles(&self, request: &str) -> Option<&[String]> {
        self.substring_rules
            .iter()
            .find(|s| s.request.eq_ignore_ascii_case(request))
            .map(|s| s.needles.as_slice())
    }
}

/// Last dotted segment of a path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Leading dotted segment of a path.
pub fn first_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}
