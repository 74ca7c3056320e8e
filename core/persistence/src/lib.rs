//! FILENAME: core/persistence/src/lib.rs
//! Report Persistence Module
//!
//! Handles saving and loading report definitions as JSON documents.

mod error;
mod json_store;
mod store;

pub use error::PersistenceError;
pub use json_store::JsonFileStore;
pub use store::{validate_id, MemoryStore, ReportStore};

use pivot_engine::{FilterSpec, PivotConfig, Relationship};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// REPORT DEFINITION
// ============================================================================

/// Everything a user saved about one report.
///
/// Keys this version does not know about are kept in `extra` and written
/// back unchanged, so documents from newer writers survive a load/save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub title: String,

    /// Field paths shown in tabular mode.
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// User-configured relationships. They win over auto-detected ones.
    #[serde(default)]
    pub relationships: Vec<Relationship>,

    /// The live pivot. Serialized as `null` when absent.
    #[serde(default)]
    pub pivot_config: Option<PivotConfig>,

    #[serde(default)]
    pub is_pivot_mode: bool,

    #[serde(default)]
    pub saved_pivots: Vec<SavedPivot>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportDefinition {
    pub fn new(title: impl Into<String>) -> Self {
        ReportDefinition {
            title: title.into(),
            ..Default::default()
        }
    }

    /// The config to compute: the live pivot, when in pivot mode.
    pub fn active_config(&self) -> Option<&PivotConfig> {
        if self.is_pivot_mode {
            self.pivot_config.as_ref()
        } else {
            None
        }
    }

    /// Snapshots `config` under `name` and returns the new entry's id.
    pub fn save_pivot(&mut self, name: impl Into<String>, config: PivotConfig) -> String {
        let saved = SavedPivot::new(name, config);
        let id = saved.id.clone();
        self.saved_pivots.push(saved);
        id
    }

    pub fn saved_pivot(&self, id: &str) -> Option<&SavedPivot> {
        self.saved_pivots.iter().find(|p| p.id == id)
    }

    /// Makes a saved pivot the live one and switches to pivot mode.
    pub fn restore_pivot(&mut self, id: &str) -> bool {
        let Some(config) = self.saved_pivot(id).map(|p| p.config.clone()) else {
            return false;
        };
        self.pivot_config = Some(config);
        self.is_pivot_mode = true;
        true
    }

    pub fn remove_saved_pivot(&mut self, id: &str) -> Option<SavedPivot> {
        let idx = self.saved_pivots.iter().position(|p| p.id == id)?;
        Some(self.saved_pivots.remove(idx))
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A named pivot snapshot inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPivot {
    pub id: String,
    pub name: String,
    pub config: PivotConfig,
}

impl SavedPivot {
    pub fn new(name: impl Into<String>, config: PivotConfig) -> Self {
        SavedPivot {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pivot_engine::{AggregationType, PivotAxisField, ValueField};

    fn pivot() -> PivotConfig {
        PivotConfig {
            filters: vec![],
            rows: vec![PivotAxisField::new("region", "Region")],
            columns: vec![],
            values: vec![ValueField::new("amount", AggregationType::Sum)],
        }
    }

    #[test]
    fn test_saved_pivots_get_unique_ids() {
        let mut report = ReportDefinition::new("Sales");
        let a = report.save_pivot("By region", pivot());
        let b = report.save_pivot("By region again", pivot());
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
        assert_eq!(report.saved_pivot(&b).unwrap().name, "By region again");
    }

    #[test]
    fn test_restore_and_remove() {
        let mut report = ReportDefinition::new("Sales");
        assert!(report.active_config().is_none());

        let id = report.save_pivot("By region", pivot());
        assert!(report.restore_pivot(&id));
        assert_eq!(report.active_config(), Some(&pivot()));
        assert!(!report.restore_pivot("missing"));

        assert!(report.remove_saved_pivot(&id).is_some());
        assert!(report.saved_pivots.is_empty());
    }

    #[test]
    fn test_json_shape_and_null_pivot() {
        let report = ReportDefinition::new("Ledger");
        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["title"], "Ledger");
        assert!(json["pivotConfig"].is_null());
        assert_eq!(json["isPivotMode"], false);
        assert!(json["savedPivots"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let json = r#"{"title":"T","fields":["date"],"filters":[],"relationships":[],
            "pivotConfig":null,"isPivotMode":false,"savedPivots":[],"columnWidths":{"date":120}}"#;
        let report = ReportDefinition::from_json(json).unwrap();
        assert_eq!(report.extra["columnWidths"]["date"], 120);

        let again = ReportDefinition::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(again, report);
    }
}
