//! FILENAME: core/persistence/src/store.rs
//! Report stores keyed by report id.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{PersistenceError, ReportDefinition};

/// Storage for report definitions. Implementations must round-trip a
/// definition unchanged.
pub trait ReportStore {
    fn load(&self, id: &str) -> Result<ReportDefinition, PersistenceError>;

    /// Creates or replaces the report stored under `id`.
    fn save(&self, id: &str, report: &ReportDefinition) -> Result<(), PersistenceError>;

    fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Stored ids, sorted.
    fn list_ids(&self) -> Result<Vec<String>, PersistenceError>;
}

/// Report ids are non-empty and limited to `[A-Za-z0-9_-]`, so they are
/// always safe as file names.
pub fn validate_id(id: &str) -> Result<(), PersistenceError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidId(id.to_string()))
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store. Keeps serialized JSON so it fails the same way a
/// file-backed store would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reports: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.reports.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.reports.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReportStore for MemoryStore {
    fn load(&self, id: &str) -> Result<ReportDefinition, PersistenceError> {
        validate_id(id)?;
        let reports = self.read();
        let json = reports
            .get(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        ReportDefinition::from_json(json)
    }

    fn save(&self, id: &str, report: &ReportDefinition) -> Result<(), PersistenceError> {
        validate_id(id)?;
        let json = report.to_json()?;
        self.write().insert(id.to_string(), json);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        validate_id(id)?;
        self.write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn list_ids(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.read().keys().cloned().collect())
    }
}
