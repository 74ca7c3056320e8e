//! FILENAME: core/persistence/src/json_store.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::store::{validate_id, ReportStore};
use crate::{PersistenceError, ReportDefinition};

const EXTENSION: &str = "json";

/// One pretty-printed `<id>.json` per report inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(JsonFileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }
}

fn not_found_as(err: std::io::Error, id: &str) -> PersistenceError {
    if err.kind() == ErrorKind::NotFound {
        PersistenceError::NotFound(id.to_string())
    } else {
        PersistenceError::Io(err)
    }
}

impl ReportStore for JsonFileStore {
    fn load(&self, id: &str) -> Result<ReportDefinition, PersistenceError> {
        let path = self.path_for(id)?;
        let json = fs::read_to_string(&path).map_err(|e| not_found_as(e, id))?;
        ReportDefinition::from_json(&json)
    }

    fn save(&self, id: &str, report: &ReportDefinition) -> Result<(), PersistenceError> {
        let path = self.path_for(id)?;
        let json = report.to_json()?;

        // write-then-rename so readers never see a partial document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        log::debug!("saved report {} to {}", id, path.display());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(id)?;
        fs::remove_file(&path).map_err(|e| not_found_as(e, id))
    }

    fn list_ids(&self) -> Result<Vec<String>, PersistenceError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_id(stem).is_ok() {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
