//! Flat-file persistence for the job table.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::job::Job;

/// Serializes the entire job table to a single JSON file.
///
/// The file is rewritten in full on every status-affecting mutation; there is
/// no append log and no schema version. Load is tolerant: a missing, unreadable
/// or malformed file yields an empty table so startup never fails on bad state.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted table, or an empty one when nothing usable is on
    /// disk. Problems are logged, never raised.
    pub fn load(&self) -> Vec<Job> {
        if !self.path.exists() {
            return Vec::new();
        }

        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to read job store '{}': {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&data) {
            Ok(jobs) => jobs,
            Err(e) => {
                log::error!("Failed to parse job store '{}': {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Rewrites the whole table. Writes a sibling temp file first, then
    /// renames it over the target so readers never observe a torn file.
    pub fn save(&self, jobs: &[Job]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let serialized = serde_json::to_string(jobs)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized).map_err(|e| StoreError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::ReplaceFile {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}
