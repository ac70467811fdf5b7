//! JSON snapshot file for file-backed stores.
//!
//! The whole table set is rewritten on every commit. Writes go to a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::tables::Tables;

/// Snapshot file format version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SnapshotDocument {
    version: u32,
    tables: Tables,
}

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tables, or `None` if no snapshot has been written yet.
    pub(crate) fn load(&self) -> Result<Option<Tables>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        let document: SnapshotDocument =
            serde_json::from_str(&contents).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;

        if document.version != SNAPSHOT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported snapshot version {}",
                document.version
            )));
        }

        document.tables.validate().map_err(|reason| self.corrupt(reason))?;
        Ok(Some(document.tables))
    }

    /// Atomically replace the snapshot with `tables`.
    ///
    /// Creates parent directories if they don't exist.
    pub(crate) fn save(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            tables: tables.clone(),
        };
        let json = serde_json::to_string_pretty(&document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.tmp_path();
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Route, Stop};
    use crate::store::tables::Transaction;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_tables() -> Tables {
        let route = Route::new(Utc::now());
        let id = route.id.clone();
        let mut tx = Transaction::new(Tables::default());
        tx.insert_route(route);
        tx.append_stop(&id, Stop::new("1 Main", "X"));
        tx.into_tables()
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("routes.json"));
        let tables = sample_tables();

        file.save(&tables).unwrap();
        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded, tables);
        assert!(!file.tmp_path().exists());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"));
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("routes.json");
        let file = SnapshotFile::new(&path);
        file.save(&Tables::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn garbage_is_a_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, "not json").unwrap();
        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn wrong_version_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "tables": {"routes": {}, "stops": {}}}"#,
        )
        .unwrap();
        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn invariant_violation_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let stop = Stop::new("1 Main", "X");
        let mut stops = serde_json::Map::new();
        stops.insert(stop.id.to_string(), serde_json::to_value(&stop).unwrap());
        let json = serde_json::json!({
            "version": 1,
            "tables": {
                "routes": {},
                "stops": stops,
            }
        });
        std::fs::write(&path, json.to_string()).unwrap();
        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("belongs to no route"));
    }
}
