// src/db.rs
//! Storage engines for the record table.
use crate::error::{StoreError, StoreResult};
use crate::models::RecordTable;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable home of the record table. Each `persist` replaces the whole table.
pub trait RecordBackend: Send + Sync {
    fn load(&self) -> StoreResult<RecordTable>;

    fn persist(&self, table: &RecordTable) -> StoreResult<()>;
}

/// bincode-encoded table in a single file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordBackend for FileBackend {
    fn load(&self) -> StoreResult<RecordTable> {
        log::info!("Loading record table from {:?}", self.path);
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No database at {:?} yet, starting with an empty table", self.path);
                return Ok(RecordTable::default());
            }
            Err(e) => {
                log::error!("Failed to open database {:?}: {:?}", self.path, e);
                return Err(StoreError::Io(e));
            }
        };

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(|e| {
            log::error!("Failed to read database {:?}: {:?}", self.path, e);
            StoreError::Io(e)
        })?;

        if contents.is_empty() {
            log::info!("Database {:?} is empty, starting with an empty table", self.path);
            return Ok(RecordTable::default());
        }

        let table: RecordTable = bincode::deserialize(&contents).map_err(|e| {
            let msg = format!("Bincode deserialization failed: {}", e);
            log::error!("load: {}", msg);
            StoreError::Deserialization(msg)
        })?;
        log::info!("Loaded {} records from {:?}", table.records.len(), self.path);
        Ok(table)
    }

    fn persist(&self, table: &RecordTable) -> StoreResult<()> {
        let serialized = bincode::serialize(table).map_err(|e| {
            let msg = format!("Bincode serialization failed: {}", e);
            log::error!("persist: {}", msg);
            StoreError::Serialization(msg)
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                log::info!("Created data directory: {:?}", parent);
            }
        }

        // Write next to the target and rename so a crash never leaves half a table.
        let staging = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)
            .map_err(|e| {
                log::error!("Failed to open {:?} for writing: {:?}", staging, e);
                StoreError::Io(e)
            })?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        fs::rename(&staging, &self.path).map_err(|e| {
            log::error!("Failed to move {:?} into place: {:?}", staging, e);
            StoreError::Io(e)
        })?;

        log::debug!("Persisted {} records to {:?}", table.records.len(), self.path);
        Ok(())
    }
}

/// In-process backend; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: Mutex<RecordTable>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }
}

impl RecordBackend for MemoryBackend {
    fn load(&self) -> StoreResult<RecordTable> {
        let table = self.table.lock().map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(table.clone())
    }

    fn persist(&self, table: &RecordTable) -> StoreResult<()> {
        let mut stored = self.table.lock().map_err(|e| StoreError::Task(e.to_string()))?;
        *stored = table.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountRecord;
    use tempfile::tempdir;

    fn create_test_table() -> RecordTable {
        let mut table = RecordTable::new();
        table.insert(AccountRecord::new(
            "test_service".to_string(),
            "test_user".to_string(),
            "user@example.com".to_string(),
            "pass_1".to_string(),
            "notes1".to_string(),
        ));
        table.insert(AccountRecord::new(
            "another_service".to_string(),
            "another_user".to_string(),
            "another@example.com".to_string(),
            "pass_2".to_string(),
            String::new(),
        ));
        table
    }

    #[test]
    fn test_persist_and_load_table() {
        let dir = tempdir().expect("Failed to create temp dir");
        let backend = FileBackend::new(dir.path().join("accounts.db"));
        let table = create_test_table();

        backend.persist(&table).expect("persist failed");
        let loaded = backend.load().expect("load failed");
        assert_eq!(loaded, table);
        assert!(!dir.path().join("accounts.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_empty_table() {
        let dir = tempdir().expect("Failed to create temp dir");
        let backend = FileBackend::new(dir.path().join("missing.db"));
        let loaded = backend.load().expect("load failed");
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.next_id, 1);
    }

    #[test]
    fn test_persist_creates_parent_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        let backend = FileBackend::new(dir.path().join("nested").join("accounts.db"));
        backend.persist(&create_test_table()).expect("persist failed");
        assert!(backend.path().exists());
    }

    #[test]
    fn test_load_garbage_is_deserialization_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("accounts.db");
        fs::write(&path, b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        match FileBackend::new(&path).load() {
            Err(StoreError::Deserialization(_)) => {}
            other => panic!("Expected Deserialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().records.is_empty());
        let table = create_test_table();
        backend.persist(&table).unwrap();
        assert_eq!(backend.load().unwrap(), table);
    }
}
