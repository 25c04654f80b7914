//! Ledger storage.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::LedgerError;
use crate::archive::Archive;

/// Ordered archive records, loaded and saved as a whole.
pub trait Ledger {
    /// Loads every record in insertion order.
    fn load(&self) -> Result<Vec<Archive>, LedgerError>;

    /// Replaces the stored records.
    fn save(&self, archives: &[Archive]) -> Result<(), LedgerError>;

    /// Fails unless the ledger can be loaded.
    fn check(&self) -> Result<(), LedgerError> {
        self.load().map(drop)
    }

    /// Appends one record.
    fn append(&self, archive: Archive) -> Result<(), LedgerError> {
        let mut archives = self.load()?;
        archives.push(archive);
        self.save(&archives)
    }

    /// Clears `exists` on the matching record. Returns `false` when no
    /// existing record matches.
    fn mark_deleted(&self, vault: &str, archive_id: &str) -> Result<bool, LedgerError> {
        let mut archives = self.load()?;
        let Some(archive) = archives
            .iter_mut()
            .find(|a| a.exists && a.vault == vault && a.archive_id == archive_id)
        else {
            return Ok(false);
        };
        archive.exists = false;
        self.save(&archives)?;
        Ok(true)
    }
}

/// Ledger stored as a YAML sequence in a single file.
#[derive(Debug, Clone)]
pub struct YamlLedger {
    path: PathBuf,
}

impl YamlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes an empty ledger unless one already exists. Returns `true`
    /// if a new file was created.
    pub fn init(&self) -> Result<bool, LedgerError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&[])?;
        tracing::info!(path = %self.path.display(), "ledger created");
        Ok(true)
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn yaml_error(&self, source: serde_yaml::Error) -> LedgerError {
        LedgerError::Yaml {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl Ledger for YamlLedger {
    fn load(&self) -> Result<Vec<Archive>, LedgerError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let archives: Vec<Archive> =
            serde_yaml::from_str(&content).map_err(|e| self.yaml_error(e))?;
        tracing::debug!(path = %self.path.display(), records = archives.len(), "ledger loaded");
        Ok(archives)
    }

    fn save(&self, archives: &[Archive]) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let content = serde_yaml::to_string(archives).map_err(|e| self.yaml_error(e))?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), records = archives.len(), "ledger saved");
        Ok(())
    }
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    archives: Mutex<Vec<Archive>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Archive>> {
        self.archives.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Ledger for MemoryLedger {
    fn load(&self) -> Result<Vec<Archive>, LedgerError> {
        Ok(self.lock().clone())
    }

    fn save(&self, archives: &[Archive]) -> Result<(), LedgerError> {
        *self.lock() = archives.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn archive(vault: &str, id: &str) -> Archive {
        Archive {
            vault: vault.into(),
            name: format!("{id}.tar"),
            size: 1024,
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            exists: true,
            location: format!("/-/vaults/{vault}/archives/{id}"),
            archive_id: id.into(),
            checksum: "ab".repeat(32),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));

        match ledger.load().unwrap_err() {
            LedgerError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.check().is_err());
        assert!(ledger.append(archive("v", "A")).is_err());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn init_creates_empty_ledger_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = YamlLedger::new(dir.path().join("nested").join("ledger.yaml"));

        assert!(ledger.init().unwrap());
        assert!(ledger.load().unwrap().is_empty());
        ledger.check().unwrap();

        ledger.append(archive("v", "A")).unwrap();
        assert!(!ledger.init().unwrap());
        assert_eq!(ledger.load().unwrap().len(), 1);
    }

    #[test]
    fn append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));
        ledger.init().unwrap();

        ledger.append(archive("v", "A")).unwrap();
        ledger.append(archive("v", "B")).unwrap();
        ledger.append(archive("w", "C")).unwrap();

        let ids: Vec<String> = ledger
            .load()
            .unwrap()
            .into_iter()
            .map(|a| a.archive_id)
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(!ledger.temp_path().exists());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));
        let records = vec![archive("v", "A"), archive("v", "B")];

        ledger.save(&records).unwrap();
        assert_eq!(ledger.load().unwrap(), records);
    }

    #[test]
    fn corrupt_file_is_yaml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.yaml");
        std::fs::write(&path, "this: [is not a list").unwrap();

        let ledger = YamlLedger::new(&path);
        let err = ledger.load().unwrap_err();
        assert!(matches!(err, LedgerError::Yaml { .. }));
        assert!(err.to_string().contains("ledger.yaml"));
        assert!(matches!(ledger.check(), Err(LedgerError::Yaml { .. })));
    }

    #[test]
    fn empty_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert!(YamlLedger::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn mark_deleted_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = YamlLedger::new(dir.path().join("ledger.yaml"));
        ledger.init().unwrap();
        ledger.append(archive("v", "A")).unwrap();
        ledger.append(archive("v", "B")).unwrap();

        assert!(ledger.mark_deleted("v", "A").unwrap());

        let records = ledger.load().unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].exists);
        assert!(records[1].exists);

        // Already deleted.
        assert!(!ledger.mark_deleted("v", "A").unwrap());
    }

    #[test]
    fn mark_deleted_matches_vault() {
        let ledger = MemoryLedger::new();
        ledger.append(archive("v", "A")).unwrap();

        assert!(!ledger.mark_deleted("other", "A").unwrap());
        assert!(!ledger.mark_deleted("v", "missing").unwrap());
        assert!(ledger.load().unwrap()[0].exists);
    }

    #[test]
    fn memory_ledger_append() {
        let ledger = MemoryLedger::new();
        ledger.append(archive("v", "A")).unwrap();
        ledger.append(archive("v", "B")).unwrap();
        assert_eq!(ledger.load().unwrap().len(), 2);
    }
}
