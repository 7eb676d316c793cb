//! One-file-per-slot backend

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use super::SlotBackend;
use crate::error::StorageError;

/// Stores each slot as `<dir>/<key>.json`.
///
/// Writes land in a sibling temp file that is renamed over the slot, so a
/// failed write leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
        if !valid {
            return Err(StorageError::Backend(format!("invalid slot key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SlotBackend for FileBackend {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        })();

        if let Err(error) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(error.into());
        }
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn describe(&self) -> String {
        format!("files in {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("data")).unwrap();

        assert_eq!(backend.read_slot("briqwerk_last_sync").unwrap(), None);
        backend
            .write_slot("briqwerk_last_sync", "2024-06-01T10:00:00Z")
            .unwrap();
        backend.write_slot("briqwerk_last_sync", "2024-06-02T10:00:00Z").unwrap();

        assert_eq!(
            backend.read_slot("briqwerk_last_sync").unwrap().as_deref(),
            Some("2024-06-02T10:00:00Z")
        );
        assert!(dir.path().join("data/briqwerk_last_sync.json").exists());
        assert!(!dir.path().join("data/briqwerk_last_sync.json.tmp").exists());

        backend.remove_slot("briqwerk_last_sync").unwrap();
        backend.remove_slot("briqwerk_last_sync").unwrap();
        assert_eq!(backend.read_slot("briqwerk_last_sync").unwrap(), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let error = backend.write_slot("../escape", "x").unwrap_err();
        assert_eq!(error.code(), "STORAGE_BACKEND");
        assert!(backend.read_slot("").is_err());
    }
}
