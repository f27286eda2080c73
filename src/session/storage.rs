use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::error::SessionError;

/// Durable key/value storage behind the session store
pub trait SessionStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn write(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.config/cinema-recs` or the platform equivalent
    pub fn default_location() -> Result<Self, SessionError> {
        dirs::config_dir()
            .map(|d| Self::new(d.join("cinema-recs")))
            .ok_or(SessionError::NoStorageLocation)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SessionStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half-written session
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage, mostly for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.read("k").unwrap(), None);
        storage.write("k", r#"{"id":1}"#).unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some(r#"{"id":1}"#));
        assert!(dir.path().join("nested").join("k.json").exists());

        storage.remove("k").unwrap();
        assert_eq!(storage.read("k").unwrap(), None);
    }

    #[test]
    fn test_file_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.remove("never-written").is_ok());
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.write("a", "1").unwrap();
        storage.write("a", "2").unwrap();
        assert_eq!(storage.read("a").unwrap().as_deref(), Some("2"));
        storage.remove("a").unwrap();
        assert_eq!(storage.read("a").unwrap(), None);
    }
}
