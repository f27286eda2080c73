use std::sync::{Mutex, MutexGuard};

use crate::{config::Config, error::SessionError, models::Identity};

pub mod storage;

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Fixed key the identity is persisted under
pub const APP_KEY: &str = "epic_cinema_user";

/// Holds the signed-in identity and persists it across runs
///
/// The orchestrator never reads this directly; callers pass `identity.id`
/// as the subject user explicitly.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    current: Mutex<Option<Identity>>,
}

impl SessionStore {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            current: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// File-backed store in `config.session_dir`, or the platform config dir
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let storage = match &config.session_dir {
            Some(dir) => FileStorage::new(dir.clone()),
            None => FileStorage::default_location()?,
        };
        tracing::debug!(dir = %storage.dir().display(), "Using file session storage");
        Ok(Self::new(storage))
    }

    fn current(&self) -> MutexGuard<'_, Option<Identity>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the signed-in identity, loading it from storage on first use
    ///
    /// A stored value that no longer parses is treated as signed out.
    pub fn get(&self) -> Result<Option<Identity>, SessionError> {
        let mut current = self.current();
        if let Some(identity) = current.as_ref() {
            return Ok(Some(identity.clone()));
        }

        let Some(raw) = self.storage.read(APP_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) => {
                *current = Some(identity.clone());
                Ok(Some(identity))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable stored session");
                Ok(None)
            }
        }
    }

    pub fn set(&self, identity: &Identity) -> Result<(), SessionError> {
        let json = serde_json::to_string(identity)?;
        self.storage.write(APP_KEY, &json)?;
        *self.current() = Some(identity.clone());
        tracing::info!(user_id = identity.id, username = %identity.username, "Session stored");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.remove(APP_KEY)?;
        *self.current() = None;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Convenience for building a subject from the signed-in user
    pub fn user_id(&self) -> Result<Option<i64>, SessionError> {
        Ok(self.get()?.map(|identity| identity.id))
    }
}
