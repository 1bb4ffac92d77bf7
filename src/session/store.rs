use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use super::storage::{FileStorage, TokenStorage};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::AccessToken;

/// Single source of truth for the current access token.
///
/// Reads come from memory; `save` and `clear` write through to storage.
/// Call [`load`](Self::load) once at startup to pick up a persisted session.
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    key: String,
    current: RwLock<Option<AccessToken>>,
}

impl SessionStore {
    /// Create an empty store over `storage`. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(storage: impl TokenStorage, key: impl Into<String>) -> Self {
        Self {
            storage: Box::new(storage),
            key: key.into(),
            current: RwLock::new(None),
        }
    }

    /// Open the file-backed store described by `config` and load any
    /// persisted session.
    #[must_use]
    pub fn open(config: &ClientConfig) -> Self {
        let store = Self::new(
            FileStorage::new(config.storage_path()),
            config.storage_key(),
        );
        store.load();
        store
    }

    /// Read the persisted token into memory.
    ///
    /// Missing, unreadable or empty values all count as "no session".
    pub fn load(&self) -> Option<AccessToken> {
        let token = match self.storage.get(&self.key) {
            Ok(Some(raw)) => AccessToken::new(raw)
                .inspect_err(|_| tracing::debug!("Ignoring empty persisted token"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Session storage unreadable, starting signed out");
                None
            }
        };
        *self.write() = token.clone();
        token
    }

    /// Persist `token`, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the token could not be persisted; the
    /// in-memory session is left untouched in that case.
    pub fn save(&self, token: AccessToken) -> Result<(), Error> {
        let mut current = self.write();
        self.storage.set(&self.key, token.as_str())?;
        tracing::debug!(token = %token.masked(), "Session saved");
        *current = Some(token);
        Ok(())
    }

    /// Drop the session. Calling this with no session is a no-op.
    pub fn clear(&self) {
        let mut current = self.write();
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
        if current.take().is_some() {
            tracing::debug!("Session cleared");
        }
    }

    /// Drop the session only if it still holds `rejected`.
    ///
    /// Returns `false` and leaves storage alone when the session is empty or
    /// has been replaced by a different token since `rejected` was read.
    pub fn clear_if(&self, rejected: &AccessToken) -> bool {
        let mut current = self.write();
        if current.as_ref() != Some(rejected) {
            return false;
        }
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
        *current = None;
        tracing::debug!(token = %rejected.masked(), "Rejected session cleared");
        true
    }

    /// The token currently held in memory.
    #[must_use]
    pub fn current(&self) -> Option<AccessToken> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<AccessToken>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
