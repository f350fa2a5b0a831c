//! Durable token storage.
//!
//! DESIGN
//! ======
//! Both the session store and the request pipeline read the persisted tokens
//! independently, so storage is the only thing they share. It is kept to a
//! narrow get/set/remove interface over two named entries so tests can swap
//! in memory storage and hosts can pick their own medium.
//!
//! `FileTokenStorage` re-reads the file on every `get`; there is no cache to
//! invalidate when another handle (or another process) rewrites the tokens.
//! Reads report a corrupt file, but writes replace it, so `clear` and
//! `store_pair` always recover from one.

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::net::types::CredentialPair;

// =============================================================================
// KEYS & ERRORS
// =============================================================================

/// One of the two persisted token entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    /// Entry name used in the persisted key-value layout.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing medium could not be read or written.
    #[error("token storage unavailable: {0}")]
    Unavailable(#[from] io::Error),
    /// The backing medium holds something that is not a token map.
    #[error("token storage corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// =============================================================================
// TRAIT
// =============================================================================

/// Client-durable key-value storage for the credential pair.
pub trait TokenStorage: Send + Sync {
    /// Read one entry. `Ok(None)` when it has never been set or was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, key: TokenKey) -> Result<Option<String>, StorageError>;

    /// Write one entry, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn set(&self, key: TokenKey, value: &str) -> Result<(), StorageError>;

    /// Remove one entry. Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn remove(&self, key: TokenKey) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.get(TokenKey::Access)
    }

    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.get(TokenKey::Refresh)
    }

    /// Persist both tokens of a freshly issued pair.
    ///
    /// # Errors
    ///
    /// Returns an error if either entry cannot be written.
    fn store_pair(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        self.set(TokenKey::Access, &pair.access)?;
        self.set(TokenKey::Refresh, &pair.refresh)
    }

    /// Erase both entries. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first failure, after attempting both removals.
    fn clear(&self) -> Result<(), StorageError> {
        let access = self.remove(TokenKey::Access);
        let refresh = self.remove(TokenKey::Refresh);
        access.and(refresh)
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local storage; tokens die with the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<TokenKey, String>>,
}

impl MemoryTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a credential pair.
    #[must_use]
    pub fn with_pair(pair: &CredentialPair) -> Self {
        let storage = Self::new();
        {
            let mut entries = storage.lock();
            entries.insert(TokenKey::Access, pair.access.clone());
            entries.insert(TokenKey::Refresh, pair.refresh.clone());
        }
        storage
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TokenKey, String>> {
        // A poisoned map still holds plain strings; keep serving them.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(&key).cloned())
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key, value.to_owned());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        self.lock().remove(&key);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// Storage backed by a single JSON object file, e.g.
/// `{"access_token": "...", "refresh_token": "..."}`.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let body = serde_json::to_vec_pretty(map)?;
        // Unique sibling so concurrent writers never share a temp file;
        // created owner-only on unix.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut map, dirty) = match self.read_map() {
            Ok(map) => (map, false),
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "token file corrupt; overwriting");
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        if apply(&mut map) || dirty {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StorageError> {
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StorageError> {
        self.update(|map| {
            map.insert(key.as_str().to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        self.update(|map| map.remove(key.as_str()).is_some())
    }
}
