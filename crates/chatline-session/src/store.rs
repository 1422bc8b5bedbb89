//! Persistent key-value storage and the credential store built on it.
//!
//! The session needs exactly one piece of state to survive a restart: the
//! bearer token. [`KeyValueStore`] is the narrow capability for that
//! (think browser `localStorage`), and [`CredentialStore`] is the typed
//! wrapper the coordinator actually talks to.
//!
//! Storage is best-effort. A failed write is logged and otherwise
//! ignored; the worst case is that the user has to log in again after a
//! restart.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chatline_protocol::Credential;

/// Synchronous string key-value storage local to this machine.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the stored value, or `None` if the key was never set.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A [`KeyValueStore`] held in memory.
///
/// Clones share the same map, so a test can hand one clone to a
/// coordinator, drop the coordinator, and build a new one over another
/// clone to simulate a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A [`KeyValueStore`] that keeps one file per key inside a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write never leaves a half-written token behind. On Unix the
/// files are created readable by the owner only.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Uses `dir` as the storage directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory values are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            ));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, value)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// Persists the session's bearer token under a fixed key.
///
/// None of its methods fail: storage problems are logged at `warn` level
/// and the session carries on with whatever it has in memory.
#[derive(Debug, Clone)]
pub struct CredentialStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Reads the persisted credential, if any. Blank values count as absent.
    pub fn load(&self) -> Option<Credential> {
        match self.store.get(&self.key) {
            Ok(Some(token)) => {
                let credential = Credential::new(token.trim());
                (!credential.is_blank()).then_some(credential)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read stored credential");
                None
            }
        }
    }

    /// Persists `credential`, overwriting any previous one.
    pub fn save(&self, credential: &Credential) {
        if let Err(e) = self.store.set(&self.key, credential.expose()) {
            tracing::warn!(key = %self.key, error = %e, "failed to persist credential");
        }
    }

    /// Removes the persisted credential.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "failed to remove stored credential");
        }
    }
}
