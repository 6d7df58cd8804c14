//! Key-value persistence for conversation state.
//!
//! Every piece of durable state (log, version history, settings, uploaded
//! files) is a JSON-encoded string stored under a well-known key. The
//! controller and the settings store depend on the [`KeyValueStore`] trait,
//! not on the on-disk layout, so tests run against [`MemoryStore`].

use directories::ProjectDirs;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Key under which the conversation log is persisted.
pub const KEY_MESSAGES: &str = "chatMessages";
/// Key under which the version history is persisted.
pub const KEY_HISTORY: &str = "chatHistory";
/// Key under which the API settings are persisted.
pub const KEY_SETTINGS: &str = "apiSettings";
/// Key under which the uploaded-file library is persisted.
pub const KEY_FILES: &str = "uploadedFiles";

#[derive(Debug)]
pub enum StorageError {
    /// Failed to read the value stored under a key.
    Read {
        key: String,
        source: std::io::Error,
    },

    /// Failed to write or remove the value stored under a key.
    Write {
        key: String,
        source: std::io::Error,
    },

    /// No per-user data directory could be determined on this platform.
    NoDataDir,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Read { key, source } => {
                write!(f, "failed to read stored value '{key}': {source}")
            }
            StorageError::Write { key, source } => {
                write!(f, "failed to write stored value '{key}': {source}")
            }
            StorageError::NoDataDir => {
                write!(f, "could not determine a data directory for this platform")
            }
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Read { source, .. } | StorageError::Write { source, .. } => Some(source),
            StorageError::NoDataDir => None,
        }
    }
}

/// The persistence capability injected into the conversation core.
pub trait KeyValueStore {
    /// Returns the stored value for `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing an absent key is not
    /// an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// File-backed store keeping one `<key>.json` file per key in the user's
/// data directory. Writes go through a temp file and an atomic rename so a
/// crash mid-write never leaves a torn value behind.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new() -> Result<Self, StorageError> {
        let proj_dirs =
            ProjectDirs::from("chat", "miaoge", "miaoge").ok_or(StorageError::NoDataDir)?;
        Self::with_dir(proj_dirs.data_dir().to_path_buf())
    }

    /// Opens a store rooted at an explicit directory. Used by tests and by
    /// anyone embedding the core with a custom storage location.
    pub fn with_dir(dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StorageError::Read {
                key: key.to_string(),
                source,
            })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let wrap = |source: std::io::Error| StorageError::Write {
            key: key.to_string(),
            source,
        };

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(wrap)?;
        temp_file.write_all(value.as_bytes()).map_err(wrap)?;
        temp_file.as_file_mut().sync_all().map_err(wrap)?;
        temp_file
            .persist(self.path_for(key))
            .map_err(|err| wrap(err.error))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-memory store. The test double named by the persistence design; also
/// handy for ephemeral sessions that should leave nothing behind.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}
