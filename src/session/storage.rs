//! Durable key-value slots for sessions and preferences
//!
//! Stores raw bytes under fixed keys. The session collection and the theme
//! preference live side by side but are read and written independently.

use crate::error::{ChatdeckError, Result};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Key holding the serialized session collection
pub const SESSIONS_KEY: &str = "chat_sessions";

/// Key holding the theme preference
pub const THEME_KEY: &str = "theme";

/// A durable byte-oriented key-value slot
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value stored under `key`
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Key-value slot backed by an embedded `sled` database
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::session::{KeyValueStore, SledStore};
    ///
    /// # fn main() -> chatdeck::error::Result<()> {
    /// let dir = tempfile::TempDir::new()?;
    /// let store = SledStore::open(dir.path().join("sessions.sled"))?;
    /// store.put("theme", b"dark")?;
    /// assert_eq!(store.get("theme")?, Some(b"dark".to_vec()));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ChatdeckError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    /// Open a throwaway database that is removed when dropped
    #[cfg(test)]
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ChatdeckError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| ChatdeckError::Storage(format!("Get failed: {}", e)))?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| ChatdeckError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| ChatdeckError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }
}

/// Process-local key-value slot, used for `--ephemeral` runs and tests
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self
            .values
            .lock()
            .map_err(|_| ChatdeckError::Storage("Memory store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ChatdeckError::Storage("Memory store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
