//! Scoped key-value storage pass-through.
//!
//! The host provides two storage scopes: "synced" entries survive restarts
//! and replicate across devices, "session" entries live only for the current
//! process. This crate never implements a persistence engine of its own; it
//! reads and writes opaque string values and leaves durability to whichever
//! backend sits behind the trait.
//!
//! [`MemoryStorage`] backs tests and the session scope; [`FileStorage`]
//! stands in for the host's synced store during standalone runs by keeping
//! the synced map in a toml file under the user config directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const STORAGE_DIR: &str = "queuepad";
const SYNCED_FILE: &str = "synced.toml";

/// Which of the host's two key-value scopes an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Cross-device persisted storage.
    Synced,
    /// Ephemeral, process-local storage.
    Session,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to serialize storage contents: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to parse storage contents: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value storage as provided by the host.
///
/// Values are opaque strings; callers serialize their own payloads. Both
/// operations may suspend and must be tolerated as eventually consistent:
/// a write followed by a read from another task may still observe the old
/// value until a change broadcast lands.
pub trait Storage: Send + Sync + 'static {
    fn get(
        &self,
        scope: StorageScope,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    fn set(
        &self,
        scope: StorageScope,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// In-memory storage backend for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    synced: RwLock<HashMap<String, String>>,
    session: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, scope: StorageScope) -> &RwLock<HashMap<String, String>> {
        match scope {
            StorageScope::Synced => &self.synced,
            StorageScope::Session => &self.session,
        }
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map(scope).read().await.get(key).cloned())
    }

    async fn set(
        &self,
        scope: StorageScope,
        key: &str,
        value: String,
    ) -> Result<(), StorageError> {
        self.map(scope).write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncedContents {
    entries: HashMap<String, String>,
}

/// File-backed storage standing in for the host's synced store.
///
/// The whole synced map is rewritten on every set, matching the host's
/// whole-value semantics. Session entries stay in memory.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    synced: RwLock<HashMap<String, String>>,
    session: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens the default store under the user config directory.
    pub async fn open() -> Result<Self, StorageError> {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(STORAGE_DIR);
        path.push(SYNCED_FILE);
        Self::open_at(path).await
    }

    /// Opens a store at an explicit path. Missing files start empty.
    pub async fn open_at(path: PathBuf) -> Result<Self, StorageError> {
        let synced = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            let contents: SyncedContents = toml::from_str(&content)?;
            info!(
                "Loaded {} synced storage entries from {}",
                contents.entries.len(),
                path.display()
            );
            contents.entries
        } else {
            debug!("No synced storage file at {}, starting empty", path.display());
            HashMap::new()
        };

        Ok(Self {
            path,
            synced: RwLock::new(synced),
            session: RwLock::new(HashMap::new()),
        })
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !tokio::fs::try_exists(parent).await? {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = toml::to_string_pretty(&SyncedContents {
            entries: entries.clone(),
        })?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

impl Storage for FileStorage {
    async fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>, StorageError> {
        let map = match scope {
            StorageScope::Synced => &self.synced,
            StorageScope::Session => &self.session,
        };
        Ok(map.read().await.get(key).cloned())
    }

    async fn set(
        &self,
        scope: StorageScope,
        key: &str,
        value: String,
    ) -> Result<(), StorageError> {
        match scope {
            StorageScope::Session => {
                self.session.write().await.insert(key.to_string(), value);
                Ok(())
            }
            StorageScope::Synced => {
                let mut guard = self.synced.write().await;
                guard.insert(key.to_string(), value);
                self.flush(&guard).await
            }
        }
    }
}
