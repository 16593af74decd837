//! Persisted credential slots
//!
//! Three string slots keyed by name: access credential, renewal credential and
//! role. A missing access slot means "not authenticated".

use crate::error::Result;
use papaya::HashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_ROLE_KEY: &str = "user_role";

/// Every slot this client owns
pub const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ROLE_KEY];

/// Key/value storage for credential slots.
///
/// Values are replaced wholesale; nothing is ever edited in place.
pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn remove(&self, key: &str);

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove every slot this client owns
    fn clear(&self) {
        for key in ALL_KEYS {
            self.remove(key);
        }
    }
}

/// Thread-safe in-memory slot store using Papaya HashMap
#[derive(Clone)]
pub struct TokenStore {
    slots: Arc<HashMap<String, String>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(HashMap::new()),
        }
    }

    /// Keys currently holding a value
    pub fn keys(&self) -> Vec<String> {
        self.slots.pin().iter().map(|(k, _)| k.clone()).collect()
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.slots
            .pin()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for TokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.pin().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.slots.pin().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.slots.pin().remove(key);
    }
}

/// Slot store mirrored to a TOML file.
///
/// The in-memory copy is authoritative; a failed write is logged and the
/// process keeps running with the values it has.
#[derive(Clone)]
pub struct FileTokenStore {
    memory: TokenStore,
    path: Arc<PathBuf>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let memory = TokenStore::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let slots: BTreeMap<String, String> = toml::from_str(&content)?;
            for (key, value) in slots {
                memory.set(&key, value);
            }
            debug!(path = %path.display(), "Loaded credential slots");
        }

        Ok(Self {
            memory,
            path: Arc::new(path),
        })
    }

    fn flush(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string(&self.memory.snapshot())?;
        fs::write(self.path.as_path(), content)?;
        Ok(())
    }

    fn flush_or_warn(&self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "Failed to persist credential slots");
        }
    }
}

impl CredentialStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.memory.get(key)
    }

    fn set(&self, key: &str, value: String) {
        self.memory.set(key, value);
        self.flush_or_warn();
    }

    fn remove(&self, key: &str) {
        self.memory.remove(key);
        self.flush_or_warn();
    }

    fn clear(&self) {
        for key in ALL_KEYS {
            self.memory.remove(key);
        }
        self.flush_or_warn();
    }
}
