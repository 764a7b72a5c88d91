// Durable key-value storage for session tokens

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock(entries: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// JSON object on disk, rewritten on every change.
// The in-memory copy is updated first so a failed write still leaves the
// session usable for the lifetime of the process.
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token store {}", path.display()))?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse token store {}", path.display()))?
            }
        } else {
            tracing::info!("Token store {} not found, starting without a session.", path.display());
            HashMap::new()
        };

        Ok(Self { path, entries: Mutex::new(entries) })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries).context("Failed to serialize token store")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write token store {}", self.path.display()))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}
