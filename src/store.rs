//! Key-value persistence used by profiles.
//!
//! `JsonFileStore` keeps every key in one JSON object on disk and writes it
//! with a copy-validate-replace cycle:
//! 1. serialize the whole map into a sibling `.tmp` file
//! 2. read the temp file back and parse it
//! 3. only then rename it over the original
//!
//! A failed write therefore never leaves a truncated store behind.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn save(&mut self, key: &str, value: Value) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn has(&self, key: &str) -> Result<bool>;
    /// Returns whether the key existed.
    async fn remove(&mut self, key: &str) -> Result<bool>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.bookmark-manager-pro.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".bookmark-manager-pro.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read store {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow!("Store {:?} does not hold a JSON object", self.path)),
        }
    }

    async fn write(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(map)?;
        fs::write(&temp_path, &content)
            .await
            .with_context(|| format!("Failed to write {:?}", temp_path))?;

        let written = fs::read_to_string(&temp_path).await?;
        if let Err(e) = serde_json::from_str::<Value>(&written) {
            let _ = fs::remove_file(&temp_path).await;
            return Err(anyhow!("Verification of {:?} failed: {}", temp_path, e));
        }

        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        debug!("💾 Store written to {:?}", self.path);
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    async fn save(&mut self, key: &str, value: Value) -> Result<()> {
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.write(&map).await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.load().await?.contains_key(key))
    }

    async fn remove(&mut self, key: &str) -> Result<bool> {
        let mut map = self.load().await?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write(&map).await?;
        info!("🗑️  Removed key {} from store", key);
        Ok(true)
    }
}

/// In-process store. `fail_writes` makes every save and remove fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn save(&mut self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("store is read-only"));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn remove(&mut self, key: &str) -> Result<bool> {
        if self.fail_writes {
            return Err(anyhow!("store is read-only"));
        }
        Ok(self.entries.remove(key).is_some())
    }
}
