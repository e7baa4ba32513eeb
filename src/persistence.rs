//! Durable storage of the selected language.

use crate::error::{I18nError, I18nResult};
use crate::language::LanguageCode;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Key under which the selected language is stored
pub const LANGUAGE_KEY: &str = "language";

/// Host-provided durable key-value store holding string values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read `key`; `Ok(None)` when it was never written
    async fn get(&self, key: &str) -> I18nResult<Option<String>>;

    /// Write `value` under `key`
    async fn set(&self, key: &str, value: &str) -> I18nResult<()>;
}

/// The persisted "selected language" preference
#[derive(Clone)]
pub struct LanguagePreference {
    store: Arc<dyn KeyValueStore>,
}

impl LanguagePreference {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self) -> I18nResult<Option<LanguageCode>> {
        let value = self.store.get(LANGUAGE_KEY).await?;
        Ok(value.filter(|v| !v.is_empty()).map(LanguageCode::from))
    }

    pub async fn set(&self, language: &LanguageCode) -> I18nResult<()> {
        self.store.set(LANGUAGE_KEY, language.as_str()).await
    }

    /// The stored language, or `default` when absent or unreadable
    pub async fn get_or(&self, default: &LanguageCode) -> LanguageCode {
        match self.get().await {
            Ok(Some(language)) => language,
            Ok(None) => default.clone(),
            Err(e) => {
                warn!("Failed to read language preference, using '{}': {}", default, e);
                default.clone()
            }
        }
    }
}

/// In-memory store for tests; reads and writes can be made to fail
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current value of `key`, bypassing failure simulation
    pub fn peek(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> I18nResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(I18nError::PersistenceRead("Simulated read failure".to_string()));
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> I18nResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(I18nError::PersistenceWrite("Simulated write failure".to_string()));
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Stores values as a flat JSON object in a single file
///
/// A missing file reads as an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(format!("Failed to read '{}': {}", self.path.display(), e)),
        };

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse '{}': {}", self.path.display(), e))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> I18nResult<Option<String>> {
        let values = self.read_all().await.map_err(I18nError::PersistenceRead)?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> I18nResult<()> {
        let _guard = self.write_lock.lock().await;

        // An unreadable file is replaced rather than blocking every future write
        let mut values = self.read_all().await.unwrap_or_else(|e| {
            warn!("{}; starting from an empty store", e);
            BTreeMap::new()
        });
        values.insert(key.to_owned(), value.to_owned());

        let content = serde_json::to_string_pretty(&values)
            .map_err(|e| I18nError::PersistenceWrite(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                I18nError::PersistenceWrite(format!(
                    "Failed to create '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            I18nError::PersistenceWrite(format!("Failed to write '{}': {}", self.path.display(), e))
        })
    }
}
