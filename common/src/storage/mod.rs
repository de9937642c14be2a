//! Local persistence layer.
//!
//! A small key-value document store (one JSON document per key) with
//! typed namespaces on top: preferences, analysis history, the session
//! snapshot and the usage counter. The backend is pluggable; when it
//! fails the store keeps working from an in-memory shadow copy and logs
//! the degradation instead of surfacing errors to the caller.

mod history;
mod preferences;
mod session;
mod usage;

pub use history::{AnalysisHistoryItem, NewHistoryItem, HISTORY_CAPACITY};
pub use preferences::{PreferencesUpdate, Theme, UserPreferences};
pub use session::{SessionData, SESSION_TTL_HOURS};
pub use usage::UsageRecord;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub const KEY_USER_PREFERENCES: &str = "insightblast_user_preferences";
pub const KEY_ANALYSIS_HISTORY: &str = "insightblast_analysis_history";
pub const KEY_SESSION_DATA: &str = "insightblast_session_data";
pub const KEY_USAGE_DATA: &str = "insightblast_usage_data";

const NAMESPACE_KEYS: [&str; 4] = [KEY_USER_PREFERENCES, KEY_ANALYSIS_HISTORY, KEY_SESSION_DATA, KEY_USAGE_DATA];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Backends ────────────────────────────────────────────────────────

/// Raw string documents addressed by key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// All documents in one JSON object on disk, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> Result<HashMap<String, String>, StorageError> {
        let content = fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&content)?;
        tracing::info!("Loaded {} storage keys from {:?}", entries.len(), path);
        Ok(entries)
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write to temp file then rename
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.save(&entries) {
            match previous {
                Some(v) => entries.insert(key.to_string(), v),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ── Facade ──────────────────────────────────────────────────────────

/// Typed access to the four namespaces.
///
/// Every write goes to the backend and to an in-memory shadow. After the
/// first backend failure the store is marked degraded and serves the
/// shadow for the rest of its lifetime.
pub struct LocalStorage {
    backend: Box<dyn KeyValueStore>,
    shadow: MemoryStore,
    degraded: AtomicBool,
    // Serializes read-modify-write sequences across namespaces
    write_lock: Mutex<()>,
}

impl LocalStorage {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            shadow: MemoryStore::new(),
            degraded: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// File-backed storage. An unreadable file degrades to memory-only.
    pub fn open(path: &Path) -> Self {
        match FileStore::open(path) {
            Ok(store) => Self::new(Box::new(store)),
            Err(e) => {
                tracing::warn!("Storage at {:?} unavailable, using memory only: {}", path, e);
                let storage = Self::in_memory();
                storage.degraded.store(true, Ordering::SeqCst);
                storage
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Switch to the shadow, first copying over whatever the backend can
    /// still read so persisted documents stay visible.
    fn degrade(&self, op: &str, key: &str, err: &StorageError) {
        if self.is_degraded() {
            return;
        }
        let mut copied = 0;
        for k in NAMESPACE_KEYS {
            if matches!(self.shadow.get(k), Ok(Some(_))) {
                continue;
            }
            if let Ok(Some(value)) = self.backend.get(k) {
                let _ = self.shadow.set(k, value);
                copied += 1;
            }
        }
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(key, copied, "Storage {} failed, falling back to memory: {}", op, err);
        }
    }

    fn raw_get(&self, key: &str) -> Option<String> {
        if !self.is_degraded() {
            match self.backend.get(key) {
                Ok(v) => return v,
                Err(e) => self.degrade("read", key, &e),
            }
        }
        self.shadow.get(key).ok().flatten()
    }

    fn raw_set(&self, key: &str, value: String) {
        if !self.is_degraded() {
            if let Err(e) = self.backend.set(key, value.clone()) {
                self.degrade("write", key, &e);
            }
        }
        let _ = self.shadow.set(key, value);
    }

    fn raw_remove(&self, key: &str) {
        if !self.is_degraded() {
            if let Err(e) = self.backend.remove(key) {
                self.degrade("remove", key, &e);
            }
        }
        let _ = self.shadow.remove(key);
    }

    /// Decode a namespace document. Malformed JSON reads as absent.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.raw_get(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, "Ignoring malformed stored document: {}", e);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.raw_set(key, json),
            Err(e) => tracing::error!(key, "Failed to encode document: {}", e),
        }
    }

    /// Read, transform and write back one document under the write lock.
    fn modify<T, R, F>(&self, key: &str, f: F) -> R
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> (T, R),
    {
        let _guard = lock(&self.write_lock);
        let (next, out) = f(self.read(key));
        self.write(key, &next);
        out
    }

    // ── Bundle ──

    /// Wipe preferences, history and session; reset usage to zero.
    pub fn clear_all(&self) {
        let _guard = lock(&self.write_lock);
        self.raw_remove(KEY_USER_PREFERENCES);
        self.raw_remove(KEY_ANALYSIS_HISTORY);
        self.raw_remove(KEY_SESSION_DATA);
        self.write(KEY_USAGE_DATA, &UsageRecord::default());
        tracing::info!("Cleared all local data");
    }

    pub fn export_all(&self) -> ExportBundle {
        ExportBundle {
            user_preferences: self.read(KEY_USER_PREFERENCES),
            analysis_history: Some(self.history()),
            session: self.session(),
            usage: self.usage(),
            exported_at: Utc::now(),
        }
    }

    /// Replace every namespace present in the bundle; absent ones are kept.
    pub fn import_all(&self, bundle: &ExportBundle) {
        let _guard = lock(&self.write_lock);
        if let Some(prefs) = &bundle.user_preferences {
            self.write(KEY_USER_PREFERENCES, prefs);
        }
        if let Some(history) = &bundle.analysis_history {
            self.write(KEY_ANALYSIS_HISTORY, history);
        }
        if let Some(session) = &bundle.session {
            self.write(KEY_SESSION_DATA, session);
        }
        self.write(KEY_USAGE_DATA, &bundle.usage);
        tracing::info!(
            history = bundle.analysis_history.as_ref().map_or(0, Vec::len),
            "Imported data exported at {}",
            bundle.exported_at
        );
    }

    pub fn import_json(&self, json: &str) -> Result<(), StorageError> {
        let bundle: ExportBundle = serde_json::from_str(json)?;
        self.import_all(&bundle);
        Ok(())
    }
}

/// Snapshot of every namespace, as produced by `export_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub user_preferences: Option<UserPreferences>,
    #[serde(default)]
    pub analysis_history: Option<Vec<AnalysisHistoryItem>>,
    #[serde(default)]
    pub session: Option<SessionData>,
    #[serde(default)]
    pub usage: UsageRecord,
    pub exported_at: DateTime<Utc>,
}
