//! Typed, namespaced, failure-tolerant access to runtime state
//!
//! Reads never fail: a missing key, a backend error or an undecodable value
//! all read as the empty default. Writes are best effort: failures are
//! logged and dropped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StorageError;
use crate::storage::{KeyValueStore, MemoryStore, StoredActiveSession};

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "coursetimers";

const ACTIVE_SESSION_KEY: &str = "activeSession";
const OFFSETS_KEY: &str = "timerOffsets";
const ELAPSED_KEY: &str = "timerElapsed";
const SESSION_ADJUSTMENTS_KEY: &str = "sessionAdjustments";
const USERNAME_KEY: &str = "username";

/// Runtime state persisted between runs
#[derive(Clone)]
pub struct LocalState {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalState")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl LocalState {
    /// Wrap a key-value backend under `namespace`
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// State kept only in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_NAMESPACE)
    }

    /// Key namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, name)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let key = self.key(name);
        let bytes = match self.store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, "Failed to read local state: {}", e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, "Ignoring unreadable local state: {}", e);
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        let key = self.key(name);
        let result = serde_json::to_vec(value)
            .map_err(StorageError::from)
            .and_then(|bytes| self.store.set(&key, &bytes));
        if let Err(e) = result {
            tracing::warn!(key = %key, "Failed to write local state: {}", e);
        }
    }

    fn remove(&self, name: &str) {
        let key = self.key(name);
        if let Err(e) = self.store.remove(&key) {
            tracing::warn!(key = %key, "Failed to clear local state: {}", e);
        }
    }

    /// Map of string to number, tolerating non-numeric values as 0
    fn read_number_map(&self, name: &str) -> HashMap<String, i64> {
        let raw: HashMap<String, Value> = self.read_json(name).unwrap_or_default();
        raw.into_iter()
            .map(|(key, value)| (key, number_or_zero(&value)))
            .collect()
    }

    /// Last saved active session snapshot
    pub fn load_active_session(&self) -> Option<StoredActiveSession> {
        self.read_json(ACTIVE_SESSION_KEY)
    }

    /// Save, or clear with `None`, the active session snapshot
    pub fn save_active_session(&self, snapshot: Option<&StoredActiveSession>) {
        match snapshot {
            Some(snapshot) => self.write_json(ACTIVE_SESSION_KEY, snapshot),
            None => self.remove(ACTIVE_SESSION_KEY),
        }
    }

    /// Per-timer offsets
    pub fn load_offsets(&self) -> HashMap<String, i64> {
        self.read_number_map(OFFSETS_KEY)
    }

    /// Save per-timer offsets
    pub fn save_offsets(&self, offsets: &HashMap<String, i64>) {
        self.write_json(OFFSETS_KEY, offsets);
    }

    /// Per-timer banked elapsed seconds; negative values read as 0
    pub fn load_banked(&self) -> HashMap<String, u64> {
        self.read_number_map(ELAPSED_KEY)
            .into_iter()
            .map(|(key, value)| (key, value.max(0) as u64))
            .collect()
    }

    /// Save per-timer banked elapsed seconds
    pub fn save_banked(&self, banked: &HashMap<String, u64>) {
        self.write_json(ELAPSED_KEY, banked);
    }

    /// All stored session adjustments
    pub fn load_session_adjustments(&self) -> HashMap<String, i64> {
        self.read_number_map(SESSION_ADJUSTMENTS_KEY)
    }

    /// Stored adjustment for one session, 0 when unseen
    pub fn session_adjustment(&self, session_id: &str) -> i64 {
        self.load_session_adjustments()
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    /// Record the adjustment of one session
    pub fn save_session_adjustment(&self, session_id: &str, seconds: i64) {
        let mut stored = self.load_session_adjustments();
        stored.insert(session_id.to_string(), seconds);
        self.write_json(SESSION_ADJUSTMENTS_KEY, &stored);
    }

    /// Forget the adjustment of a session that has ended
    pub fn remove_session_adjustment(&self, session_id: &str) {
        let mut stored = self.load_session_adjustments();
        if stored.remove(session_id).is_some() {
            self.write_json(SESSION_ADJUSTMENTS_KEY, &stored);
        }
    }

    /// Stored username, if any
    pub fn username(&self) -> Option<String> {
        self.read_json::<String>(USERNAME_KEY)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Store the username
    pub fn set_username(&self, username: &str) {
        self.write_json(USERNAME_KEY, username);
    }
}

/// Numeric value of a stored entry; anything else is 0
fn number_or_zero(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.trunc() as i64).unwrap_or(0),
        _ => 0,
    }
}
