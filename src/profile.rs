//! User profile facts: the only values the agent may type into a page.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile record is corrupt: {0}")]
    Corrupt(String),
}

/// Flat semantic key → value mapping, e.g. `"Email" → "a@b.com"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(BTreeMap<String, String>);

impl UserProfile {
    pub fn new() -> Self {
        UserProfile::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// `self` overlaid with `task_data`; task data wins on collisions.
    pub fn merged_with(&self, task_data: &UserProfile) -> UserProfile {
        let mut merged = self.clone();
        for (key, value) in task_data.iter() {
            merged.insert(key, value);
        }
        merged
    }

    /// Reads a JSON object. Scalars are kept as their text, nulls are dropped.
    pub fn from_json_value(value: Value) -> Result<Self, StoreError> {
        let Value::Object(fields) = value else {
            return Err(StoreError::Corrupt(format!("expected a JSON object, got {}", value)));
        };
        Ok(fields
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(text) => Some((key, text)),
                other => Some((key, other.to_string())),
            })
            .collect())
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        if json.trim().is_empty() {
            return Ok(UserProfile::default());
        }
        let value = serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        UserProfile::from_json_value(value)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserProfile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        UserProfile(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

/// Asynchronous key-value persistence for named profile records.
#[async_trait(?Send)]
pub trait ProfileStore {
    /// The record, or an empty profile when it was never saved.
    async fn load(&self, record: &str) -> Result<UserProfile, StoreError>;
    async fn save(&self, record: &str, profile: &UserProfile) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    records: RefCell<HashMap<String, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        MemoryProfileStore::default()
    }

    pub fn with_record(record: &str, profile: UserProfile) -> Self {
        let store = MemoryProfileStore::default();
        store.records.borrow_mut().insert(record.to_string(), profile);
        store
    }
}

#[async_trait(?Send)]
impl ProfileStore for MemoryProfileStore {
    async fn load(&self, record: &str) -> Result<UserProfile, StoreError> {
        Ok(self.records.borrow().get(record).cloned().unwrap_or_default())
    }

    async fn save(&self, record: &str, profile: &UserProfile) -> Result<(), StoreError> {
        self.records.borrow_mut().insert(record.to_string(), profile.clone());
        Ok(())
    }
}

/// Profile records kept as JSON objects in `window.localStorage`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageProfileStore;

#[cfg(target_arch = "wasm32")]
impl LocalStorageProfileStore {
    fn storage() -> Result<web_sys::Storage, StoreError> {
        let window = web_sys::window()
            .ok_or_else(|| StoreError::Unavailable("no global window".to_string()))?;
        window
            .local_storage()
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))?
            .ok_or_else(|| StoreError::Unavailable("localStorage is disabled".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl ProfileStore for LocalStorageProfileStore {
    async fn load(&self, record: &str) -> Result<UserProfile, StoreError> {
        let raw = Self::storage()?
            .get_item(record)
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))?;
        match raw {
            Some(json) => UserProfile::from_json(&json),
            None => Ok(UserProfile::default()),
        }
    }

    async fn save(&self, record: &str, profile: &UserProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Self::storage()?
            .set_item(record, &json)
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }
}
