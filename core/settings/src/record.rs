//! The flat settings record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use authbackup_common::StorageLocation;

use crate::keys::{is_local_only, SettingKey};

/// A flat key to JSON-value mapping.
///
/// A cleared setting is an absent key; there is no stored `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsRecord(BTreeMap<String, Value>);

impl SettingsRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.0.get(key.as_ref())
    }

    /// String value, treating empty strings as unset.
    pub fn get_str(&self, key: impl AsRef<str>) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: impl AsRef<str>) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: impl AsRef<str>) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Set a value. `Value::Null` removes the key.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            self.0.remove(key.as_ref());
        } else {
            self.0.insert(key.as_ref().to_string(), value);
        }
    }

    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Value> {
        self.0.remove(key.as_ref())
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.0.contains_key(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` onto this record; `other` wins on conflicts.
    pub fn merge_from(&mut self, other: &SettingsRecord) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// `base` overlaid with `top`.
    pub fn merged(base: &SettingsRecord, top: &SettingsRecord) -> SettingsRecord {
        let mut merged = base.clone();
        merged.merge_from(top);
        merged
    }

    /// Split into `(local_only, syncable)` by key.
    ///
    /// # Postconditions
    /// - Every key lands in exactly one half
    /// - Tokens, revoked flags and the storage marker land in the first half
    pub fn split(&self) -> (SettingsRecord, SettingsRecord) {
        let mut local = SettingsRecord::new();
        let mut syncable = SettingsRecord::new();
        for (key, value) in &self.0 {
            if is_local_only(key) {
                local.0.insert(key.clone(), value.clone());
            } else {
                syncable.0.insert(key.clone(), value.clone());
            }
        }
        (local, syncable)
    }

    /// Storage-location marker, if present and well-formed.
    pub fn storage_location(&self) -> Option<StorageLocation> {
        self.get_str(SettingKey::StorageLocation)
            .and_then(|s| s.parse().ok())
    }

    pub fn set_storage_location(&mut self, location: StorageLocation) {
        self.set(SettingKey::StorageLocation, location.as_str());
    }
}

impl FromIterator<(String, Value)> for SettingsRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = SettingsRecord::new();
        for (key, value) in iter {
            record.set(key, value);
        }
        record
    }
}
