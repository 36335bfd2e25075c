//! Import of settings saved by older releases as plain strings.
//!
//! Older releases kept every setting as a string in a browser-style
//! key/value store, so `"true"`, `"125"` and `"[\"id\"]"` all need their
//! typed form back.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::keys::{SettingKey, ValueKind};
use crate::record::SettingsRecord;

/// Convert a legacy dump into a typed record.
///
/// Keys outside the schema are dropped. Values that cannot be parsed into
/// their expected type are skipped with a warning.
pub fn convert(data: &HashMap<String, String>) -> SettingsRecord {
    let mut record = SettingsRecord::new();

    for (name, raw) in data {
        let Some(key) = SettingKey::from_name(name) else {
            continue;
        };

        match parse_value(key.value_kind(), raw) {
            Some(value) => record.set(key, value),
            None => warn!(key = name.as_str(), "Skipping legacy setting with unparseable value"),
        }
    }

    record
}

fn parse_value(kind: ValueKind, raw: &str) -> Option<Value> {
    match kind {
        ValueKind::Bool => Some(Value::Bool(raw == "true")),
        ValueKind::Number => {
            let raw = raw.trim();
            if let Ok(n) = raw.parse::<i64>() {
                Some(Value::from(n))
            } else {
                raw.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Value::from)
            }
        }
        ValueKind::StringList => match serde_json::from_str::<Value>(raw) {
            Ok(list @ Value::Array(_)) => Some(list),
            _ => None,
        },
        ValueKind::String => Some(Value::String(raw.to_string())),
    }
}
