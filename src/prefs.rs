use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Shape constraint a preference value must satisfy before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Bool,
    Integer,
    Number,
    Str,
    Array,
    Object,
    Any,
}

impl Schema {
    fn matches(self, value: &Value) -> bool {
        match self {
            Schema::Bool => value.is_boolean(),
            Schema::Integer => value.is_i64() || value.is_u64(),
            Schema::Number => value.is_number(),
            Schema::Str => value.is_string(),
            Schema::Array => value.is_array(),
            Schema::Object => value.is_object(),
            Schema::Any => true,
        }
    }
}

/// On-disk envelope, one JSON file per key.
#[derive(Debug, Serialize, Deserialize)]
struct PreferenceRecord {
    version: u32,
    updated_at: String,
    value: Value,
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    schema: Schema,
    version: u32,
}

const UNREGISTERED: Registration = Registration {
    schema: Schema::Any,
    version: 1,
};

/// Schema-validated key/value persistence for user preferences.
///
/// Persistence is best-effort and never load-bearing: `get` falls back to the
/// caller's default on any failure, and `set` only surfaces schema mismatches.
/// Everything else degrades to a logged no-op so preference loss cannot break
/// the host application.
pub struct PreferenceStore {
    dir: PathBuf,
    registry: HashMap<String, Registration>,
}

impl PreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            registry: HashMap::new(),
        }
    }

    /// Declare the schema and record version for `key`. Unregistered keys
    /// accept any JSON value at version 1.
    pub fn register(&mut self, key: impl Into<String>, schema: Schema, version: u32) {
        self.registry
            .insert(key.into(), Registration { schema, version });
    }

    /// Validate and persist `value` under `key`.
    ///
    /// A value that fails the registered schema yields
    /// [`ApiError::SchemaMismatch`] and leaves any prior record untouched.
    /// I/O failures are logged and swallowed.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let registration = self.registration(key);
        if !registration.schema.matches(&value) {
            return Err(ApiError::SchemaMismatch(key.to_string()));
        }

        let Some(path) = self.record_path(key) else {
            log::warn!("preference key '{}' yields no usable file name, skipping", key);
            return Ok(());
        };

        let record = PreferenceRecord {
            version: registration.version,
            updated_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            value,
        };

        if let Err(err) = self.write_record(&path, &record) {
            log::warn!("failed to persist preference '{}': {}", key, err);
        }
        Ok(())
    }

    /// Read the value stored under `key`, or `default` when the record is
    /// missing, unreadable, from a different version, or fails its schema.
    /// Never errors.
    pub fn get(&self, key: &str, default: Value) -> Value {
        let Some(path) = self.record_path(key) else {
            return default;
        };
        let Ok(data) = fs::read_to_string(&path) else {
            return default;
        };
        let record: PreferenceRecord = match serde_json::from_str(&data) {
            Ok(record) => record,
            Err(err) => {
                log::debug!("corrupt preference record {:?}: {}", path, err);
                return default;
            }
        };

        let registration = self.registration(key);
        if record.version != registration.version {
            log::debug!(
                "preference '{}' is version {}, expected {}",
                key,
                record.version,
                registration.version
            );
            return default;
        }
        if !registration.schema.matches(&record.value) {
            log::debug!("preference '{}' no longer matches its schema", key);
            return default;
        }
        record.value
    }

    fn registration(&self, key: &str) -> Registration {
        self.registry.get(key).copied().unwrap_or(UNREGISTERED)
    }

    fn record_path(&self, key: &str) -> Option<PathBuf> {
        let slug = key_slug(key)?;
        let mut path = self.dir.clone();
        path.push(format!("{}.json", slug));
        Some(path)
    }

    fn write_record(&self, path: &Path, record: &PreferenceRecord) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(record)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        fs::write(path, json)
    }
}

/// Convert a preference key into a safe filesystem slug.
fn key_slug(key: &str) -> Option<String> {
    let mut slug = String::new();

    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if matches!(ch, ' ' | '-' | '_' | '.') {
            slug.push(if ch == ' ' { '_' } else { ch });
        }
    }

    if slug.is_empty() {
        None
    } else {
        Some(slug.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_valid_value() {
        let dir = tempdir().unwrap();
        let mut store = PreferenceStore::new(dir.path());
        store.register("theme", Schema::Str, 1);

        store.set("theme", json!("dark")).unwrap();
        assert_eq!(store.get("theme", json!("light")), json!("dark"));
    }

    #[test]
    fn missing_key_returns_default() {
        let dir = tempdir().unwrap();
        let store = PreferenceStore::new(dir.path());
        assert_eq!(store.get("absent", json!(42)), json!(42));
    }

    #[test]
    fn schema_mismatch_on_set_leaves_prior_value() {
        let dir = tempdir().unwrap();
        let mut store = PreferenceStore::new(dir.path());
        store.register("refresh_secs", Schema::Integer, 1);

        store.set("refresh_secs", json!(30)).unwrap();
        let err = store.set("refresh_secs", json!("soon")).unwrap_err();
        assert_eq!(err, ApiError::SchemaMismatch("refresh_secs".to_string()));
        assert_eq!(store.get("refresh_secs", json!(0)), json!(30));
    }

    #[test]
    fn corrupt_payload_reads_as_default() {
        let dir = tempdir().unwrap();
        let mut store = PreferenceStore::new(dir.path());
        store.register("panes", Schema::Array, 1);

        store.set("panes", json!(["CurrentPrice"])).unwrap();
        fs::write(dir.path().join("panes.json"), "{not json").unwrap();
        assert_eq!(store.get("panes", json!([])), json!([]));
    }

    #[test]
    fn version_drift_reads_as_default() {
        let dir = tempdir().unwrap();
        let mut store = PreferenceStore::new(dir.path());
        store.register("layout", Schema::Object, 1);
        store.set("layout", json!({"panes": 2})).unwrap();

        store.register("layout", Schema::Object, 2);
        assert_eq!(store.get("layout", json!({})), json!({}));
    }

    #[test]
    fn schema_drift_reads_as_default() {
        let dir = tempdir().unwrap();
        let mut store = PreferenceStore::new(dir.path());
        store.set("timeframe", json!("1h")).unwrap();

        store.register("timeframe", Schema::Integer, 1);
        assert_eq!(store.get("timeframe", json!(60)), json!(60));
    }

    #[test]
    fn unregistered_key_accepts_any_value() {
        let dir = tempdir().unwrap();
        let store = PreferenceStore::new(dir.path());
        store.set("anything", json!({"a": [1, 2, 3]})).unwrap();
        assert_eq!(
            store.get("anything", Value::Null),
            json!({"a": [1, 2, 3]})
        );
    }

    #[test]
    fn slug_normalizes_keys() {
        assert_eq!(key_slug("Chart Prefs v2"), Some("chart_prefs_v2".into()));
        assert_eq!(key_slug("!!!"), None);
    }
}
