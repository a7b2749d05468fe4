//! Structured record types built from template matches.
//!
//! Records are built once from matched rows and never mutated afterwards;
//! downstream stages only read them or merge them into summary views.

mod merge;

pub use merge::merge_by_hostname;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::template::Record;

/// A record type that can participate in a hostname-keyed merge.
pub trait FieldRecord {
    /// Hostname the record describes.
    fn hostname(&self) -> &str;

    /// Flat field view used by the merge.
    fn to_fields(&self) -> IndexMap<String, Value>;
}

/// Per-device facts from a version/info query.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRecord {
    pub hostname: String,
    pub fields: IndexMap<String, Value>,
}

impl InfoRecord {
    /// Build from a single template row.
    pub fn from_row(hostname: impl Into<String>, row: &Record) -> Self {
        let fields = row
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Self {
            hostname: hostname.into(),
            fields,
        }
    }

    /// Insert an extra field known from the inventory (e.g. address).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// String view of one field, if present and a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

impl FieldRecord for InfoRecord {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn to_fields(&self) -> IndexMap<String, Value> {
        self.fields.clone()
    }
}

/// Per-device user table: username to attribute map.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub hostname: String,
    pub users: IndexMap<String, IndexMap<String, String>>,
}

impl UserRecord {
    /// Build from template rows; `key` names the username column, the other
    /// columns become that user's attributes.
    pub fn from_rows(hostname: impl Into<String>, rows: &[Record], key: &str) -> Self {
        let mut users = IndexMap::new();
        for row in rows {
            let Some(username) = row.get(key) else {
                continue;
            };
            let attrs: IndexMap<String, String> = row
                .iter()
                .filter(|(name, _)| name.as_str() != key)
                .map(|(name, value)| (name.clone(), value.as_str().to_string()))
                .collect();
            users.insert(username.as_str().trim_matches('"').to_string(), attrs);
        }
        Self {
            hostname: hostname.into(),
            users,
        }
    }

    /// Whether a user of this name exists on the device.
    pub fn has_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }
}

/// Per-device installed package table: package name to attribute map.
#[derive(Debug, Clone, Serialize)]
pub struct PackageRecord {
    pub hostname: String,
    pub packages: IndexMap<String, IndexMap<String, String>>,
}

impl PackageRecord {
    /// Build from template rows; `key` names the package-name column.
    pub fn from_rows(hostname: impl Into<String>, rows: &[Record], key: &str) -> Self {
        let mut packages = IndexMap::new();
        for row in rows {
            let Some(name) = row.get(key) else {
                continue;
            };
            let attrs: IndexMap<String, String> = row
                .iter()
                .filter(|(field, _)| field.as_str() != key)
                .map(|(field, value)| (field.clone(), value.as_str().to_string()))
                .collect();
            packages.insert(name.as_str().to_string(), attrs);
        }
        Self {
            hostname: hostname.into(),
            packages,
        }
    }
}

impl FieldRecord for PackageRecord {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn to_fields(&self) -> IndexMap<String, Value> {
        let packages: serde_json::Map<String, Value> = self
            .packages
            .iter()
            .map(|(name, attrs)| {
                let attrs: serde_json::Map<String, Value> = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                (name.clone(), Value::Object(attrs))
            })
            .collect();
        IndexMap::from([("packages".to_string(), Value::Object(packages))])
    }
}

/// Merged per-device view over two record collections. Fields present in
/// either source always appear; absent ones hold the `Null` sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub hostname: String,
    pub fields: IndexMap<String, Value>,
}

impl SummaryRecord {
    /// Field lookup; `Null` means "known field, absent for this device".
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String view of one field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Installed package names, when a package map was merged in.
    pub fn package_names(&self) -> Vec<String> {
        match self.fields.get("packages") {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Reported free memory in bytes, from the MiB field.
    pub fn free_memory_bytes(&self) -> Option<u64> {
        let mib: f64 = self.str_field("freememory")?.parse().ok()?;
        Some((mib * 1024.0 * 1024.0) as u64)
    }
}
