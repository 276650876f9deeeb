//! # Record Model
//!
//! A record is a schemaless row owned by the host platform: an object name
//! (e.g. `Account`), an optional id and a bag of JSON field values.
//!
//! Records only get an id once the platform has persisted them, so records
//! seen by a before-insert hook always have `id == None`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier assigned by the platform on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, globally unique id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Records keyed by id, the shape of `oldRecordsById`.
pub type RecordMap = BTreeMap<RecordId, Record>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// May be left empty on update-style calls, the platform fills it in.
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            id: None,
            object: object.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns the text value of a field, `None` for missing or non-text values.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }
}

/// Indexes records by id, dropping records that have not been persisted yet.
pub fn index_by_id<'a>(records: impl IntoIterator<Item = &'a Record>) -> RecordMap {
    records
        .into_iter()
        .filter_map(|record| record.id.clone().map(|id| (id, record.clone())))
        .collect()
}
