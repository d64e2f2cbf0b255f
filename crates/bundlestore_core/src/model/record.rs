//! Record domain model.
//!
//! # Responsibility
//! - Define the typed record submitted in bundles and returned by history.
//! - Carry meta information (version, update time, tags) next to content.
//!
//! # Invariants
//! - `type_name` is never blank for records accepted by the store.
//! - `id` is `None` for records the client has never persisted.
//! - Meta is owned by the store; client-supplied `version_id` and
//!   `last_updated` are overwritten on every content write.

use crate::model::element::Element;
use crate::model::id::LogicalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag applied to a record: `(scheme, term)` identity plus a display label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub scheme: String,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Tag {
    pub fn new(scheme: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            term: term.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Store-managed record metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<i64>,
    /// Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// Structured, typed entity persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Serialized as `resourceType` to match external bundle naming.
    #[serde(rename = "resourceType")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LogicalId>,
    #[serde(default)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub fields: BTreeMap<String, Element>,
}

impl Record {
    /// Creates a record with no identifier and no fields.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            meta: RecordMeta::default(),
            fields: BTreeMap::new(),
        }
    }

    /// Creates a record claiming a client-supplied identifier.
    pub fn with_id(type_name: impl Into<String>, id: impl Into<LogicalId>) -> Self {
        let mut record = Self::new(type_name);
        record.id = Some(id.into());
        record
    }

    /// Builder-style field setter.
    pub fn field(mut self, name: impl Into<String>, value: Element) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Element) {
        self.fields.insert(name.into(), value);
    }

    pub fn get_field(&self, name: &str) -> Option<&Element> {
        self.fields.get(name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Client-facing identifier, treating blank identifiers as absent.
    pub fn logical_id(&self) -> Option<&LogicalId> {
        self.id.as_ref().filter(|id| !id.is_empty())
    }

    pub fn add_tag(&mut self, tag: Tag) {
        if !self.meta.tags.contains(&tag) {
            self.meta.tags.push(tag);
        }
    }
}
