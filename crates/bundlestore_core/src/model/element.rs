//! Structural field values carried by a record.
//!
//! # Responsibility
//! - Represent the nested field tree of a record as a closed tagged variant.
//! - Define the reference field value that points at other records.
//!
//! # Invariants
//! - A `Reference` never owns its target; it only carries an identifier.
//! - The tree is well-formed by construction: every node is one `Element`.

use crate::model::human_name::HumanName;
use crate::model::id::LogicalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weak pointer to another record, by logical identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<LogicalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn to(target: impl Into<LogicalId>) -> Self {
        Self {
            reference: Some(target.into()),
            display: None,
        }
    }

    /// Returns whether the reference carries a non-empty target identifier.
    pub fn is_populated(&self) -> bool {
        self.reference.as_ref().is_some_and(|id| !id.is_empty())
    }

    pub fn target(&self) -> Option<&LogicalId> {
        self.reference.as_ref().filter(|id| !id.is_empty())
    }

    /// Replaces the target identifier in place.
    pub fn set_target(&mut self, target: LogicalId) {
        self.reference = Some(target);
    }
}

/// One node in a record field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Element {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    /// Coded value from a value set, e.g. `final` or `male`.
    Code(String),
    Reference(Reference),
    HumanName(HumanName),
    /// Nested composite with named children.
    Composite(BTreeMap<String, Element>),
    /// Repeated (multi-valued) field.
    List(Vec<Element>),
}

impl Element {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn reference(target: impl Into<LogicalId>) -> Self {
        Self::Reference(Reference::to(target))
    }

    /// Builds a composite from `(name, element)` pairs.
    pub fn composite<K: Into<String>>(children: impl IntoIterator<Item = (K, Element)>) -> Self {
        Self::Composite(
            children
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Returns whether every decimal under this node is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Decimal(value) => value.is_finite(),
            Self::Composite(children) => children.values().all(Element::is_finite),
            Self::List(items) => items.iter().all(Element::is_finite),
            Self::Bool(_)
            | Self::Integer(_)
            | Self::Text(_)
            | Self::Code(_)
            | Self::Reference(_)
            | Self::HumanName(_) => true,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Looks up a named child of a composite.
    pub fn child(&self, name: &str) -> Option<&Element> {
        match self {
            Self::Composite(children) => children.get(name),
            _ => None,
        }
    }
}
