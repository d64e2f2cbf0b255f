//! Logical identifiers and durable store keys.
//!
//! # Responsibility
//! - Parse client-facing identifiers (`Patient/123`, `temp1`,
//!   `http://host/fhir/Patient/7/_history/2`) without ever failing.
//! - Classify whether an identifier token is a store-native durable key.
//!
//! # Invariants
//! - Equality, ordering and hashing use the full textual form only.
//! - `durable_key()` is `Some` only for non-empty ASCII digit tokens that fit
//!   in a non-negative `i64`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Store-native primary key assigned on shell creation.
pub type DurableKey = i64;

const HISTORY_SEGMENT: &str = "_history";

static LOGICAL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<base>.+)/)?(?P<type>[A-Z][A-Za-z0-9]*)/(?P<id>[^/]+)(?:/_history/(?P<version>[^/]+))?$",
    )
    .expect("valid logical id regex")
});

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("valid type name regex"));

/// Client-facing record identifier.
///
/// Parsing is lenient: anything that does not match
/// `[base/]Type/idPart[/_history/version]` is kept as a bare id part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LogicalId {
    value: String,
    base_url: Option<String>,
    type_name: Option<String>,
    id_part: String,
    version: Option<String>,
}

impl LogicalId {
    /// Parses an identifier from its textual form.
    pub fn parse(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();

        if let Some(caps) = LOGICAL_ID_RE.captures(trimmed) {
            let part = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
            return Self {
                base_url: part("base"),
                type_name: part("type"),
                id_part: part("id").unwrap_or_default(),
                version: part("version"),
                value,
            };
        }

        Self {
            base_url: None,
            type_name: None,
            id_part: trimmed.to_string(),
            version: None,
            value,
        }
    }

    /// Builds the canonical `Type/key` identifier for a stored shell.
    pub fn for_key(type_name: &str, key: DurableKey) -> Self {
        Self::parse(format!("{type_name}/{key}"))
    }

    /// Builds the versioned `Type/key/_history/version` identifier.
    pub fn for_version(type_name: &str, key: DurableKey, version: i64) -> Self {
        Self::parse(format!("{type_name}/{key}/{HISTORY_SEGMENT}/{version}"))
    }

    /// Full textual form, exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn id_part(&self) -> &str {
        &self.id_part
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns whether the identifier carries no usable token.
    pub fn is_empty(&self) -> bool {
        self.id_part.is_empty()
    }

    /// Returns the durable key when the id part is a valid store-native key.
    pub fn durable_key(&self) -> Option<DurableKey> {
        parse_durable_key(&self.id_part)
    }

    /// Drops the base URL and version, keeping `Type/idPart` (or the bare id).
    pub fn unqualified_versionless(&self) -> Self {
        match self.type_name.as_deref() {
            Some(type_name) => Self::parse(format!("{type_name}/{}", self.id_part)),
            None => Self::parse(self.id_part.clone()),
        }
    }
}

/// Returns whether `name` parses back as the type segment of `Type/key`.
pub fn is_valid_type_name(name: &str) -> bool {
    TYPE_NAME_RE.is_match(name)
}

/// Parses a store-native key: ASCII digits only, fits in `i64`.
pub fn parse_durable_key(token: &str) -> Option<DurableKey> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<DurableKey>().ok()
}

impl PartialEq for LogicalId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for LogicalId {}

impl Hash for LogicalId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for LogicalId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogicalId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Display for LogicalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<String> for LogicalId {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<LogicalId> for String {
    fn from(value: LogicalId) -> Self {
        value.value
    }
}
