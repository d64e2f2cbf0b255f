//! Human name composite value.
//!
//! Typed composite embedded in record trees (`Element::HumanName`). Carries
//! no reference fields, so the walker only descends into it for completeness.

use serde::{Deserialize, Serialize};

/// Intended use of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameUse {
    Usual,
    Official,
    Temp,
    Nickname,
    Anonymous,
    Old,
    Maiden,
}

/// Time range during which a name was in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// ISO-8601 date or date-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Period {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Name of a human, with parts and usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub name_use: Option<NameUse>,
    /// Full text representation of the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub family: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suffix: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl HumanName {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether no part of the name carries a value.
    pub fn is_empty(&self) -> bool {
        self.name_use.is_none()
            && self.text.as_deref().map_or(true, |text| text.trim().is_empty())
            && all_blank(&self.family)
            && all_blank(&self.given)
            && all_blank(&self.prefix)
            && all_blank(&self.suffix)
            && self.period.as_ref().map_or(true, Period::is_empty)
    }

    pub fn add_family(&mut self, value: impl Into<String>) -> &mut Self {
        self.family.push(value.into());
        self
    }

    pub fn add_given(&mut self, value: impl Into<String>) -> &mut Self {
        self.given.push(value.into());
        self
    }

    pub fn add_prefix(&mut self, value: impl Into<String>) -> &mut Self {
        self.prefix.push(value.into());
        self
    }

    pub fn add_suffix(&mut self, value: impl Into<String>) -> &mut Self {
        self.suffix.push(value.into());
        self
    }

    /// First family name, if any.
    pub fn family_first(&self) -> Option<&str> {
        self.family.first().map(String::as_str)
    }

    pub fn family_as_single_string(&self) -> String {
        join_parts(&self.family)
    }

    pub fn given_as_single_string(&self) -> String {
        join_parts(&self.given)
    }

    /// Display form: explicit `text` wins, otherwise
    /// `prefix given family suffix` joined by single spaces.
    pub fn display_name(&self) -> String {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return text.to_string();
        }

        [&self.prefix, &self.given, &self.family, &self.suffix]
            .into_iter()
            .map(|parts| join_parts(parts))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn all_blank(parts: &[String]) -> bool {
    parts.iter().all(|part| part.trim().is_empty())
}

fn join_parts(parts: &[String]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
