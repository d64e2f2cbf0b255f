//! Identifier resolution for bundle records.
//!
//! # Responsibility
//! - Classify a record identifier as new or as a durable-key candidate.
//! - Find or create the persisted shell backing each record and derive the
//!   identifier the record ends up with.
//!
//! # Invariants
//! - Classification never fails; malformed identifiers are simply new.
//! - A durable key maps to at most one shell per batch, so re-resolving an
//!   existing key never creates a second shell.
//! - A created shell becomes visible to later records immediately.

use crate::model::id::{DurableKey, LogicalId};
use crate::model::record::Record;
use crate::repo::shell_repo::{PersistedShell, RepoResult, ShellRepository};
use log::debug;
use std::collections::HashMap;

/// Outcome of classifying one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No usable durable key; a fresh shell must be created.
    New,
    /// Token parses as a durable key; an existing shell may match.
    Candidate(DurableKey),
}

impl Resolution {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }

    pub fn durable_key(&self) -> Option<DurableKey> {
        match self {
            Self::New => None,
            Self::Candidate(key) => Some(*key),
        }
    }
}

/// Classifies an identifier against the store's native key grammar.
///
/// Absent, blank, non-numeric and out-of-range tokens are all `New`.
pub fn resolve(id: Option<&LogicalId>) -> Resolution {
    match id.filter(|id| !id.is_empty()).and_then(LogicalId::durable_key) {
        Some(key) => Resolution::Candidate(key),
        None => Resolution::New,
    }
}

/// Identity decision for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// Index of the backing shell in the resolver's shell list.
    pub shell_index: usize,
    /// Identifier the record carried on input, if any.
    pub previous_id: Option<LogicalId>,
    /// Identifier derived from the shell: `Type/durableKey`.
    pub assigned_id: LogicalId,
    /// Whether the shell was created for this record.
    pub created: bool,
}

impl ResolvedRecord {
    /// Returns the `old -> new` pair when the identifier changed textually.
    ///
    /// Records with no previous identifier have nothing to translate from.
    pub fn id_change(&self) -> Option<(&LogicalId, &LogicalId)> {
        self.previous_id
            .as_ref()
            .filter(|previous| **previous != self.assigned_id)
            .map(|previous| (previous, &self.assigned_id))
    }
}

/// Batch-scoped resolver owning the shells found or created so far.
pub struct IdentifierResolver<'r, R: ShellRepository> {
    repo: &'r R,
    shells: Vec<PersistedShell>,
    by_key: HashMap<DurableKey, usize>,
}

impl<'r, R: ShellRepository> IdentifierResolver<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self {
            repo,
            shells: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Finds or creates the shell for `record`.
    ///
    /// # Errors
    /// - Propagates store failures from lookup or shell creation.
    pub fn assign(&mut self, record: &Record) -> RepoResult<ResolvedRecord> {
        let previous_id = record.logical_id().cloned();
        let resolution = resolve(previous_id.as_ref());

        let existing = match resolution.durable_key() {
            Some(key) => self.lookup(key)?,
            None => None,
        };

        let (shell_index, created) = match existing {
            Some(index) => (index, false),
            None => {
                let shell = self.repo.create_shell(record.type_name())?;
                (self.remember(shell), true)
            }
        };

        let key = self.shells[shell_index].key;
        let assigned_id = LogicalId::for_key(record.type_name(), key);

        match (&previous_id, created) {
            (None, _) => debug!(
                "event=bundle_resolve module=service status=created assigned_id={assigned_id}"
            ),
            (Some(previous), true) => debug!(
                "event=bundle_resolve module=service status=created previous_id={previous} assigned_id={assigned_id}"
            ),
            (Some(previous), false) => debug!(
                "event=bundle_resolve module=service status=existing previous_id={previous} assigned_id={assigned_id}"
            ),
        }

        Ok(ResolvedRecord {
            shell_index,
            previous_id,
            assigned_id,
            created,
        })
    }

    pub fn shells(&self) -> &[PersistedShell] {
        &self.shells
    }

    /// Hands the batch's shells over to the commit pass.
    pub fn into_shells(self) -> Vec<PersistedShell> {
        self.shells
    }

    fn lookup(&mut self, key: DurableKey) -> RepoResult<Option<usize>> {
        if let Some(index) = self.by_key.get(&key) {
            return Ok(Some(*index));
        }

        Ok(self
            .repo
            .find_shell_by_key(key)?
            .map(|shell| self.remember(shell)))
    }

    fn remember(&mut self, shell: PersistedShell) -> usize {
        let index = self.shells.len();
        self.by_key.insert(shell.key, index);
        self.shells.push(shell);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve, Resolution};
    use crate::model::id::LogicalId;

    #[test]
    fn absent_and_blank_identifiers_are_new() {
        assert_eq!(resolve(None), Resolution::New);
        assert_eq!(resolve(Some(&LogicalId::parse(""))), Resolution::New);
    }

    #[test]
    fn malformed_tokens_are_new() {
        for token in ["Patient/temp1", "Patient/-3", "Patient/1.5", "abc", "urn:uuid:1"] {
            let id = LogicalId::parse(token);
            assert!(resolve(Some(&id)).is_new(), "{token} should be new");
        }
    }

    #[test]
    fn numeric_tokens_are_candidates() {
        let resolution = resolve(Some(&LogicalId::parse("Patient/42")));
        assert!(!resolution.is_new());
        assert_eq!(resolution.durable_key(), Some(42));

        let bare = resolve(Some(&LogicalId::parse("7")));
        assert_eq!(bare, Resolution::Candidate(7));
    }
}
