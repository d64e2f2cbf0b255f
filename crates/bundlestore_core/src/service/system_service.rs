//! System-level bundle transaction service.
//!
//! # Responsibility
//! - Persist a bundle of records as one atomic unit of work.
//! - Translate client identifiers to store-assigned ones and rewrite every
//!   in-bundle reference accordingly.
//! - Serve pass-through history and tag reads.
//!
//! # Invariants
//! - Pass 1 (resolve/create) completes for every record before pass 2
//!   (rewrite) starts; pass 2 completes before pass 3 (commit content).
//! - All passes share one `BEGIN IMMEDIATE` transaction; any failure rolls
//!   back every shell, content and tag write of the call.
//! - Records are mutated in place only on success; on failure they are
//!   restored to their input state.

use crate::model::id::LogicalId;
use crate::model::record::{Record, Tag};
use crate::repo::shell_repo::{
    HistoryLimits, HistoryQuery, RepoError, ShellRepository, SqliteShellRepository,
};
use crate::service::resolver::{IdentifierResolver, ResolvedRecord};
use crate::service::rewriter::{rewrite_references, IdMappingTable, RewriteStats};
use log::{debug, error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, SystemServiceError>;

/// Batch-level failure. A failed bundle has no observable store effect.
#[derive(Debug)]
pub enum SystemServiceError {
    /// Store failure (connectivity, constraint violation, conflict).
    Store(RepoError),
    /// Internal bookkeeping mismatch between passes.
    InconsistentState(&'static str),
}

impl Display for SystemServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "bundle transaction failed: {err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent bundle state: {details}")
            }
        }
    }
}

impl Error for SystemServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InconsistentState(_) => None,
        }
    }
}

impl From<RepoError> for SystemServiceError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for SystemServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(RepoError::from(value))
    }
}

/// Per-record result of a committed bundle, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntryOutcome {
    /// Identifier the record carried on input.
    pub previous_id: Option<LogicalId>,
    /// Store-assigned identifier (`Type/durableKey`).
    pub id: LogicalId,
    /// Whether a new shell was created for the record.
    pub created: bool,
    /// Version committed for the record's shell.
    pub version: i64,
}

/// Result of a committed bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutcome {
    /// Correlation id stamped on every history row written by the bundle.
    pub batch_id: Uuid,
    pub entries: Vec<BundleEntryOutcome>,
    /// `old -> new` identifier translations applied to references.
    pub id_mappings: Vec<(LogicalId, LogicalId)>,
    pub rewritten_references: usize,
}

/// Runs the three bundle passes against any shell repository.
///
/// The caller owns the atomicity boundary: `repo` must be backed by an open
/// transaction that is rolled back when this returns an error.
pub fn apply_bundle<R: ShellRepository>(
    repo: &R,
    records: &mut [Record],
    batch_id: Uuid,
) -> ServiceResult<BundleOutcome> {
    // Pass 1: resolve identifiers, create shells, build the mapping table.
    let mut resolver = IdentifierResolver::new(repo);
    let mut mappings = IdMappingTable::new();
    let mut resolved: Vec<ResolvedRecord> = Vec::with_capacity(records.len());

    for record in records.iter_mut() {
        let decision = resolver.assign(record)?;
        if let Some((old, new)) = decision.id_change() {
            mappings.insert(old.clone(), new.clone());
        }
        record.id = Some(decision.assigned_id.clone());
        resolved.push(decision);
    }

    let mut shells = resolver.into_shells();

    // Pass 2: rewrite in-bundle references.
    let mut stats = RewriteStats::default();
    for record in records.iter_mut() {
        stats.merge(rewrite_references(record, &mappings));
    }

    // Pass 3: commit rewritten content into each record's shell.
    let mut entries = Vec::with_capacity(records.len());
    for (record, decision) in records.iter_mut().zip(resolved) {
        let shell = shells
            .get_mut(decision.shell_index)
            .ok_or(SystemServiceError::InconsistentState(
                "resolved record points at an unknown shell",
            ))?;
        let is_update = shell.has_committed_content();
        let committed = repo.write_content(shell, record, is_update, batch_id)?;
        debug!(
            "event=bundle_commit module=service status=ok id={} version={} update={is_update}",
            decision.assigned_id, committed.version
        );

        record.meta.version_id = Some(committed.version);
        record.meta.last_updated = Some(committed.updated_at);
        entries.push(BundleEntryOutcome {
            previous_id: decision.previous_id,
            id: decision.assigned_id,
            created: decision.created,
            version: committed.version,
        });
    }

    Ok(BundleOutcome {
        batch_id,
        entries,
        id_mappings: mappings.into_pairs(),
        rewritten_references: stats.rewritten,
    })
}

/// Service facade owning the connection for bundle and read calls.
pub struct SystemService<'conn> {
    conn: &'conn mut Connection,
    limits: HistoryLimits,
}

impl<'conn> SystemService<'conn> {
    /// Creates a service over a migrated connection.
    ///
    /// # Errors
    /// - Returns `Store` when the connection schema is not ready.
    pub fn try_new(conn: &'conn mut Connection, limits: HistoryLimits) -> ServiceResult<Self> {
        SqliteShellRepository::try_new(conn)?;
        Ok(Self { conn, limits })
    }

    /// Persists `records` atomically and rewrites in-bundle references.
    ///
    /// On success each record carries its store-assigned identifier, its
    /// rewritten references and its committed version metadata. On failure
    /// the store is unchanged and `records` are restored to their input state.
    pub fn transaction(&mut self, records: &mut [Record]) -> ServiceResult<BundleOutcome> {
        let started_at = Instant::now();
        let batch_id = Uuid::new_v4();
        info!(
            "event=bundle_transaction module=service status=start batch_id={batch_id} records={}",
            records.len()
        );

        let originals = records.to_vec();
        match self.run_transaction(records, batch_id) {
            Ok(outcome) => {
                info!(
                    "event=bundle_transaction module=service status=ok batch_id={batch_id} records={} created={} id_mappings={} rewritten_refs={} duration_ms={}",
                    outcome.entries.len(),
                    outcome.entries.iter().filter(|entry| entry.created).count(),
                    outcome.id_mappings.len(),
                    outcome.rewritten_references,
                    started_at.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(err) => {
                records.clone_from_slice(&originals);
                error!(
                    "event=bundle_transaction module=service status=error batch_id={batch_id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    /// Lists committed record versions, most recent first.
    ///
    /// `limit` of `None` or `0` uses the configured default; larger values
    /// are clamped to the configured max.
    pub fn history(&self, since: Option<i64>, limit: Option<u32>) -> ServiceResult<Vec<Record>> {
        let repo = SqliteShellRepository::try_new(&*self.conn)?;
        let query = HistoryQuery {
            since,
            limit: self.limits.normalize(limit),
        };
        Ok(repo.history(&query)?)
    }

    /// Lists every tag applied to at least one stored record.
    pub fn all_tags(&self) -> ServiceResult<Vec<Tag>> {
        let repo = SqliteShellRepository::try_new(&*self.conn)?;
        Ok(repo.list_applied_tags()?)
    }

    fn run_transaction(
        &mut self,
        records: &mut [Record],
        batch_id: Uuid,
    ) -> ServiceResult<BundleOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = {
            let repo = SqliteShellRepository::try_new(&tx)?;
            apply_bundle(&repo, records, batch_id)?
        };
        tx.commit()?;
        Ok(outcome)
    }
}
