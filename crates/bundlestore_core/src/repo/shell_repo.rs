//! Persisted shell repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Find, create and fill the storage-side shells backing records.
//! - Append one history row per committed content write.
//! - Serve pass-through history and tag reads.
//!
//! # Invariants
//! - A freshly created shell has `version = 0` and no content.
//! - Every content write bumps `version` by exactly one and appends history.
//! - Write methods are only meaningful inside an open transaction; the
//!   repository never commits on its own.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::id::{is_valid_type_name, DurableKey, LogicalId};
use crate::model::record::{Record, Tag};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const SHELL_SELECT_SQL: &str = "SELECT
    res_id,
    res_type,
    version,
    content,
    created_at,
    updated_at
FROM resources";

pub const HISTORY_DEFAULT_LIMIT: u32 = 100;
pub const HISTORY_LIMIT_MAX: u32 = 1000;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for shell persistence and history/tag reads.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(DurableKey),
    /// Shell version moved under the writer.
    StaleShell {
        key: DurableKey,
        expected_version: i64,
    },
    Serialization(serde_json::Error),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "persisted shell not found: {key}"),
            Self::StaleShell {
                key,
                expected_version,
            } => write!(
                f,
                "persisted shell {key} is no longer at version {expected_version}"
            ),
            Self::Serialization(err) => write!(f, "record snapshot serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted shell data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "shell repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "shell repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "shell repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_)
            | Self::StaleShell { .. }
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Storage-side counterpart of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedShell {
    /// Store-native primary key.
    pub key: DurableKey,
    pub type_name: String,
    /// Number of committed content writes. `0` means no content yet.
    pub version: i64,
    /// Serialized JSON snapshot of the last committed record content.
    pub content: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl PersistedShell {
    /// Returns whether the shell already holds committed content.
    pub fn has_committed_content(&self) -> bool {
        self.version > 0 && self.content.is_some()
    }

    /// Canonical `Type/key` identifier of this shell.
    pub fn logical_id(&self) -> LogicalId {
        LogicalId::for_key(&self.type_name, self.key)
    }
}

/// Version metadata returned by a successful content write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedVersion {
    pub version: i64,
    pub updated_at: i64,
}

/// Bounds applied to history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            default_limit: HISTORY_DEFAULT_LIMIT,
            max_limit: HISTORY_LIMIT_MAX,
        }
    }
}

impl HistoryLimits {
    /// Normalizes a caller limit: `None`/`0` use the default, values above
    /// the max are clamped.
    pub fn normalize(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_limit.min(self.max_limit),
            Some(value) => value.min(self.max_limit),
        }
    }
}

/// Query options for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only entries recorded at or after this epoch ms timestamp.
    pub since: Option<i64>,
    /// Already-normalized row bound.
    pub limit: u32,
}

/// Storage collaborator used by the bundle transaction and its readers.
pub trait ShellRepository {
    /// Loads one shell by durable key.
    fn find_shell_by_key(&self, key: DurableKey) -> RepoResult<Option<PersistedShell>>;
    /// Creates an empty shell and lets the store assign a fresh key.
    fn create_shell(&self, type_name: &str) -> RepoResult<PersistedShell>;
    /// Writes record content into a shell and appends one history entry.
    fn write_content(
        &self,
        shell: &mut PersistedShell,
        record: &Record,
        is_update: bool,
        batch_id: Uuid,
    ) -> RepoResult<CommittedVersion>;
    /// Lists history entries, most recent first.
    fn history(&self, query: &HistoryQuery) -> RepoResult<Vec<Record>>;
    /// Lists every tag applied to at least one stored record.
    fn list_applied_tags(&self) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed shell repository.
///
/// Built over a plain connection for reads, or over a
/// `rusqlite::Transaction` (which derefs to `Connection`) for writes.
pub struct SqliteShellRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteShellRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_shell_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ShellRepository for SqliteShellRepository<'_> {
    fn find_shell_by_key(&self, key: DurableKey) -> RepoResult<Option<PersistedShell>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SHELL_SELECT_SQL} WHERE res_id = ?1;"))?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_shell_row(row)?));
        }
        Ok(None)
    }

    fn create_shell(&self, type_name: &str) -> RepoResult<PersistedShell> {
        ensure_type_name(type_name)?;

        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO resources (res_type, version, content, created_at, updated_at)
             VALUES (?1, 0, NULL, ?2, ?2);",
            params![type_name, now],
        )?;

        Ok(PersistedShell {
            key: self.conn.last_insert_rowid(),
            type_name: type_name.to_string(),
            version: 0,
            content: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn write_content(
        &self,
        shell: &mut PersistedShell,
        record: &Record,
        is_update: bool,
        batch_id: Uuid,
    ) -> RepoResult<CommittedVersion> {
        if is_update != shell.has_committed_content() {
            return Err(RepoError::InvalidData(format!(
                "shell {} at version {} cannot take a {} write",
                shell.key,
                shell.version,
                if is_update { "update" } else { "first" }
            )));
        }

        ensure_type_name(record.type_name())?;
        if let Some(name) = record
            .fields
            .iter()
            .find(|(_, element)| !element.is_finite())
            .map(|(name, _)| name)
        {
            return Err(RepoError::InvalidData(format!(
                "field `{name}` of {}/{} holds a non-finite decimal",
                record.type_name(),
                shell.key
            )));
        }

        let now = now_epoch_ms();
        let version = shell.version + 1;
        let mut snapshot = record.clone();
        snapshot.meta.version_id = Some(version);
        snapshot.meta.last_updated = Some(now);
        let content = serde_json::to_string(&snapshot)?;

        let changed = if is_update {
            self.conn.execute(
                "UPDATE resources
                 SET res_type = ?2,
                     version = ?3,
                     content = ?4,
                     updated_at = ?5
                 WHERE res_id = ?1
                   AND version = ?6;",
                params![
                    shell.key,
                    record.type_name(),
                    version,
                    content,
                    now,
                    shell.version
                ],
            )?
        } else {
            self.conn.execute(
                "UPDATE resources
                 SET res_type = ?2,
                     version = ?3,
                     content = ?4,
                     created_at = ?5,
                     updated_at = ?5
                 WHERE res_id = ?1
                   AND version = 0;",
                params![shell.key, record.type_name(), version, content, now],
            )?
        };

        if changed == 0 {
            return match self.find_shell_by_key(shell.key)? {
                Some(_) => Err(RepoError::StaleShell {
                    key: shell.key,
                    expected_version: shell.version,
                }),
                None => Err(RepoError::NotFound(shell.key)),
            };
        }

        self.conn.execute(
            "INSERT INTO resource_history (
                res_id,
                version,
                res_type,
                content,
                batch_uuid,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                shell.key,
                version,
                record.type_name(),
                content.as_str(),
                batch_id.to_string(),
                now
            ],
        )?;

        replace_tags(self.conn, shell.key, &record.meta.tags)?;

        if !is_update {
            shell.created_at = now;
        }
        shell.type_name = record.type_name().to_string();
        shell.version = version;
        shell.content = Some(content);
        shell.updated_at = now;

        Ok(CommittedVersion {
            version,
            updated_at: now,
        })
    }

    fn history(&self, query: &HistoryQuery) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                res_id,
                version,
                res_type,
                content,
                recorded_at
             FROM resource_history
             WHERE (?1 IS NULL OR recorded_at >= ?1)
             ORDER BY recorded_at DESC, history_id DESC
             LIMIT ?2;",
        )?;

        let mut rows = stmt.query(params![query.since, i64::from(query.limit)])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_history_row(row)?);
        }
        Ok(records)
    }

    fn list_applied_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.scheme, t.term, t.label
             FROM tag_definitions t
             WHERE EXISTS (
                 SELECT 1
                 FROM resource_tags rt
                 WHERE rt.tag_id = t.tag_id
             )
             ORDER BY t.scheme ASC, t.term ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag {
                scheme: row.get("scheme")?,
                term: row.get("term")?,
                label: row.get("label")?,
            });
        }
        Ok(tags)
    }
}

fn replace_tags(conn: &Connection, key: DurableKey, tags: &[Tag]) -> RepoResult<()> {
    conn.execute("DELETE FROM resource_tags WHERE res_id = ?1;", [key])?;

    for tag in tags {
        conn.execute(
            "INSERT INTO tag_definitions (scheme, term, label)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(scheme, term)
             DO UPDATE SET label = COALESCE(excluded.label, tag_definitions.label);",
            params![tag.scheme.as_str(), tag.term.as_str(), tag.label.as_deref()],
        )?;
        let tag_id: i64 = conn.query_row(
            "SELECT tag_id FROM tag_definitions WHERE scheme = ?1 AND term = ?2;",
            params![tag.scheme.as_str(), tag.term.as_str()],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO resource_tags (res_id, tag_id) VALUES (?1, ?2);",
            params![key, tag_id],
        )?;
    }

    Ok(())
}

fn ensure_type_name(type_name: &str) -> RepoResult<()> {
    if is_valid_type_name(type_name) {
        return Ok(());
    }
    Err(RepoError::InvalidData(format!(
        "record type name `{type_name}` must match [A-Z][A-Za-z0-9]*"
    )))
}

fn parse_shell_row(row: &Row<'_>) -> RepoResult<PersistedShell> {
    let key: DurableKey = row.get("res_id")?;
    let version: i64 = row.get("version")?;
    let content: Option<String> = row.get("content")?;

    if version > 0 && content.is_none() {
        return Err(RepoError::InvalidData(format!(
            "shell {key} is at version {version} but has no content"
        )));
    }

    Ok(PersistedShell {
        key,
        type_name: row.get("res_type")?,
        version,
        content,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<Record> {
    let key: DurableKey = row.get("res_id")?;
    let version: i64 = row.get("version")?;
    let type_name: String = row.get("res_type")?;
    let content: String = row.get("content")?;

    let mut record: Record = serde_json::from_str(&content).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid snapshot for {type_name}/{key} version {version}: {err}"
        ))
    })?;
    record.id = Some(LogicalId::for_version(&type_name, key, version));
    record.meta.version_id = Some(version);
    record.meta.last_updated = Some(row.get("recorded_at")?);
    Ok(record)
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn ensure_shell_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 4] = [
        (
            "resources",
            &[
                "res_id",
                "res_type",
                "version",
                "content",
                "created_at",
                "updated_at",
            ],
        ),
        (
            "resource_history",
            &[
                "history_id",
                "res_id",
                "version",
                "res_type",
                "content",
                "batch_uuid",
                "recorded_at",
            ],
        ),
        ("tag_definitions", &["tag_id", "scheme", "term", "label"]),
        ("resource_tags", &["res_id", "tag_id"]),
    ];

    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::HistoryLimits;

    #[test]
    fn history_limit_defaults_and_clamps() {
        let limits = HistoryLimits {
            default_limit: 20,
            max_limit: 50,
        };
        assert_eq!(limits.normalize(None), 20);
        assert_eq!(limits.normalize(Some(0)), 20);
        assert_eq!(limits.normalize(Some(7)), 7);
        assert_eq!(limits.normalize(Some(500)), 50);
    }
}
