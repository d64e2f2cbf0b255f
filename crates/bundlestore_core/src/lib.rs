//! Core record store for atomic bundle transactions.
//! This crate is the single source of truth for identifier and reference
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::element::{Element, Reference};
pub use model::human_name::{HumanName, NameUse, Period};
pub use model::id::{DurableKey, LogicalId};
pub use model::record::{Record, RecordMeta, Tag};
pub use model::walk::{find_references, Walk};
pub use repo::shell_repo::{
    HistoryLimits, PersistedShell, RepoError, RepoResult, ShellRepository, SqliteShellRepository,
};
pub use service::resolver::{resolve, Resolution};
pub use service::rewriter::IdMappingTable;
pub use service::system_service::{
    apply_bundle, BundleEntryOutcome, BundleOutcome, ServiceResult, SystemService,
    SystemServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
