//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage collaborator contract used by the bundle transaction.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never open or commit transactions; callers own the
//!   atomicity boundary.
//! - Repository APIs return semantic errors (`NotFound`, `StaleShell`) in
//!   addition to DB transport errors.

pub mod shell_repo;
