//! Record domain model consumed by the bundle transaction.
//!
//! # Responsibility
//! - Define records, their field trees and logical identifiers.
//! - Expose reference fields through the compile-time `Walk` capability.
//!
//! # Invariants
//! - References point at records by identifier only and never own them.
//! - Identifier equality is textual.

pub mod element;
pub mod human_name;
pub mod id;
pub mod record;
pub mod walk;
