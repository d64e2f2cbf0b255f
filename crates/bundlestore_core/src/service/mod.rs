//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate resolution, rewriting and persistence into the bundle
//!   transaction use-case.
//! - Keep CLI callers decoupled from storage details.

pub mod resolver;
pub mod rewriter;
pub mod system_service;
