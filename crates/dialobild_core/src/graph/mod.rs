//! Graph building blocks shared by reconciliation and ingestion.
//!
//! # Responsibility
//! - Resolve wire codes through the project's type catalog.
//! - Hold the persisted snapshot a call diffs against.
//! - Track forward references and row-local placement.

pub mod catalog;
pub mod error;
pub mod layout;
pub mod pending;
pub mod snapshot;
