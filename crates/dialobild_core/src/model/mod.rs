//! Dialogue graph domain model.
//!
//! # Responsibility
//! - Define persisted records (projects, catalogs, nodes, edges).
//! - Define the wire projection exchanged with editor clients.
//!
//! # Invariants
//! - Catalog entries cross the wire by `code`, never by internal id.
//! - A node at `(0, 0)` is unplaced and exempt from deletion-by-absence.

pub mod graph;
pub mod wire;
