//! Graph use-case services.
//!
//! # Responsibility
//! - Run reconciliation and ingestion inside one transaction per call.
//! - Resolve projects and catalogs before any mutation.
//! - Keep callers decoupled from SQL and transaction handling.

pub mod ingest_service;
pub mod project_service;
pub mod reconcile_service;
