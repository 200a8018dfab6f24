//! Core domain logic for the dialogue graph builder.
//! This crate owns graph reconciliation, raw-text ingestion and row layout.

pub mod api;
pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{ApiError, ApiResponse};
pub use config::{ConfigError, CoreConfig, LayoutConfig};
pub use graph::error::{ErrorKind, GraphError, ValidationError};
pub use graph::layout::{Displacement, LayoutError, LayoutPlacer};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::graph::{Edge, Node, NodeId, OwnerId, Position, Project, ProjectId, ProjectRef};
pub use model::wire::{ClientId, WireNode};
pub use repo::{RepoError, RepoResult};
pub use service::ingest_service::{IngestService, Ingested};
pub use service::project_service::{ProjectService, ProjectView};
pub use service::reconcile_service::{ReconcileOutcome, ReconcileService, Reconciled};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
