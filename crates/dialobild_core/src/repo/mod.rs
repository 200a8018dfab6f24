//! Persistence boundary for projects, catalogs and the node graph.
//!
//! # Responsibility
//! - Define the narrow get/filter/save/delete contracts graph services need.
//! - Keep SQLite query details out of reconciliation and ingestion logic.
//!
//! # Invariants
//! - Repository methods never open their own transactions; callers bind a
//!   repository to a transaction when a use-case must be atomic.
//! - Write paths return semantic errors (`NodeNotFound`, `CrossProjectEdge`)
//!   in addition to transport errors.

use crate::db::DbError;
use crate::model::graph::{EdgeId, InvalidCode, NodeId, OwnerId, ProjectId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod graph_repo;
pub mod project_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for graph and project persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NodeNotFound(NodeId),
    EdgeNotFound(EdgeId),
    ProjectNotFound(ProjectId),
    /// Edge endpoints exist but live in different projects.
    CrossProjectEdge {
        source: NodeId,
        target: NodeId,
    },
    DuplicateProject {
        name: String,
        owner_id: OwnerId,
    },
    InvalidCode(InvalidCode),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::EdgeNotFound(id) => write!(f, "edge not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::CrossProjectEdge { source, target } => write!(
                f,
                "edge {source} -> {target} would connect nodes of different projects"
            ),
            Self::DuplicateProject { name, owner_id } => {
                write!(f, "project `{name}` already exists for owner {owner_id}")
            }
            Self::InvalidCode(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted graph data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidCode(err) => Some(err),
            _ => None,
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

impl From<InvalidCode> for RepoError {
    fn from(value: InvalidCode) -> Self {
        Self::InvalidCode(value)
    }
}
