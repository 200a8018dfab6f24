//! Error taxonomy for graph use-cases.
//!
//! Every failure of a reconciliation or ingestion call maps to one
//! [`ErrorKind`], and every failure aborts the whole call.

use crate::graph::layout::LayoutError;
use crate::model::graph::{NodeId, ProjectRef};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Closed classification of graph errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Submission is well-formed but semantically invalid.
    Validation,
    /// Referenced project or node does not exist.
    NotFound,
    /// Layout cannot satisfy row uniqueness.
    Conflict,
    /// Persistence failure or inconsistent stored state.
    Internal,
}

/// Semantic validation failures of a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Node type code is not available to the project.
    UnknownNodeType(String),
    /// Rule type code is not available to the project.
    UnknownRuleType(String),
    /// Same client id submitted for two nodes.
    DuplicateNodeId(String),
    /// Edge targets that never materialized during the pass.
    UnresolvedForwardReference { targets: Vec<String> },
    /// Project has no default rule configured for ingestion.
    MissingDefaultRule,
    /// Project has no node type to fall back to.
    EmptyNodeTypeCatalog,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNodeType(code) => write!(f, "unknown node type `{code}`"),
            Self::UnknownRuleType(code) => write!(f, "unknown rule type `{code}`"),
            Self::DuplicateNodeId(id) => write!(f, "node id `{id}` submitted more than once"),
            Self::UnresolvedForwardReference { targets } => write!(
                f,
                "rules reference nodes that do not exist: {}",
                targets.join(", ")
            ),
            Self::MissingDefaultRule => write!(f, "project has no default rule type"),
            Self::EmptyNodeTypeCatalog => write!(f, "project has no node types"),
        }
    }
}

impl Error for ValidationError {}

/// Error returned by graph services.
#[derive(Debug)]
pub enum GraphError {
    Validation(ValidationError),
    ProjectNotFound(ProjectRef),
    NodeNotFound(NodeId),
    Conflict(LayoutError),
    Internal(RepoError),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::ProjectNotFound(_) | Self::NodeNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ProjectNotFound(project) => write!(f, "project not found: {project}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
            Self::Internal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for GraphError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LayoutError> for GraphError {
    fn from(value: LayoutError) -> Self {
        Self::Conflict(value)
    }
}

impl From<RepoError> for GraphError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProjectNotFound(id) => Self::ProjectNotFound(ProjectRef::Id(id)),
            other => Self::Internal(other),
        }
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.into())
    }
}
