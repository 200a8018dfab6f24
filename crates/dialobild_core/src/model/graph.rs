//! Persisted graph records.
//!
//! # Invariants
//! - Every edge's source and target belong to the edge's project.
//! - Catalog codes are non-empty ASCII alphabetic strings.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProjectId = i64;
pub type NodeId = i64;
pub type EdgeId = i64;
pub type NodeTypeId = i64;
pub type RuleTypeId = i64;
/// Owning user id, supplied by the already-authenticated caller.
pub type OwnerId = i64;

/// Dialogue project that owns nodes and selects its catalog entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub owner_id: OwnerId,
    /// Rule code used for links created by raw-text ingestion.
    pub default_rule_code: Option<String>,
}

/// Node kind available to projects, e.g. `statement` or `question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeType {
    #[serde(skip)]
    pub id: NodeTypeId,
    pub code: String,
    pub name: String,
    pub color: String,
}

/// Edge label kind, e.g. `mustHave`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleType {
    #[serde(skip)]
    pub id: RuleTypeId,
    pub code: String,
    pub name: String,
}

/// How a caller names a project: by id, or by name within the owner's projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(ProjectId),
    Name(String),
}

impl Display for ProjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => write!(f, "`{name}`"),
        }
    }
}

/// Integer grid coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    /// Sentinel for nodes the user has not dragged onto the canvas yet.
    pub const UNPLACED: Position = Position { x: 0, y: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn is_unplaced(&self) -> bool {
        *self == Self::UNPLACED
    }
}

/// Persisted content node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub project_id: ProjectId,
    pub node_type_id: NodeTypeId,
    /// Denormalized from `node_types.code` on read.
    pub node_type_code: String,
    pub content: String,
    pub position: Position,
}

/// Persisted directed, labeled edge (`source -[rule]-> target`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub rule_type_id: RuleTypeId,
    /// Denormalized from `rule_types.code` on read.
    pub rule_code: String,
    pub target_id: NodeId,
}

/// Insert payload for a new node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub project_id: ProjectId,
    pub node_type_id: NodeTypeId,
    pub content: String,
    pub position: Position,
}

/// Rejected catalog code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCode(pub String);

impl Display for InvalidCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "catalog code must be latin letters only, got `{}`", self.0)
    }
}

impl Error for InvalidCode {}

/// Validates a node-type or rule-type code.
pub fn validate_code(code: &str) -> Result<(), InvalidCode> {
    if !code.is_empty() && code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(InvalidCode(code.to_string()))
    }
}
