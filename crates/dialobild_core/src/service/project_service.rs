//! Project read model use-cases.
//!
//! # Responsibility
//! - Resolve a caller's project reference to a persisted project.
//! - Build the full editor view: nodes, catalogs and default rule.
//!
//! # Invariants
//! - A project owned by someone else is reported as not found.

use crate::graph::catalog::TypeCatalog;
use crate::graph::error::GraphError;
use crate::graph::snapshot::GraphSnapshot;
use crate::model::graph::{NodeType, OwnerId, Project, ProjectRef, RuleType};
use crate::model::wire::WireNode;
use crate::repo::graph_repo::SqliteGraphRepository;
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use log::{info, warn};
use rusqlite::Connection;
use std::time::Instant;

/// Everything an editor needs to render one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectView {
    pub project: Project,
    pub nodes: Vec<WireNode>,
    pub node_types: Vec<NodeType>,
    pub rule_types: Vec<RuleType>,
}

/// Resolves `reference` among the owner's projects.
pub fn resolve_project<P: ProjectRepository>(
    repo: &P,
    owner_id: OwnerId,
    reference: &ProjectRef,
) -> Result<Project, GraphError> {
    let project = match reference {
        ProjectRef::Id(project_id) => repo
            .get_project(*project_id)?
            .filter(|project| project.owner_id == owner_id),
        ProjectRef::Name(name) => repo.find_project(owner_id, name)?,
    };
    project.ok_or_else(|| GraphError::ProjectNotFound(reference.clone()))
}

/// Read-only project queries.
pub struct ProjectService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ProjectService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Loads the project with nodes in wire format.
    pub fn load_project(
        &self,
        owner_id: OwnerId,
        reference: &ProjectRef,
    ) -> Result<ProjectView, GraphError> {
        let started_at = Instant::now();
        let project_repo = SqliteProjectRepository::new(self.conn);
        let graph_repo = SqliteGraphRepository::new(self.conn);

        let project = match resolve_project(&project_repo, owner_id, reference) {
            Ok(project) => project,
            Err(err) => {
                warn!("event=project_load module=service status=error error={err}");
                return Err(err);
            }
        };
        let catalog = TypeCatalog::load(&project_repo, project.id)?;
        let snapshot = GraphSnapshot::load(&graph_repo, project.id)?;
        let nodes = snapshot
            .nodes()
            .map(|node| snapshot.project(node, &catalog))
            .collect::<Vec<_>>();

        info!(
            "event=project_load module=service status=ok project_id={} nodes={} duration_ms={}",
            project.id,
            nodes.len(),
            started_at.elapsed().as_millis()
        );

        Ok(ProjectView {
            project,
            nodes,
            node_types: catalog.node_types().to_vec(),
            rule_types: catalog.rule_types().to_vec(),
        })
    }

    /// Lists the owner's projects ordered by id.
    pub fn list_projects(&self, owner_id: OwnerId) -> Result<Vec<Project>, GraphError> {
        Ok(SqliteProjectRepository::new(self.conn).list_projects(owner_id)?)
    }
}
