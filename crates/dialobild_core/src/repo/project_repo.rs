//! Project and type-catalog repository.
//!
//! # Responsibility
//! - Resolve projects by id or by `(owner, name)`.
//! - Read each project's available node types and rule types in declared order.
//! - Seed catalogs for administration tooling and tests.
//!
//! # Invariants
//! - `(name, owner_id)` is unique.
//! - Catalog codes are validated before insertion.

use crate::model::graph::{
    validate_code, NodeType, NodeTypeId, OwnerId, Project, ProjectId, RuleType, RuleTypeId,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT id, name, owner_id, default_rule_code FROM projects";

/// Repository interface for projects and their catalogs.
pub trait ProjectRepository {
    fn create_project(&self, name: &str, owner_id: OwnerId) -> RepoResult<Project>;
    fn get_project(&self, project_id: ProjectId) -> RepoResult<Option<Project>>;
    fn find_project(&self, owner_id: OwnerId, name: &str) -> RepoResult<Option<Project>>;
    /// Lists an owner's projects ordered by id.
    fn list_projects(&self, owner_id: OwnerId) -> RepoResult<Vec<Project>>;
    fn create_node_type(&self, code: &str, name: &str, color: &str) -> RepoResult<NodeType>;
    fn create_rule_type(&self, code: &str, name: &str) -> RepoResult<RuleType>;
    /// Makes a node type available to a project, appended after existing ones.
    fn attach_node_type(&self, project_id: ProjectId, node_type_id: NodeTypeId)
        -> RepoResult<()>;
    /// Makes a rule type available to a project, appended after existing ones.
    fn attach_rule_type(&self, project_id: ProjectId, rule_type_id: RuleTypeId)
        -> RepoResult<()>;
    fn set_default_rule(&self, project_id: ProjectId, code: Option<&str>) -> RepoResult<()>;
    fn list_node_types(&self, project_id: ProjectId) -> RepoResult<Vec<NodeType>>;
    fn list_rule_types(&self, project_id: ProjectId) -> RepoResult<Vec<RuleType>>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, name: &str, owner_id: OwnerId) -> RepoResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData(
                "project name must not be blank".to_string(),
            ));
        }
        if self.find_project(owner_id, name)?.is_some() {
            return Err(RepoError::DuplicateProject {
                name: name.to_string(),
                owner_id,
            });
        }

        self.conn.execute(
            "INSERT INTO projects (name, owner_id) VALUES (?1, ?2);",
            params![name, owner_id],
        )?;
        let project_id = self.conn.last_insert_rowid();
        self.get_project(project_id)?
            .ok_or(RepoError::ProjectNotFound(project_id))
    }

    fn get_project(&self, project_id: ProjectId) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"),
                [project_id],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn find_project(&self, owner_id: OwnerId, name: &str) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE owner_id = ?1 AND name = ?2;"),
                params![owner_id, name.trim()],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn list_projects(&self, owner_id: OwnerId) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL} WHERE owner_id = ?1 ORDER BY id ASC;"
        ))?;
        let projects = stmt
            .query_map([owner_id], parse_project_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    fn create_node_type(&self, code: &str, name: &str, color: &str) -> RepoResult<NodeType> {
        validate_code(code)?;
        self.conn.execute(
            "INSERT INTO node_types (code, name, color) VALUES (?1, ?2, ?3);",
            params![code, name, color],
        )?;
        Ok(NodeType {
            id: self.conn.last_insert_rowid(),
            code: code.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        })
    }

    fn create_rule_type(&self, code: &str, name: &str) -> RepoResult<RuleType> {
        validate_code(code)?;
        self.conn.execute(
            "INSERT INTO rule_types (code, name) VALUES (?1, ?2);",
            params![code, name],
        )?;
        Ok(RuleType {
            id: self.conn.last_insert_rowid(),
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    fn attach_node_type(
        &self,
        project_id: ProjectId,
        node_type_id: NodeTypeId,
    ) -> RepoResult<()> {
        self.ensure_project(project_id)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO project_node_types (project_id, node_type_id, position)
             SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0)
             FROM project_node_types
             WHERE project_id = ?1;",
            params![project_id, node_type_id],
        )?;
        Ok(())
    }

    fn attach_rule_type(
        &self,
        project_id: ProjectId,
        rule_type_id: RuleTypeId,
    ) -> RepoResult<()> {
        self.ensure_project(project_id)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO project_rule_types (project_id, rule_type_id, position)
             SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0)
             FROM project_rule_types
             WHERE project_id = ?1;",
            params![project_id, rule_type_id],
        )?;
        Ok(())
    }

    fn set_default_rule(&self, project_id: ProjectId, code: Option<&str>) -> RepoResult<()> {
        if let Some(code) = code {
            validate_code(code)?;
        }
        let changed = self.conn.execute(
            "UPDATE projects SET default_rule_code = ?1 WHERE id = ?2;",
            params![code, project_id],
        )?;
        if changed == 0 {
            return Err(RepoError::ProjectNotFound(project_id));
        }
        Ok(())
    }

    fn list_node_types(&self, project_id: ProjectId) -> RepoResult<Vec<NodeType>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.code, t.name, t.color
             FROM project_node_types p
             JOIN node_types t ON t.id = p.node_type_id
             WHERE p.project_id = ?1
             ORDER BY p.position ASC, t.id ASC;",
        )?;
        let node_types = stmt
            .query_map([project_id], |row| {
                Ok(NodeType {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                    color: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(node_types)
    }

    fn list_rule_types(&self, project_id: ProjectId) -> RepoResult<Vec<RuleType>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.code, t.name
             FROM project_rule_types p
             JOIN rule_types t ON t.id = p.rule_type_id
             WHERE p.project_id = ?1
             ORDER BY p.position ASC, t.id ASC;",
        )?;
        let rule_types = stmt
            .query_map([project_id], |row| {
                Ok(RuleType {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rule_types)
    }
}

impl SqliteProjectRepository<'_> {
    fn ensure_project(&self, project_id: ProjectId) -> RepoResult<()> {
        match self.get_project(project_id)? {
            Some(_) => Ok(()),
            None => Err(RepoError::ProjectNotFound(project_id)),
        }
    }
}

fn parse_project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        default_rule_code: row.get(3)?,
    })
}
