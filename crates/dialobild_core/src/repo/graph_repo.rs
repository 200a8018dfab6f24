//! Node and edge repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load a project's nodes and edges for snapshotting.
//! - Apply node/edge mutations staged by reconciliation and ingestion.
//!
//! # Invariants
//! - Listings are deterministic (`id ASC`, rows by `x ASC, id ASC`).
//! - Edges are only inserted between nodes of the same project.
//! - Deleting a node removes every edge that names it (FK cascade).

use crate::model::graph::{
    Edge, EdgeId, NewNode, Node, NodeId, Position, ProjectId, RuleTypeId,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NODE_SELECT_SQL: &str = "SELECT
    n.id AS id,
    n.project_id AS project_id,
    n.node_type_id AS node_type_id,
    t.code AS node_type_code,
    n.content AS content,
    n.x AS x,
    n.y AS y
FROM nodes n
JOIN node_types t ON t.id = n.node_type_id";

const EDGE_SELECT_SQL: &str = "SELECT
    r.id AS id,
    r.node_id AS node_id,
    r.rule_type_id AS rule_type_id,
    rt.code AS rule_code,
    r.connected_node_id AS connected_node_id
FROM node_rules r
JOIN nodes n ON n.id = r.node_id
JOIN rule_types rt ON rt.id = r.rule_type_id";

/// Repository interface for graph mutations and reads.
pub trait GraphRepository {
    /// Lists all nodes of one project.
    fn list_nodes(&self, project_id: ProjectId) -> RepoResult<Vec<Node>>;
    /// Lists all edges whose source belongs to one project.
    fn list_edges(&self, project_id: ProjectId) -> RepoResult<Vec<Edge>>;
    /// Loads one node if it belongs to the project.
    fn get_node(&self, project_id: ProjectId, node_id: NodeId) -> RepoResult<Option<Node>>;
    /// Lists nodes sharing row `y`.
    fn list_row(&self, project_id: ProjectId, y: i64) -> RepoResult<Vec<Node>>;
    /// Inserts one node and returns the stored record.
    fn insert_node(&self, node: &NewNode) -> RepoResult<Node>;
    /// Overwrites type, content and position of one node.
    fn update_node(&self, node: &Node) -> RepoResult<()>;
    /// Moves one node to a new position.
    fn move_node(&self, node_id: NodeId, position: Position) -> RepoResult<()>;
    /// Deletes one node and, by cascade, its incident edges.
    fn delete_node(&self, node_id: NodeId) -> RepoResult<()>;
    /// Inserts one edge between nodes of the same project.
    fn insert_edge(
        &self,
        source_id: NodeId,
        rule_type_id: RuleTypeId,
        target_id: NodeId,
    ) -> RepoResult<EdgeId>;
    /// Relabels one edge with another rule type.
    fn update_edge_rule(&self, edge_id: EdgeId, rule_type_id: RuleTypeId) -> RepoResult<()>;
    /// Deletes one edge.
    fn delete_edge(&self, edge_id: EdgeId) -> RepoResult<()>;
}

/// SQLite-backed graph repository.
///
/// Accepts any `Connection`, including a `Transaction` through deref.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn list_nodes(&self, project_id: ProjectId) -> RepoResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE n.project_id = ?1
             ORDER BY n.id ASC;"
        ))?;
        let mut rows = stmt.query([project_id])?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn list_edges(&self, project_id: ProjectId) -> RepoResult<Vec<Edge>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EDGE_SELECT_SQL}
             WHERE n.project_id = ?1
             ORDER BY r.id ASC;"
        ))?;
        let mut rows = stmt.query([project_id])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }
        Ok(edges)
    }

    fn get_node(&self, project_id: ProjectId, node_id: NodeId) -> RepoResult<Option<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE n.project_id = ?1 AND n.id = ?2;"
        ))?;
        let mut rows = stmt.query(params![project_id, node_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn list_row(&self, project_id: ProjectId, y: i64) -> RepoResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE n.project_id = ?1 AND n.y = ?2
             ORDER BY n.x ASC, n.id ASC;"
        ))?;
        let mut rows = stmt.query(params![project_id, y])?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn insert_node(&self, node: &NewNode) -> RepoResult<Node> {
        self.conn.execute(
            "INSERT INTO nodes (project_id, node_type_id, content, x, y)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                node.project_id,
                node.node_type_id,
                node.content.as_str(),
                node.position.x,
                node.position.y,
            ],
        )?;
        let node_id = self.conn.last_insert_rowid();
        self.get_node(node.project_id, node_id)?
            .ok_or(RepoError::NodeNotFound(node_id))
    }

    fn update_node(&self, node: &Node) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE nodes
             SET
                node_type_id = ?1,
                content = ?2,
                x = ?3,
                y = ?4
             WHERE id = ?5 AND project_id = ?6;",
            params![
                node.node_type_id,
                node.content.as_str(),
                node.position.x,
                node.position.y,
                node.id,
                node.project_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NodeNotFound(node.id));
        }
        Ok(())
    }

    fn move_node(&self, node_id: NodeId, position: Position) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE nodes SET x = ?1, y = ?2 WHERE id = ?3;",
            params![position.x, position.y, node_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NodeNotFound(node_id));
        }
        Ok(())
    }

    fn delete_node(&self, node_id: NodeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM nodes WHERE id = ?1;", [node_id])?;
        if changed == 0 {
            return Err(RepoError::NodeNotFound(node_id));
        }
        Ok(())
    }

    fn insert_edge(
        &self,
        source_id: NodeId,
        rule_type_id: RuleTypeId,
        target_id: NodeId,
    ) -> RepoResult<EdgeId> {
        let inserted = self.conn.execute(
            "INSERT INTO node_rules (node_id, rule_type_id, connected_node_id)
             SELECT s.id, ?2, t.id
             FROM nodes s
             JOIN nodes t ON t.project_id = s.project_id
             WHERE s.id = ?1 AND t.id = ?3;",
            params![source_id, rule_type_id, target_id],
        )?;
        if inserted == 1 {
            return Ok(self.conn.last_insert_rowid());
        }

        for node_id in [source_id, target_id] {
            if !node_exists(self.conn, node_id)? {
                return Err(RepoError::NodeNotFound(node_id));
            }
        }
        Err(RepoError::CrossProjectEdge {
            source: source_id,
            target: target_id,
        })
    }

    fn update_edge_rule(&self, edge_id: EdgeId, rule_type_id: RuleTypeId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE node_rules SET rule_type_id = ?1 WHERE id = ?2;",
            params![rule_type_id, edge_id],
        )?;
        if changed == 0 {
            return Err(RepoError::EdgeNotFound(edge_id));
        }
        Ok(())
    }

    fn delete_edge(&self, edge_id: EdgeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM node_rules WHERE id = ?1;", [edge_id])?;
        if changed == 0 {
            return Err(RepoError::EdgeNotFound(edge_id));
        }
        Ok(())
    }
}

fn node_exists(conn: &Connection, node_id: NodeId) -> RepoResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM nodes WHERE id = ?1;", [node_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let node_type_code: String = row.get("node_type_code")?;
    if node_type_code.is_empty() {
        return Err(RepoError::InvalidData(
            "empty node type code in node_types.code".to_string(),
        ));
    }

    Ok(Node {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        node_type_id: row.get("node_type_id")?,
        node_type_code,
        content: row.get("content")?,
        position: Position::new(row.get("x")?, row.get("y")?),
    })
}

fn parse_edge_row(row: &Row<'_>) -> RepoResult<Edge> {
    Ok(Edge {
        id: row.get("id")?,
        source_id: row.get("node_id")?,
        rule_type_id: row.get("rule_type_id")?,
        rule_code: row.get("rule_code")?,
        target_id: row.get("connected_node_id")?,
    })
}
