//! Raw-text ingestion use-case.
//!
//! # Responsibility
//! - Parse delimited text into chains of typed segments.
//! - Create one node per segment, linked by the project's default rule.
//! - Keep rows collision-free by displacing existing nodes.
//!
//! # Invariants
//! - Each non-blank line is an independent chain rooted at the anchor node.
//! - Line `n` (0-based) is placed at `x = anchor.x - 1 + n`.
//! - A segment sits one row below its chain parent.
//! - The whole call is one transaction.

use crate::config::LayoutConfig;
use crate::graph::catalog::TypeCatalog;
use crate::graph::error::{GraphError, ValidationError};
use crate::graph::layout::LayoutPlacer;
use crate::graph::snapshot::GraphSnapshot;
use crate::model::graph::{
    NewNode, Node, NodeId, NodeTypeId, OwnerId, Position, Project, ProjectRef,
};
use crate::model::wire::WireNode;
use crate::repo::graph_repo::{GraphRepository, SqliteGraphRepository};
use crate::repo::project_repo::SqliteProjectRepository;
use crate::repo::RepoError;
use crate::service::project_service::resolve_project;
use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::time::Instant;

const SEGMENT_SEPARATOR: char = '|';

static TYPE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<([A-Za-z]+)>(.*)$").expect("valid type prefix regex"));

/// One `|`-separated piece of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Code from a leading `<code>`; `None` means the project's first type.
    pub type_code: Option<String>,
    pub content: String,
}

/// Splits text into lines of segments.
///
/// Blank lines, whitespace-only segments and lines left with no segments
/// are dropped.
pub fn parse_raw_text(text: &str) -> Vec<Vec<Segment>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(SEGMENT_SEPARATOR)
                .filter_map(parse_segment)
                .collect::<Vec<_>>()
        })
        .filter(|segments| !segments.is_empty())
        .collect()
}

fn parse_segment(raw: &str) -> Option<Segment> {
    let (type_code, content) = match TYPE_PREFIX_RE.captures(raw) {
        Some(captures) => (
            Some(captures[1].to_string()),
            captures.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, raw),
    };
    let content = content.trim();
    if content.is_empty() && type_code.is_none() {
        return None;
    }
    Some(Segment {
        type_code,
        content: content.to_string(),
    })
}

/// Expands parsed lines into nodes below an anchor.
pub struct RawTextIngester<'a, R: GraphRepository> {
    repo: &'a R,
    catalog: &'a TypeCatalog,
    placer: LayoutPlacer,
}

impl<'a, R: GraphRepository> RawTextIngester<'a, R> {
    pub fn new(repo: &'a R, catalog: &'a TypeCatalog, placer: LayoutPlacer) -> Self {
        Self {
            repo,
            catalog,
            placer,
        }
    }

    /// Creates nodes and edges for `lines`, returning ids of every node
    /// created or displaced.
    pub fn run(
        &self,
        project: &Project,
        anchor: &Node,
        lines: &[Vec<Segment>],
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        let default_rule = project
            .default_rule_code
            .as_deref()
            .ok_or(ValidationError::MissingDefaultRule)?;
        let rule_type_id = self.catalog.rule_type(default_rule)?.id;
        let typed_lines = self.resolve_types(lines)?;

        let mut touched = BTreeSet::new();
        let mut x = anchor.position.x.saturating_sub(1);
        for line in &typed_lines {
            let mut parent_id = anchor.id;
            let mut parent_y = anchor.position.y;
            for (node_type_id, content) in line {
                let node = self.repo.insert_node(&NewNode {
                    project_id: project.id,
                    node_type_id: *node_type_id,
                    content: (*content).to_string(),
                    position: Position::new(x, parent_y.saturating_add(1)),
                })?;
                self.repo.insert_edge(parent_id, rule_type_id, node.id)?;
                touched.insert(node.id);

                self.make_room(&node, &mut touched)?;

                parent_id = node.id;
                parent_y = node.position.y;
            }
            x = x.saturating_add(1);
        }
        Ok(touched)
    }

    fn resolve_types<'s>(
        &self,
        lines: &'s [Vec<Segment>],
    ) -> Result<Vec<Vec<(NodeTypeId, &'s str)>>, ValidationError> {
        lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|segment| -> Result<(NodeTypeId, &'s str), ValidationError> {
                        let node_type = match segment.type_code.as_deref() {
                            Some(code) => self.catalog.node_type(code)?,
                            None => self.catalog.first_node_type()?,
                        };
                        Ok((node_type.id, segment.content.as_str()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }

    fn make_room(&self, node: &Node, touched: &mut BTreeSet<NodeId>) -> Result<(), GraphError> {
        let y = node.position.y;
        let peers = self.repo.list_row(node.project_id, y)?;
        for displacement in self.placer.resolve_placement(node, &peers)? {
            debug!(
                "event=layout_displace module=service node_id={} y={} from_x={} to_x={}",
                displacement.node_id, y, displacement.from_x, displacement.to_x
            );
            self.repo
                .move_node(displacement.node_id, Position::new(displacement.to_x, y))?;
            touched.insert(displacement.node_id);
        }
        Ok(())
    }
}

/// Ingestion result with the project it was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub project: Project,
    /// Created and displaced nodes in final state, ordered by id.
    pub nodes: Vec<WireNode>,
}

/// Transactional ingestion entry point over a SQLite connection.
pub struct IngestService<'conn> {
    conn: &'conn Connection,
    placer: LayoutPlacer,
}

impl<'conn> IngestService<'conn> {
    pub fn new(conn: &'conn Connection, layout: &LayoutConfig) -> Self {
        Self {
            conn,
            placer: LayoutPlacer::new(layout),
        }
    }

    /// Ingests `text` below `anchor_id` atomically.
    pub fn ingest(
        &self,
        owner_id: OwnerId,
        project: &ProjectRef,
        anchor_id: NodeId,
        text: &str,
    ) -> Result<Ingested, GraphError> {
        let started_at = Instant::now();
        info!("event=raw_ingest module=service status=start anchor_id={anchor_id}");

        match self.ingest_in_tx(owner_id, project, anchor_id, text) {
            Ok(ingested) => {
                info!(
                    "event=raw_ingest module=service status=ok project_id={} updated={} duration_ms={}",
                    ingested.project.id,
                    ingested.nodes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(ingested)
            }
            Err(err) => {
                error!(
                    "event=raw_ingest module=service status=error kind={:?} duration_ms={} error={}",
                    err.kind(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn ingest_in_tx(
        &self,
        owner_id: OwnerId,
        project: &ProjectRef,
        anchor_id: NodeId,
        text: &str,
    ) -> Result<Ingested, GraphError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let project_repo = SqliteProjectRepository::new(&tx);
        let graph_repo = SqliteGraphRepository::new(&tx);

        let project = resolve_project(&project_repo, owner_id, project)?;
        let anchor = graph_repo
            .get_node(project.id, anchor_id)?
            .ok_or(GraphError::NodeNotFound(anchor_id))?;
        let catalog = TypeCatalog::load(&project_repo, project.id)?;

        let lines = parse_raw_text(text);
        let ingester = RawTextIngester::new(&graph_repo, &catalog, self.placer);
        let touched = ingester.run(&project, &anchor, &lines)?;

        let after = GraphSnapshot::load(&graph_repo, project.id)?;
        let nodes = touched
            .iter()
            .map(|node_id| {
                after
                    .node(*node_id)
                    .map(|node| after.project(node, &catalog))
                    .ok_or(GraphError::Internal(RepoError::NodeNotFound(*node_id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;

        Ok(Ingested { project, nodes })
    }
}
