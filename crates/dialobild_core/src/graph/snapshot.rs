//! Point-in-time view of a project's persisted graph.
//!
//! # Responsibility
//! - Load nodes and outgoing edges once per use-case call.
//! - Project persisted nodes into the wire shape and compare submissions
//!   against that projection.
//!
//! # Invariants
//! - The snapshot is never refreshed during a call; mutations staged by the
//!   call are tracked by the caller, not reflected here.

use crate::graph::catalog::TypeCatalog;
use crate::model::graph::{Edge, Node, NodeId, ProjectId};
use crate::model::wire::{ClientId, RuleMap, WireNode};
use crate::repo::graph_repo::GraphRepository;
use crate::repo::RepoResult;
use std::collections::{BTreeMap, BTreeSet};

/// Persisted nodes and their outgoing edges for one project.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    project_id: ProjectId,
    nodes: BTreeMap<NodeId, Node>,
    outgoing: BTreeMap<NodeId, Vec<Edge>>,
}

impl GraphSnapshot {
    pub fn load<R: GraphRepository>(repo: &R, project_id: ProjectId) -> RepoResult<Self> {
        let nodes = repo
            .list_nodes(project_id)?
            .into_iter()
            .map(|node| (node.id, node))
            .collect();
        let mut outgoing: BTreeMap<NodeId, Vec<Edge>> = BTreeMap::new();
        for edge in repo.list_edges(project_id)? {
            outgoing.entry(edge.source_id).or_default().push(edge);
        }
        Ok(Self {
            project_id,
            nodes,
            outgoing,
        })
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Finds the persisted node a client id refers to.
    pub fn resolve(&self, client_id: &ClientId) -> Option<&Node> {
        client_id
            .as_node_id()
            .and_then(|node_id| self.nodes.get(&node_id))
    }

    /// Outgoing edges in ascending edge-id order.
    pub fn outgoing(&self, node_id: NodeId) -> &[Edge] {
        self.outgoing
            .get(&node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Wire projection of a persisted node.
    pub fn project(&self, node: &Node, catalog: &TypeCatalog) -> WireNode {
        let mut rules: RuleMap = catalog
            .rule_types()
            .iter()
            .map(|rule| (rule.code.clone(), Vec::new()))
            .collect();
        for edge in self.managed_edges(node.id, catalog) {
            rules
                .entry(edge.rule_code.clone())
                .or_default()
                .push(ClientId::from(edge.target_id));
        }

        WireNode {
            id: ClientId::from(node.id),
            node_type: node.node_type_code.clone(),
            content: node.content.clone(),
            location: node.position,
            rules,
        }
    }

    /// Outgoing edges whose rule type is still available to the project.
    ///
    /// Edges under a detached rule type are neither projected nor compared,
    /// and reconciliation leaves them in place.
    pub fn managed_edges<'s>(
        &'s self,
        node_id: NodeId,
        catalog: &'s TypeCatalog,
    ) -> impl Iterator<Item = &'s Edge> + 's {
        self.outgoing(node_id)
            .iter()
            .filter(move |edge| catalog.rule_type(&edge.rule_code).is_ok())
    }

    /// Returns whether `submitted` equals the persisted projection of `node`.
    ///
    /// Rule lists compare as sets per code, and a missing code equals an
    /// empty list. A target that is not a persisted node always differs.
    pub fn matches(&self, node: &Node, submitted: &WireNode, catalog: &TypeCatalog) -> bool {
        if node.node_type_code != submitted.node_type
            || node.content != submitted.content
            || node.position != submitted.location
        {
            return false;
        }

        let mut persisted: BTreeMap<&str, BTreeSet<NodeId>> = BTreeMap::new();
        for edge in self.managed_edges(node.id, catalog) {
            persisted
                .entry(edge.rule_code.as_str())
                .or_default()
                .insert(edge.target_id);
        }

        let mut proposed: BTreeMap<&str, BTreeSet<NodeId>> = BTreeMap::new();
        for (code, targets) in &submitted.rules {
            if targets.is_empty() {
                continue;
            }
            let entry = proposed.entry(code.as_str()).or_default();
            for target in targets {
                match self.resolve(target) {
                    Some(target_node) => {
                        entry.insert(target_node.id);
                    }
                    None => return false,
                }
            }
        }

        persisted == proposed
    }
}
