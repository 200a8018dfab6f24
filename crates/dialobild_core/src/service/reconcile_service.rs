//! Full-snapshot graph save (reconciliation) use-case.
//!
//! # Responsibility
//! - Diff a client-submitted node list against the persisted snapshot.
//! - Create, update and delete nodes and their outgoing typed edges.
//! - Resolve edges to nodes created later in the same batch.
//!
//! # Invariants
//! - Submitted nodes are processed in request order.
//! - Persisted nodes at `(0, 0)` are never updated, counted or deleted.
//! - Edges under a rule type no longer attached to the project are kept.
//! - One call is one transaction: any error leaves the graph untouched.

use crate::graph::catalog::TypeCatalog;
use crate::graph::error::{GraphError, ValidationError};
use crate::graph::pending::{PendingEdge, PendingEdgeLedger};
use crate::graph::snapshot::GraphSnapshot;
use crate::model::graph::{Edge, NewNode, Node, NodeId, OwnerId, Project, ProjectRef};
use crate::model::wire::{ClientId, RuleMap, WireNode};
use crate::repo::graph_repo::{GraphRepository, SqliteGraphRepository};
use crate::repo::project_repo::SqliteProjectRepository;
use crate::service::project_service::resolve_project;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Counters and id remapping produced by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Client-local id -> persisted id for nodes created by this pass.
    pub new_node_ids: BTreeMap<String, NodeId>,
}

/// Reconciliation result with the project it was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub project: Project,
    pub outcome: ReconcileOutcome,
}

/// Checks codes and ids of a submission before anything is staged.
pub fn validate_submission(
    catalog: &TypeCatalog,
    submission: &[WireNode],
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for node in submission {
        if !seen.insert(&node.id) {
            return Err(ValidationError::DuplicateNodeId(node.id.to_string()));
        }
        catalog.node_type(&node.node_type)?;
        for code in node.rules.keys() {
            catalog.rule_type(code)?;
        }
    }
    Ok(())
}

/// One reconciliation pass over a repository.
///
/// The engine does not manage transactions; the caller decides whether the
/// repository is bound to one.
pub struct ReconciliationEngine<'a, R: GraphRepository> {
    repo: &'a R,
    catalog: &'a TypeCatalog,
    snapshot: &'a GraphSnapshot,
    created: BTreeMap<ClientId, NodeId>,
    ledger: PendingEdgeLedger,
    outcome: ReconcileOutcome,
}

impl<'a, R: GraphRepository> ReconciliationEngine<'a, R> {
    pub fn new(repo: &'a R, catalog: &'a TypeCatalog, snapshot: &'a GraphSnapshot) -> Self {
        Self {
            repo,
            catalog,
            snapshot,
            created: BTreeMap::new(),
            ledger: PendingEdgeLedger::default(),
            outcome: ReconcileOutcome::default(),
        }
    }

    /// Applies `submission` and returns counters.
    ///
    /// # Errors
    /// - `Validation` for unknown codes, duplicate ids or forward references
    ///   that never materialize.
    /// - `Internal` for persistence failures.
    pub fn run(mut self, submission: &[WireNode]) -> Result<ReconcileOutcome, GraphError> {
        validate_submission(self.catalog, submission)?;

        let snapshot = self.snapshot;
        let mut absent: BTreeSet<NodeId> = snapshot
            .nodes()
            .filter(|node| !node.position.is_unplaced())
            .map(|node| node.id)
            .collect();

        for submitted in submission {
            match snapshot.resolve(&submitted.id) {
                Some(existing) if existing.position.is_unplaced() => {}
                Some(existing) => {
                    absent.remove(&existing.id);
                    if !snapshot.matches(existing, submitted, self.catalog) {
                        self.update_node(existing, submitted)?;
                    }
                }
                None => self.create_node(submitted)?,
            }
        }

        std::mem::take(&mut self.ledger).finish()?;

        for node_id in &absent {
            self.repo.delete_node(*node_id)?;
        }
        self.outcome.deleted = absent.len();

        Ok(self.outcome)
    }

    fn update_node(&mut self, existing: &Node, submitted: &WireNode) -> Result<(), GraphError> {
        let node_type = self.catalog.node_type(&submitted.node_type)?;
        let updated = Node {
            node_type_id: node_type.id,
            node_type_code: node_type.code.clone(),
            content: submitted.content.clone(),
            position: submitted.location,
            ..existing.clone()
        };
        self.repo.update_node(&updated)?;
        let managed: Vec<Edge> = self
            .snapshot
            .managed_edges(existing.id, self.catalog)
            .cloned()
            .collect();
        self.sync_rules(existing.id, &managed, &submitted.rules)?;
        self.outcome.modified += 1;
        Ok(())
    }

    fn create_node(&mut self, submitted: &WireNode) -> Result<(), GraphError> {
        let node_type = self.catalog.node_type(&submitted.node_type)?;
        let node = self.repo.insert_node(&NewNode {
            project_id: self.snapshot.project_id(),
            node_type_id: node_type.id,
            content: submitted.content.clone(),
            position: submitted.location,
        })?;

        self.created.insert(submitted.id.clone(), node.id);
        self.outcome
            .new_node_ids
            .insert(submitted.id.to_string(), node.id);
        self.outcome.added += 1;

        for pending in self.ledger.take(&submitted.id) {
            self.repo
                .insert_edge(pending.source_id, pending.rule_type_id, node.id)?;
        }
        self.sync_rules(node.id, &[], &submitted.rules)
    }

    /// Makes the outgoing edges of `source_id` match `rules`.
    ///
    /// An existing edge with the same rule and target is kept; otherwise an
    /// unclaimed edge to the same target is relabelled; otherwise a new edge
    /// is created or deferred. Unclaimed existing edges are deleted.
    fn sync_rules(
        &mut self,
        source_id: NodeId,
        existing: &[Edge],
        rules: &RuleMap,
    ) -> Result<(), GraphError> {
        let mut retained = vec![false; existing.len()];

        for (code, targets) in rules {
            let rule_type_id = self.catalog.rule_type(code)?.id;
            let mut seen = BTreeSet::new();
            for target in targets {
                if !seen.insert(target) {
                    continue;
                }
                let Some(target_id) = self.resolve_target(target) else {
                    self.ledger.defer(
                        target.clone(),
                        PendingEdge {
                            source_id,
                            rule_type_id,
                        },
                    );
                    continue;
                };

                let unclaimed = |index: &usize| {
                    !retained[*index] && existing[*index].target_id == target_id
                };
                let exact = (0..existing.len())
                    .filter(unclaimed)
                    .find(|index| existing[*index].rule_type_id == rule_type_id);
                let relabel = (0..existing.len()).find(unclaimed);

                match (exact, relabel) {
                    (Some(index), _) => retained[index] = true,
                    (None, Some(index)) => {
                        self.repo
                            .update_edge_rule(existing[index].id, rule_type_id)?;
                        retained[index] = true;
                    }
                    (None, None) => {
                        self.repo.insert_edge(source_id, rule_type_id, target_id)?;
                    }
                }
            }
        }

        for (edge, keep) in existing.iter().zip(retained) {
            if !keep {
                self.repo.delete_edge(edge.id)?;
            }
        }
        Ok(())
    }

    fn resolve_target(&self, target: &ClientId) -> Option<NodeId> {
        self.snapshot
            .resolve(target)
            .map(|node| node.id)
            .or_else(|| self.created.get(target).copied())
    }
}

/// Transactional reconciliation entry point over a SQLite connection.
pub struct ReconcileService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ReconcileService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Reconciles the owner's project with `submission` atomically.
    pub fn reconcile(
        &self,
        owner_id: OwnerId,
        project: &ProjectRef,
        submission: &[WireNode],
    ) -> Result<Reconciled, GraphError> {
        let started_at = Instant::now();
        info!(
            "event=graph_reconcile module=service status=start submitted={}",
            submission.len()
        );

        match self.reconcile_in_tx(owner_id, project, submission) {
            Ok(reconciled) => {
                info!(
                    "event=graph_reconcile module=service status=ok project_id={} added={} modified={} deleted={} duration_ms={}",
                    reconciled.project.id,
                    reconciled.outcome.added,
                    reconciled.outcome.modified,
                    reconciled.outcome.deleted,
                    started_at.elapsed().as_millis()
                );
                Ok(reconciled)
            }
            Err(err) => {
                error!(
                    "event=graph_reconcile module=service status=error kind={:?} duration_ms={} error={}",
                    err.kind(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn reconcile_in_tx(
        &self,
        owner_id: OwnerId,
        project: &ProjectRef,
        submission: &[WireNode],
    ) -> Result<Reconciled, GraphError> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let project_repo = SqliteProjectRepository::new(&tx);
        let graph_repo = SqliteGraphRepository::new(&tx);

        let project = resolve_project(&project_repo, owner_id, project)?;
        let catalog = TypeCatalog::load(&project_repo, project.id)?;
        let snapshot = GraphSnapshot::load(&graph_repo, project.id)?;

        let outcome = ReconciliationEngine::new(&graph_repo, &catalog, &snapshot).run(submission)?;
        tx.commit()?;

        Ok(Reconciled { project, outcome })
    }
}
