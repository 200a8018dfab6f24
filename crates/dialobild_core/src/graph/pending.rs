//! Ledger of edges whose target node is not created yet.
//!
//! # Invariants
//! - Entries are keyed by the target's client id, both when deferred and
//!   when flushed.
//! - A ledger that still holds entries at the end of a pass is a validation
//!   failure, never a silent drop.

use crate::graph::error::ValidationError;
use crate::model::graph::{NodeId, RuleTypeId};
use crate::model::wire::ClientId;
use std::collections::BTreeMap;

/// Edge creation request waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdge {
    /// Persisted id of the source node.
    pub source_id: NodeId,
    pub rule_type_id: RuleTypeId,
}

/// Forward references collected during one reconciliation pass.
#[derive(Debug, Default)]
pub struct PendingEdgeLedger {
    entries: BTreeMap<ClientId, Vec<PendingEdge>>,
}

impl PendingEdgeLedger {
    pub fn defer(&mut self, target: ClientId, edge: PendingEdge) {
        self.entries.entry(target).or_default().push(edge);
    }

    /// Removes and returns every edge waiting for `target`, in deferral order.
    pub fn take(&mut self, target: &ClientId) -> Vec<PendingEdge> {
        self.entries.remove(target).unwrap_or_default()
    }

    /// Closes the pass, failing when any target never materialized.
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        Err(ValidationError::UnresolvedForwardReference {
            targets: self
                .entries
                .into_keys()
                .map(|target| target.to_string())
                .collect(),
        })
    }
}
