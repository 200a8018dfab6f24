//! Row-local collision resolution for grid placement.
//!
//! A node placed at `(x, y)` keeps its slot; any peer already at `x` shifts
//! right by one, which may in turn push the next peer, and so on. The cascade
//! runs as a work-list, so a dense row costs iterations rather than stack.

use crate::config::LayoutConfig;
use crate::model::graph::{Node, NodeId};
use std::collections::{BTreeMap, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One node shifted within its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displacement {
    pub node_id: NodeId,
    pub from_x: i64,
    pub to_x: i64,
}

/// Placement failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Shifting `node_id` would leave the usable columns of row `y`.
    NoFreePosition { y: i64, node_id: NodeId },
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFreePosition { y, node_id } => {
                write!(f, "no free position in row {y} for node {node_id}")
            }
        }
    }
}

impl Error for LayoutError {}

/// Resolves x-collisions inside one row.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutPlacer {
    max_column: Option<i64>,
}

impl LayoutPlacer {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            max_column: config.max_column,
        }
    }

    /// Computes the shifts needed so `origin` owns its x in its row.
    ///
    /// `row_peers` may include `origin` itself and unplaced nodes; both are
    /// ignored. Returned displacements are ordered by node id and never
    /// include `origin`.
    pub fn resolve_placement(
        &self,
        origin: &Node,
        row_peers: &[Node],
    ) -> Result<Vec<Displacement>, LayoutError> {
        let row = origin.position.y;
        let mut slots: BTreeMap<i64, Vec<NodeId>> = BTreeMap::new();
        let mut original_x: BTreeMap<NodeId, i64> = BTreeMap::new();
        for peer in row_peers {
            if peer.id == origin.id || peer.position.y != row || peer.position.is_unplaced() {
                continue;
            }
            slots.entry(peer.position.x).or_default().push(peer.id);
            original_x.insert(peer.id, peer.position.x);
        }

        let mut moved: BTreeMap<NodeId, i64> = BTreeMap::new();
        let mut work: VecDeque<(NodeId, i64)> = VecDeque::from([(origin.id, origin.position.x)]);

        while let Some((claimant, slot)) = work.pop_front() {
            let evicted: Vec<NodeId> = slots
                .insert(slot, vec![claimant])
                .unwrap_or_default()
                .into_iter()
                .filter(|node_id| *node_id != claimant)
                .collect();

            for node_id in evicted {
                let next = slot
                    .checked_add(1)
                    .filter(|x| self.max_column.map_or(true, |max| *x <= max))
                    .ok_or(LayoutError::NoFreePosition { y: row, node_id })?;
                moved.insert(node_id, next);
                work.push_back((node_id, next));
            }
        }

        Ok(moved
            .into_iter()
            .filter_map(|(node_id, to_x)| {
                let from_x = original_x.get(&node_id).copied()?;
                (from_x != to_x).then_some(Displacement {
                    node_id,
                    from_x,
                    to_x,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Displacement, LayoutError, LayoutPlacer};
    use crate::config::LayoutConfig;
    use crate::model::graph::{Node, Position};

    fn node(id: i64, x: i64, y: i64) -> Node {
        Node {
            id,
            project_id: 1,
            node_type_id: 1,
            node_type_code: "statement".to_string(),
            content: format!("node {id}"),
            position: Position::new(x, y),
        }
    }

    #[test]
    fn free_slot_needs_no_displacement() {
        let placer = LayoutPlacer::default();
        let moves = placer
            .resolve_placement(&node(10, 3, 1), &[node(1, 0, 1), node(2, 1, 1)])
            .unwrap();
        assert!(moves.is_empty());
    }

    #[test]
    fn collision_cascades_to_the_right() {
        let placer = LayoutPlacer::default();
        let peers = [node(1, 0, 1), node(2, 1, 1), node(3, 5, 1)];
        let moves = placer.resolve_placement(&node(10, 0, 1), &peers).unwrap();
        assert_eq!(
            moves,
            vec![
                Displacement {
                    node_id: 1,
                    from_x: 0,
                    to_x: 1
                },
                Displacement {
                    node_id: 2,
                    from_x: 1,
                    to_x: 2
                },
            ]
        );
    }

    #[test]
    fn stacked_peers_end_in_distinct_slots() {
        let placer = LayoutPlacer::default();
        let peers = [node(1, 2, 4), node(2, 2, 4), node(3, 3, 4)];
        let moves = placer.resolve_placement(&node(9, 2, 4), &peers).unwrap();

        let mut final_x: Vec<i64> = vec![2];
        for peer in &peers {
            let x = moves
                .iter()
                .find(|m| m.node_id == peer.id)
                .map_or(peer.position.x, |m| m.to_x);
            final_x.push(x);
        }
        final_x.sort_unstable();
        final_x.dedup();
        assert_eq!(final_x.len(), 4);
    }

    #[test]
    fn other_rows_and_unplaced_nodes_are_ignored() {
        let placer = LayoutPlacer::default();
        let peers = [node(1, 0, 0), node(2, 1, 1)];
        let moves = placer.resolve_placement(&node(10, 0, 0), &peers).unwrap();
        assert!(moves.is_empty());

        let moves = placer.resolve_placement(&node(11, 1, 2), &peers).unwrap();
        assert!(moves.is_empty());
    }

    #[test]
    fn bounded_row_fails_when_packed() {
        let placer = LayoutPlacer::new(&LayoutConfig {
            max_column: Some(2),
        });
        let peers = [node(1, 0, 1), node(2, 1, 1), node(3, 2, 1)];
        let err = placer.resolve_placement(&node(10, 0, 1), &peers).unwrap_err();
        assert_eq!(err, LayoutError::NoFreePosition { y: 1, node_id: 3 });
    }
}
