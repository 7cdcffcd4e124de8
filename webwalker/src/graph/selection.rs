//! Selected-node set for graph editors and viewers.

use std::collections::BTreeSet;

use super::{GraphNode, NavigationGraph};

/// Ids of the nodes a user has selected.
///
/// Holds ids only; resolve them against a graph when needed so the selection
/// never keeps a stale copy of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSelection {
    ids: BTreeSet<u32>,
}

impl NodeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was not already selected.
    pub fn select(&mut self, id: u32) -> bool {
        self.ids.insert(id)
    }

    pub fn deselect(&mut self, id: u32) -> bool {
        self.ids.remove(&id)
    }

    /// Flip the selection state of `id`; returns the new state.
    pub fn toggle(&mut self, id: u32) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    /// Selected nodes that exist in `graph`.
    pub fn resolve<'g>(&self, graph: &'g NavigationGraph) -> Vec<&'g GraphNode> {
        self.ids.iter().filter_map(|&id| graph.node(id)).collect()
    }

    /// Drop ids that no longer exist in `graph`.
    pub fn retain_existing(&mut self, graph: &NavigationGraph) {
        self.ids.retain(|&id| graph.node(id).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Tile;

    fn graph() -> NavigationGraph {
        NavigationGraph::new(
            [
                GraphNode {
                    id: 1,
                    tile: Tile::new(0, 0, 0),
                },
                GraphNode {
                    id: 2,
                    tile: Tile::new(5, 5, 0),
                },
            ],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_toggle() {
        let mut sel = NodeSelection::new();
        assert!(sel.toggle(4));
        assert!(sel.contains(4));
        assert!(!sel.toggle(4));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_resolve_skips_missing() {
        let mut sel = NodeSelection::new();
        sel.select(2);
        sel.select(9);
        let g = graph();
        let nodes = sel.resolve(&g);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, 2);

        sel.retain_existing(&g);
        assert_eq!(sel.ids().collect::<Vec<_>>(), vec![2]);
    }
}
