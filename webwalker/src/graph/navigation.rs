//! Graph storage, lookup and path building.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::{path, GraphEdge, GraphError, GraphNode, NavigationError, DEFAULT_SEARCH_RADIUS};
use crate::coord::Tile;

#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: u32,
    x: i32,
    y: i32,
    #[serde(default)]
    z: i32,
}

#[derive(Debug, Deserialize)]
struct EdgeRecord {
    start_id: u32,
    end_id: u32,
}

/// Waypoint graph used for long-distance walking.
///
/// Read-mostly: share it behind an `Arc` and take `&mut` only to edit node
/// positions.
#[derive(Debug, Clone)]
pub struct NavigationGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<u32, usize>,
    adjacency: Vec<Vec<usize>>,
    edges: Vec<GraphEdge>,
    search_radius: u32,
}

impl Default for NavigationGraph {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            edges: Vec::new(),
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

impl NavigationGraph {
    /// Build from nodes and edges.
    ///
    /// Duplicate and reversed edges collapse into one; self loops are dropped.
    pub fn new(
        nodes: impl IntoIterator<Item = GraphNode>,
        edges: impl IntoIterator<Item = GraphEdge>,
    ) -> Result<Self, GraphError> {
        let nodes: Vec<GraphNode> = nodes.into_iter().collect();
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(GraphError::DuplicateNode(node.id));
            }
        }

        let mut adjacency = vec![Vec::new(); nodes.len()];
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for edge in edges {
            let a = *index
                .get(&edge.start())
                .ok_or(GraphError::UnknownNode(edge.start()))?;
            let b = *index
                .get(&edge.end())
                .ok_or(GraphError::UnknownNode(edge.end()))?;
            if a == b || !seen.insert(edge) {
                continue;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
            unique.push(edge);
        }

        Ok(Self {
            nodes,
            index,
            adjacency,
            edges: unique,
            search_radius: DEFAULT_SEARCH_RADIUS,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        Self::from_file(serde_json::from_str(text)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, GraphError> {
        Self::from_file(serde_json::from_reader(reader)?)
    }

    /// Load a graph JSON file.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let file = std::fs::File::open(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::from_reader(std::io::BufReader::new(file))?;
        info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded navigation graph"
        );
        Ok(graph)
    }

    fn from_file(file: GraphFile) -> Result<Self, GraphError> {
        let nodes = file.nodes.into_iter().map(|n| GraphNode {
            id: n.id,
            tile: Tile::new(n.x, n.y, n.z),
        });
        let edges = file
            .edges
            .into_iter()
            .map(|e| GraphEdge::new(e.start_id, e.end_id));
        Self::new(nodes, edges)
    }

    /// Set the initial nearest-node search radius.
    pub fn with_search_radius(mut self, radius: u32) -> Self {
        self.search_radius = radius.max(1);
        self
    }

    pub fn search_radius(&self) -> u32 {
        self.search_radius
    }

    pub fn node(&self, id: u32) -> Option<&GraphNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Nodes in load order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes sharing an edge with `id`.
    pub fn neighbours(&self, id: u32) -> Vec<&GraphNode> {
        match self.index.get(&id) {
            Some(&i) => self.adjacency[i].iter().map(|&j| &self.nodes[j]).collect(),
            None => Vec::new(),
        }
    }

    /// Move a node.
    pub fn set_node_tile(&mut self, id: u32, tile: Tile) -> Result<(), GraphError> {
        let &i = self.index.get(&id).ok_or(GraphError::UnknownNode(id))?;
        self.nodes[i].tile = tile;
        Ok(())
    }

    /// Nearest node to `(x, y)` on any plane.
    ///
    /// Looks in a square of half-width `search_radius`, doubling it until a
    /// node falls inside, then picks the strictly closest one (first loaded
    /// wins ties).
    pub fn nearest_node(&self, x: i32, y: i32) -> Option<&GraphNode> {
        self.nearest_where(x, y, |_| true)
    }

    /// Nearest node to `tile` on the same plane.
    pub fn nearest_node_on_plane(&self, tile: Tile) -> Option<&GraphNode> {
        self.nearest_where(tile.x, tile.y, |n| n.tile.plane == tile.plane)
    }

    fn nearest_where(
        &self,
        x: i32,
        y: i32,
        accept: impl Fn(&GraphNode) -> bool,
    ) -> Option<&GraphNode> {
        let (x, y) = (x as i64, y as i64);
        let reach = |n: &GraphNode| (n.tile.x as i64 - x).abs().max((n.tile.y as i64 - y).abs());

        // Radius at which every candidate is inside the square.
        let extent = self.nodes.iter().filter(|n| accept(*n)).map(reach).max()?;

        let mut radius = self.search_radius.max(1) as i64;
        loop {
            let mut best: Option<(&GraphNode, f64)> = None;
            for node in self.nodes.iter().filter(|n| accept(*n) && reach(*n) <= radius) {
                let dx = (node.tile.x as i64 - x) as f64;
                let dy = (node.tile.y as i64 - y) as f64;
                let d = (dx * dx + dy * dy).sqrt();
                if best.map_or(true, |(_, b)| d < b) {
                    best = Some((node, d));
                }
            }
            if let Some((node, _)) = best {
                return Some(node);
            }
            if radius >= extent {
                return None;
            }
            radius = radius.saturating_mul(2);
        }
    }

    /// Cheapest node sequence from `start_id` to `end_id`.
    ///
    /// Returns `[start]` when both ids are equal and an empty vector when
    /// either id is unknown or the nodes are not connected.
    pub fn shortest_path(&self, start_id: u32, end_id: u32) -> Vec<GraphNode> {
        let (Some(&start), Some(&end)) = (self.index.get(&start_id), self.index.get(&end_id))
        else {
            return Vec::new();
        };
        path::dijkstra(&self.nodes, &self.adjacency, start, end)
            .into_iter()
            .map(|i| self.nodes[i])
            .collect()
    }

    /// Tiles to walk from `from` to `destination` through the graph.
    ///
    /// Both ends snap to their nearest node on their own plane. When
    /// `include_destination` is set the raw destination is appended unless it
    /// already ends the path.
    pub fn build_tile_path(
        &self,
        from: Tile,
        destination: Tile,
        include_destination: bool,
    ) -> Result<Vec<Tile>, NavigationError> {
        let unreachable = NavigationError::Unreachable {
            from,
            to: destination,
        };
        let start = self.nearest_node_on_plane(from).ok_or(unreachable.clone())?;
        let end = self
            .nearest_node_on_plane(destination)
            .ok_or(unreachable.clone())?;

        let nodes = self.shortest_path(start.id, end.id);
        if nodes.is_empty() {
            debug!(from = %start, to = %end, "No connection between nodes");
            return Err(unreachable);
        }

        let mut tiles: Vec<Tile> = nodes.iter().map(|n| n.tile).collect();
        if include_destination && tiles.last() != Some(&destination) {
            tiles.push(destination);
        }
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn node(id: u32, x: i32, y: i32, plane: i32) -> GraphNode {
        GraphNode {
            id,
            tile: Tile::new(x, y, plane),
        }
    }

    fn line_graph() -> NavigationGraph {
        // A - B - C along the x axis, D isolated.
        NavigationGraph::new(
            [
                node(1, 0, 0, 0),
                node(2, 10, 0, 0),
                node(3, 20, 0, 0),
                node(4, 500, 500, 0),
            ],
            [GraphEdge::new(1, 2), GraphEdge::new(3, 2)],
        )
        .unwrap()
    }

    #[test]
    fn test_from_json() {
        let graph = NavigationGraph::from_json(
            r#"{
                "nodes": [
                    {"id": 1, "x": 3200, "y": 3200, "z": 0},
                    {"id": 2, "x": 3210, "y": 3200, "z": 0}
                ],
                "edges": [
                    {"start_id": 1, "end_id": 2},
                    {"start_id": 2, "end_id": 1}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node(2).unwrap().tile, Tile::new(3210, 3200, 0));
    }

    #[test]
    fn test_unknown_edge_endpoint_rejected() {
        let err = NavigationGraph::from_json(
            r#"{"nodes": [{"id": 1, "x": 0, "y": 0, "z": 0}],
                "edges": [{"start_id": 1, "end_id": 9}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(9)));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = NavigationGraph::new([node(1, 0, 0, 0), node(1, 5, 5, 0)], []).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(1)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            NavigationGraph::from_json("{nodes: oops"),
            Err(GraphError::Json(_))
        ));
    }

    #[test]
    fn test_nearest_node_picks_closest() {
        let graph = NavigationGraph::new(
            [node(1, 0, 0, 0), node(2, 100, 0, 0), node(3, 0, 100, 0)],
            [],
        )
        .unwrap();
        assert_eq!(graph.nearest_node(10, 10).unwrap().id, 1);
    }

    #[test]
    fn test_nearest_node_expands_radius() {
        let graph = NavigationGraph::new([node(1, 1000, 1000, 0)], []).unwrap();
        assert_eq!(graph.nearest_node(0, 0).unwrap().id, 1);
    }

    #[test]
    fn test_nearest_node_tie_uses_load_order() {
        let graph = NavigationGraph::new([node(7, 5, 0, 0), node(3, -5, 0, 0)], []).unwrap();
        assert_eq!(graph.nearest_node(0, 0).unwrap().id, 7);
    }

    #[test]
    fn test_nearest_node_empty_graph() {
        assert!(NavigationGraph::default().nearest_node(0, 0).is_none());
    }

    #[test]
    fn test_nearest_node_on_plane() {
        let graph = NavigationGraph::new([node(1, 0, 0, 1), node(2, 40, 0, 0)], []).unwrap();
        assert_eq!(graph.nearest_node_on_plane(Tile::new(0, 0, 0)).unwrap().id, 2);
        assert!(graph.nearest_node_on_plane(Tile::new(0, 0, 3)).is_none());
    }

    #[test]
    fn test_shortest_path_line() {
        let ids: Vec<u32> = line_graph().shortest_path(1, 3).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_shortest_path_same_node() {
        let ids: Vec<u32> = line_graph().shortest_path(2, 2).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_shortest_path_disconnected_or_unknown() {
        let graph = line_graph();
        assert!(graph.shortest_path(1, 4).is_empty());
        assert!(graph.shortest_path(1, 99).is_empty());
    }

    #[test]
    fn test_build_tile_path_appends_destination() {
        let graph = line_graph();
        let dest = Tile::new(22, 1, 0);
        let tiles = graph.build_tile_path(Tile::new(1, 1, 0), dest, true).unwrap();
        assert_eq!(
            tiles,
            vec![
                Tile::new(0, 0, 0),
                Tile::new(10, 0, 0),
                Tile::new(20, 0, 0),
                dest
            ]
        );

        let without = graph.build_tile_path(Tile::new(1, 1, 0), dest, false).unwrap();
        assert_eq!(without.last(), Some(&Tile::new(20, 0, 0)));
    }

    #[test]
    fn test_build_tile_path_does_not_duplicate_destination() {
        let graph = line_graph();
        let dest = Tile::new(20, 0, 0);
        let tiles = graph.build_tile_path(Tile::new(0, 0, 0), dest, true).unwrap();
        assert_eq!(tiles.len(), 3);
    }

    #[test]
    fn test_build_tile_path_unreachable() {
        let graph = line_graph();
        let err = graph
            .build_tile_path(Tile::new(0, 0, 0), Tile::new(499, 499, 0), false)
            .unwrap_err();
        assert!(matches!(err, NavigationError::Unreachable { .. }));
    }

    #[test]
    fn test_set_node_tile() {
        let mut graph = line_graph();
        graph.set_node_tile(4, Tile::new(30, 0, 0)).unwrap();
        assert_eq!(graph.nearest_node(31, 0).unwrap().id, 4);
        assert!(matches!(
            graph.set_node_tile(42, Tile::new(0, 0, 0)),
            Err(GraphError::UnknownNode(42))
        ));
    }

    #[test]
    fn test_neighbours() {
        let graph = line_graph();
        let mut ids: Vec<u32> = graph.neighbours(2).iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        assert!(graph.neighbours(4).is_empty());
    }

    proptest! {
        #[test]
        fn prop_adjacency_is_symmetric(
            edges in proptest::collection::vec((0u32..12, 0u32..12), 0..40)
        ) {
            let nodes = (0..12).map(|i| node(i, i as i32 * 3, (i as i32 * 7) % 11, 0));
            let graph = NavigationGraph::new(
                nodes,
                edges.iter().map(|&(a, b)| GraphEdge::new(a, b)),
            ).unwrap();

            for a in 0..12u32 {
                for b in graph.neighbours(a) {
                    prop_assert!(graph.neighbours(b.id).iter().any(|n| n.id == a));
                }
            }
            let unique: HashSet<GraphEdge> = graph.edges().iter().copied().collect();
            prop_assert_eq!(unique.len(), graph.edge_count());
        }
    }
}
