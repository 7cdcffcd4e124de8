//! Dijkstra shortest paths over node indices.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::GraphNode;

#[derive(Debug, Clone, Copy)]
struct Visit {
    cost: f64,
    node: usize,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Visit {}

impl Ord for Visit {
    // Reversed so the max-heap pops the cheapest visit, lower index first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn edge_length(a: &GraphNode, b: &GraphNode) -> f64 {
    a.tile.distance_ignoring_plane(&b.tile)
}

/// Indices of the cheapest path from `start` to `goal`, both inclusive.
///
/// Empty when `goal` cannot be reached.
pub(crate) fn dijkstra(
    nodes: &[GraphNode],
    adjacency: &[Vec<usize>],
    start: usize,
    goal: usize,
) -> Vec<usize> {
    if start == goal {
        return vec![start];
    }

    let mut dist = vec![f64::INFINITY; nodes.len()];
    let mut prev: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut heap = BinaryHeap::new();

    dist[start] = 0.0;
    heap.push(Visit {
        cost: 0.0,
        node: start,
    });

    while let Some(Visit { cost, node }) = heap.pop() {
        if node == goal {
            break;
        }
        if cost > dist[node] {
            continue;
        }
        for &next in &adjacency[node] {
            let candidate = cost + edge_length(&nodes[node], &nodes[next]);
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(node);
                heap.push(Visit {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }

    if prev[goal].is_none() {
        return Vec::new();
    }

    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(p) = prev[cursor] {
        path.push(p);
        cursor = p;
    }
    path.reverse();
    path
}
