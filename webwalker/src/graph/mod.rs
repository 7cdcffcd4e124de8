//! Navigation graph.
//!
//! An undirected graph of walkable waypoints loaded from JSON:
//!
//! ```json
//! {
//!   "nodes": [{ "id": 1, "x": 3200, "y": 3200, "z": 0 }],
//!   "edges": [{ "start_id": 1, "end_id": 2 }]
//! }
//! ```
//!
//! `z` is the plane. Edge lengths are the Euclidean distance between their
//! endpoints; edges are undirected and duplicates collapse.

mod navigation;
mod path;
mod selection;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use thiserror::Error;

use crate::coord::Tile;

pub use navigation::NavigationGraph;
pub use selection::NodeSelection;

/// Initial half-width of the nearest-node search square, in tiles.
pub const DEFAULT_SEARCH_RADIUS: u32 = 50;

/// Graph loading and editing errors.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read graph {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown node id {0}")]
    UnknownNode(u32),

    #[error("duplicate node id {0}")]
    DuplicateNode(u32),
}

/// Path construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no path from {from} to {to}")]
    Unreachable { from: Tile, to: Tile },
}

/// A waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub id: u32,
    pub tile: Tile,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.tile)
    }
}

/// An undirected edge. `(a, b)` and `(b, a)` are the same edge.
#[derive(Debug, Clone, Copy)]
pub struct GraphEdge {
    start: u32,
    end: u32,
}

impl GraphEdge {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Endpoints with the smaller id first.
    pub fn key(&self) -> (u32, u32) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.start == id || self.end == id
    }

    /// The endpoint opposite `id`, if `id` is on this edge.
    pub fn other(&self, id: u32) -> Option<u32> {
        if self.start == id {
            Some(self.end)
        } else if self.end == id {
            Some(self.start)
        } else {
            None
        }
    }
}

impl PartialEq for GraphEdge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for GraphEdge {}

impl Hash for GraphEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
