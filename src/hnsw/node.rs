//! HNSWNode structure.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::NodeId;

/// A node in the HNSW graph. The vector itself lives in the arena's flat
/// buffer; the node only carries one adjacency list per layer it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HNSWNode {
    pub connections: Vec<Vec<NodeId>>,
    /// The layer-0 neighbor this node was attached through. The link between
    /// them is kept in both adjacency lists and never pruned, so the anchors
    /// form a spanning tree of layer 0.
    pub anchor: Option<NodeId>,
}

impl HNSWNode {
    pub(crate) fn new(level: usize) -> Self {
        HNSWNode {
            connections: vec![Vec::new(); level + 1],
            anchor: None,
        }
    }

    /// The highest layer this node participates in.
    pub fn level(&self) -> usize {
        self.connections.len() - 1
    }

    /// Neighbors at `level`, or an empty slice above the node's top layer.
    pub fn neighbors(&self, level: usize) -> &[NodeId] {
        self.connections.get(level).map_or(&[], Vec::as_slice)
    }
}
