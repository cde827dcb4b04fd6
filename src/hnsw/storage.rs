//! Arena storage for graph nodes.
//!
//! Vectors are packed into one contiguous buffer (`dimension` floats per node)
//! and adjacency lists are kept in a parallel `Vec` indexed by node id.

use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::node::HNSWNode;
use super::NodeId;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeArena {
    dimension: usize,
    vectors: Vec<f32>,
    nodes: Vec<HNSWNode>,
}

impl NodeArena {
    pub fn new(dimension: usize) -> Self {
        NodeArena {
            dimension,
            vectors: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Appends a node and returns its id. Ids are dense and never reused.
    pub(crate) fn push(&mut self, vector: &[f32], level: usize) -> NodeId {
        debug_assert_eq!(vector.len(), self.dimension);
        let id = self.nodes.len();
        self.vectors.extend_from_slice(vector);
        self.nodes.push(HNSWNode::new(level));
        id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) fn set_dimension(&mut self, dimension: usize) {
        debug_assert!(self.is_empty());
        self.dimension = dimension;
    }

    #[inline]
    pub fn vector(&self, id: NodeId) -> &[f32] {
        let start = id * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    pub fn get(&self, id: NodeId) -> Option<&HNSWNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &HNSWNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks the internal layout after deserialization. `max_connections`
    /// gives the degree bound per layer.
    #[cfg(feature = "serde")]
    pub(crate) fn check_consistency(
        &self,
        max_connections: impl Fn(usize) -> usize,
    ) -> Result<(), String> {
        if self.vectors.len() != self.nodes.len() * self.dimension {
            return Err(format!(
                "vector buffer holds {} floats, expected {} nodes x {} dimensions",
                self.vectors.len(),
                self.nodes.len(),
                self.dimension
            ));
        }
        if let Some((id, _)) = self.iter().find(|(_, n)| n.connections.is_empty()) {
            return Err(format!("node {id} has no layers"));
        }
        for (id, node) in self.iter() {
            for (level, neighbors) in node.connections.iter().enumerate() {
                if neighbors.len() > max_connections(level) {
                    return Err(format!(
                        "node {id} has {} neighbors at layer {level}, bound is {}",
                        neighbors.len(),
                        max_connections(level)
                    ));
                }
                for &n in neighbors {
                    match self.get(n) {
                        None => {
                            return Err(format!(
                                "node {id} links to unknown node {n} at layer {level}"
                            ))
                        }
                        Some(other) if other.level() < level => {
                            return Err(format!(
                                "node {id} links to node {n} at layer {level}, above its top layer {}",
                                other.level()
                            ))
                        }
                        Some(_) => {}
                    }
                }
            }
            match node.anchor {
                None if id == 0 => {}
                Some(anchor)
                    if anchor < id
                        && node.neighbors(0).contains(&anchor)
                        && self.nodes[anchor].neighbors(0).contains(&id) => {}
                anchor => {
                    return Err(format!("node {id} has a broken anchor link {anchor:?}"))
                }
            }
        }
        Ok(())
    }
}

impl Index<NodeId> for NodeArena {
    type Output = HNSWNode;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output {
        &mut self.nodes[index]
    }
}
