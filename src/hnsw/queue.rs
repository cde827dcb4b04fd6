//! Priority-queue entries used by the beam searches.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use super::NodeId;

/// A node paired with its distance to the current query.
///
/// Ordered by distance, then by id, so heaps and sorts are deterministic even
/// when distances tie.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Neighbor {
    pub distance: f32,
    pub id: NodeId,
}

impl Neighbor {
    pub fn new(id: NodeId, distance: f32) -> Self {
        Neighbor { distance, id }
    }

    fn key(&self) -> (OrderedFloat<f32>, NodeId) {
        (OrderedFloat(self.distance), self.id)
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
