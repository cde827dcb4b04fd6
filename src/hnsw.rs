//! Main HNSW implementation.

mod node;
pub mod params;
#[cfg(feature = "serde")]
mod persist;
mod queue;
pub mod shared;
pub mod storage;
mod visited;

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, VecDeque},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

use self::{params::HNSWParams, queue::Neighbor, storage::NodeArena, visited::VisitedSet};
use crate::error::{HnswError, Result};
use crate::metric::{DistanceMetric, Metric};
pub use node::HNSWNode;

/// Stable identifier assigned at insertion time. Ids are dense, start at 0
/// and are never reused.
pub type NodeId = usize;

/// Upper bound on sampled layers, reached only with extreme level multipliers.
pub const MAX_LEVEL: usize = 32;

/// Hierarchical Navigable Small World (HNSW) index for dense `f32` vectors.
#[derive(Debug)]
pub struct HNSW<D = DistanceMetric> {
    nodes: NodeArena,
    entry_point: Option<NodeId>,
    max_level: usize,
    params: HNSWParams<D>,
    rng: StdRng,
}

impl<D: Metric> HNSW<D> {
    /// Creates a new, empty HNSW index for vectors of `dimension` components.
    pub fn new(dimension: usize, params: HNSWParams<D>) -> Result<Self> {
        if dimension == 0 {
            return Err(HnswError::InvalidParameter(
                "dimension must be positive".into(),
            ));
        }
        params.validate()?;

        debug!(
            dimension,
            max_connections = params.max_connections,
            ef_construction = params.ef_construction,
            seed = params.seed,
            "created HNSW index"
        );

        Ok(HNSW {
            nodes: NodeArena::new(dimension),
            entry_point: None,
            max_level: 0,
            rng: StdRng::seed_from_u64(params.seed),
            params,
        })
    }

    /// Creates an index from the four core hyperparameters, leaving the rest
    /// at their defaults.
    pub fn create(
        dimension: usize,
        max_connections: usize,
        ef_construction: usize,
        metric: D,
    ) -> Result<Self> {
        let params = HNSWParams::<DistanceMetric>::default()
            .with_max_connections(max_connections)
            .with_ef_construction(ef_construction)
            .with_metric(metric);
        Self::new(dimension, params)
    }

    pub fn dimension(&self) -> usize {
        self.nodes.dimension()
    }

    pub fn params(&self) -> &HNSWParams<D> {
        &self.params
    }

    /// Read access to the underlying node storage.
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Returns the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    /// The highest layer present in the graph.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Returns the stored vector for `id`.
    pub fn vector_of(&self, id: NodeId) -> Result<&[f32]> {
        if !self.nodes.contains(id) {
            return Err(HnswError::NotFound(id));
        }
        Ok(self.nodes.vector(id))
    }

    /// Returns the adjacency list of `id` at `level`.
    pub fn neighbors(&self, id: NodeId, level: usize) -> Result<&[NodeId]> {
        self.nodes
            .get(id)
            .map(|node| node.neighbors(level))
            .ok_or(HnswError::NotFound(id))
    }

    pub fn level_of(&self, id: NodeId) -> Result<usize> {
        self.nodes
            .get(id)
            .map(HNSWNode::level)
            .ok_or(HnswError::NotFound(id))
    }

    /// Sets the default beam width used by [`HNSW::search_with_default_ef`].
    pub fn set_ef_search(&mut self, ef_search: usize) -> Result<()> {
        if ef_search == 0 {
            return Err(HnswError::InvalidParameter(
                "ef_search must be at least 1".into(),
            ));
        }
        self.params.ef_search = ef_search;
        Ok(())
    }

    pub fn set_metric(&mut self, metric: D) -> Result<()> {
        if !self.is_empty() {
            return Err(HnswError::ConfigurationLocked("distance metric"));
        }
        self.params.metric = metric;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: usize) -> Result<()> {
        if !self.is_empty() {
            return Err(HnswError::ConfigurationLocked("dimension"));
        }
        if dimension == 0 {
            return Err(HnswError::InvalidParameter(
                "dimension must be positive".into(),
            ));
        }
        self.nodes.set_dimension(dimension);
        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension() {
            return Err(HnswError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        if let Some((index, &value)) = vector.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(HnswError::InvalidValue { index, value });
        }
        Ok(())
    }

    /// Inserts a new vector to the index and returns its id.
    ///
    /// The vector is validated before the graph is touched, so a failed
    /// insert leaves the index unchanged.
    pub fn insert(&mut self, vector: &[f32]) -> Result<NodeId> {
        self.check_vector(vector)?;
        Ok(self.insert_unchecked(vector))
    }

    /// Inserts every vector in order. Nothing is inserted unless all of them
    /// are valid.
    pub fn insert_batch<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<Vec<NodeId>> {
        for vector in vectors {
            self.check_vector(vector.as_ref())?;
        }
        Ok(vectors
            .iter()
            .map(|vector| self.insert_unchecked(vector.as_ref()))
            .collect())
    }

    fn insert_unchecked(&mut self, vector: &[f32]) -> NodeId {
        let node_level = self.random_level();
        let key = self.nodes.push(vector, node_level);

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(key);
            self.max_level = node_level;
            debug!(node = key, level = node_level, "entry point set");
            return key;
        };

        let mut nearest = Neighbor::new(entry_point, self.distance_to(vector, entry_point));
        for level in (node_level + 1..=self.max_level).rev() {
            nearest = self.greedy_closest(vector, nearest, level);
        }

        let capacity = self.nodes.len();
        let mut entry_points = vec![nearest];
        for level in (0..=node_level.min(self.max_level)).rev() {
            let candidates = visited::with_visited(capacity, |visited| {
                self.search_layer(
                    vector,
                    &entry_points,
                    self.params.ef_construction,
                    level,
                    visited,
                )
            });

            let max_connections = self.params.max_connections(level);
            let mut links: Vec<NodeId> = self
                .select_neighbors(&candidates, max_connections)
                .into_iter()
                .map(|n| n.id)
                .collect();

            if level == 0 {
                if let Some(anchor) = self.find_anchor(&candidates) {
                    self.nodes[key].anchor = Some(anchor);
                    if !links.contains(&anchor) {
                        if links.len() >= max_connections {
                            links.pop();
                        }
                        links.push(anchor);
                    }
                }
            }

            self.nodes[key].connections[level] = links.clone();
            for conn in links {
                self.add_reverse_connection(conn, key, level);
            }

            entry_points = candidates;
        }

        if node_level > self.max_level {
            debug!(
                node = key,
                level = node_level,
                previous = self.max_level,
                "entry point promoted"
            );
            self.max_level = node_level;
            self.entry_point = Some(key);
        }

        key
    }

    fn add_reverse_connection(&mut self, conn: NodeId, new_key: NodeId, level: usize) {
        let max_connections = self.params.max_connections(level);
        let Some(connections) = self.nodes[conn].connections.get_mut(level) else {
            return;
        };
        connections.push(new_key);
        if connections.len() <= max_connections {
            return;
        }

        // Anchor links never compete for a slot; the heuristic fills the rest.
        let base = self.nodes.vector(conn);
        let (mut kept, others): (Vec<NodeId>, Vec<NodeId>) = self.nodes[conn]
            .neighbors(level)
            .iter()
            .partition(|&&id| level == 0 && self.is_anchor_link(conn, id));
        let mut candidates: Vec<Neighbor> = others
            .into_iter()
            .map(|id| Neighbor::new(id, self.params.metric.distance(base, self.nodes.vector(id))))
            .collect();
        candidates.sort_unstable();

        let room = max_connections.saturating_sub(kept.len());
        let selected = self.select_neighbors(&candidates, room);
        trace!(
            node = conn,
            level,
            anchored = kept.len(),
            before = candidates.len(),
            after = selected.len(),
            "pruned neighbor list"
        );
        kept.extend(selected.into_iter().map(|n| n.id));
        self.nodes[conn].connections[level] = kept;
    }

    fn is_anchor_link(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes[a].anchor == Some(b) || self.nodes[b].anchor == Some(a)
    }

    /// Number of layer-0 slots of `id` held by anchor links.
    fn anchored_links(&self, id: NodeId) -> usize {
        self.nodes[id]
            .neighbors(0)
            .iter()
            .filter(|&&other| self.is_anchor_link(id, other))
            .count()
    }

    /// Picks the closest candidate that still has a free slot for another
    /// anchor link. If every candidate is full, walks layer 0 outward until it
    /// finds one; the anchor tree always has a leaf with room since the
    /// layer-0 bound is at least 2.
    fn find_anchor(&self, candidates: &[Neighbor]) -> Option<NodeId> {
        let bound = self.params.max_connections(0);
        if let Some(candidate) = candidates
            .iter()
            .find(|c| self.anchored_links(c.id) < bound)
        {
            return Some(candidate.id);
        }

        let start = candidates.first()?.id;
        let mut visited = VisitedSet::new(self.nodes.len());
        let mut queue = VecDeque::from([start]);
        visited.insert(start);
        while let Some(id) = queue.pop_front() {
            if self.anchored_links(id) < bound {
                return Some(id);
            }
            for &next in self.nodes[id].neighbors(0) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Diversity heuristic over `candidates`, which must be sorted by distance
    /// to the base node. A candidate is kept only if no already-kept neighbor
    /// is strictly closer to it than the base is.
    fn select_neighbors(&self, candidates: &[Neighbor], m: usize) -> Vec<Neighbor> {
        if candidates.len() <= m {
            return candidates.to_vec();
        }

        let mut selected: Vec<Neighbor> = Vec::with_capacity(m);
        let mut pruned = Vec::new();

        for &candidate in candidates {
            if selected.len() >= m {
                break;
            }

            let vector = self.nodes.vector(candidate.id);
            let diverse = selected.iter().all(|kept| {
                self.params.metric.distance(vector, self.nodes.vector(kept.id)) >= candidate.distance
            });

            if diverse {
                selected.push(candidate);
            } else if self.params.keep_pruned_connections {
                pruned.push(candidate);
            }
        }

        let room = m - selected.len();
        selected.extend(pruned.into_iter().take(room));
        selected
    }

    fn random_level(&mut self) -> usize {
        // Uniform over (0, 1], so the logarithm stays finite.
        let uniform = 1.0 - self.rng.gen::<f64>();
        let level = (-uniform.ln() * self.params.level_multiplier()).floor() as usize;
        level.min(MAX_LEVEL)
    }

    #[inline]
    fn distance_to(&self, query: &[f32], id: NodeId) -> f32 {
        self.params.metric.distance(query, self.nodes.vector(id))
    }

    /// Searches for the `k` nearest neighbors of `query` with beam width `ef`.
    ///
    /// Results are ordered by ascending distance, ties by ascending id. `ef`
    /// below `k` is raised to `k`. An empty index returns no results for any
    /// `k`; otherwise `k` must be at least 1.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(NodeId, f32)>> {
        self.check_vector(query)?;

        let Some(entry_point) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Err(HnswError::InvalidParameter("k must be at least 1".into()));
        }

        let nearest = self.find_entry_point(query, entry_point);
        let mut results = visited::with_visited(self.nodes.len(), |visited| {
            self.search_layer(query, &[nearest], ef.max(k), 0, visited)
        });
        results.truncate(k);

        Ok(results.into_iter().map(|n| (n.id, n.distance)).collect())
    }

    /// Like [`HNSW::search`], using the configured `ef_search`.
    pub fn search_with_default_ef(&self, query: &[f32], k: usize) -> Result<Vec<(NodeId, f32)>> {
        self.search(query, k, self.params.ef_search)
    }

    /// Runs [`HNSW::search`] for each query. All queries are validated first.
    pub fn search_batch<V: AsRef<[f32]>>(
        &self,
        queries: &[V],
        k: usize,
        ef: usize,
    ) -> Result<Vec<Vec<(NodeId, f32)>>> {
        for query in queries {
            self.check_vector(query.as_ref())?;
        }
        queries
            .iter()
            .map(|query| self.search(query.as_ref(), k, ef))
            .collect()
    }

    fn find_entry_point(&self, query: &[f32], entry_point: NodeId) -> Neighbor {
        let mut nearest = Neighbor::new(entry_point, self.distance_to(query, entry_point));
        for level in (1..=self.max_level).rev() {
            nearest = self.greedy_closest(query, nearest, level);
        }
        nearest
    }

    /// Greedy walk with beam width 1: hop to the closest neighbor until no
    /// neighbor improves on the current node.
    fn greedy_closest(&self, query: &[f32], mut nearest: Neighbor, level: usize) -> Neighbor {
        let mut changed = true;
        while changed {
            changed = false;
            for &id in self.nodes[nearest.id].neighbors(level) {
                let candidate = Neighbor::new(id, self.distance_to(query, id));
                if candidate < nearest {
                    nearest = candidate;
                    changed = true;
                }
            }
        }
        nearest
    }

    /// Beam search over a single layer. Returns at most `ef` nodes sorted by
    /// ascending distance.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[Neighbor],
        ef: usize,
        level: usize,
        visited: &mut VisitedSet,
    ) -> Vec<Neighbor> {
        let mut candidates = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(ef + 1);

        for &entry in entry_points {
            if visited.insert(entry.id) {
                candidates.push(Reverse(entry));
                results.push(entry);
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && current.distance > worst.distance {
                    break;
                }
            }

            for &id in self.nodes[current.id].neighbors(level) {
                if !visited.insert(id) {
                    continue;
                }
                let neighbor = Neighbor::new(id, self.distance_to(query, id));
                let admit = results.len() < ef || results.peek().map_or(true, |worst| neighbor < *worst);
                if admit {
                    candidates.push(Reverse(neighbor));
                    results.push(neighbor);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::SquaredEuclidean;
    use rand::Rng;

    fn random_vectors(rng: &mut StdRng, count: usize, dimension: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|_| (0..dimension).map(|_| rng.gen::<f32>()).collect())
            .collect()
    }

    fn brute_force(data: &[Vec<f32>], query: &[f32], k: usize) -> Vec<NodeId> {
        let mut scored: Vec<Neighbor> = data
            .iter()
            .enumerate()
            .map(|(id, v)| Neighbor::new(id, SquaredEuclidean.distance(query, v)))
            .collect();
        scored.sort();
        scored.into_iter().take(k).map(|n| n.id).collect()
    }

    fn build(data: &[Vec<f32>], params: HNSWParams) -> HNSW {
        let mut hnsw = HNSW::new(data[0].len(), params).unwrap();
        hnsw.insert_batch(data).unwrap();
        hnsw
    }

    /// Ids reachable over layer-0 links from the entry point.
    fn reachable_from_entry(hnsw: &HNSW) -> Vec<bool> {
        let mut seen = vec![false; hnsw.len()];
        let Some(start) = hnsw.entry_point() else {
            return seen;
        };
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(id) = queue.pop_front() {
            for &next in hnsw.neighbors(id, 0).unwrap() {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    #[test]
    fn test_simple_add_and_search() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::SquaredEuclidean).unwrap();

        let a = hnsw.insert(&[0.0, 0.0]).unwrap();
        let b = hnsw.insert(&[1.0, 0.0]).unwrap();
        let _c = hnsw.insert(&[10.0, 10.0]).unwrap();

        let results = hnsw.search(&[0.0, 0.0], 2, 10).unwrap();

        assert_eq!(results, vec![(a, 0.0), (b, 1.0)]);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::default()).unwrap();
        for expected in 0..20 {
            let id = hnsw.insert(&[expected as f32, 1.0]).unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(hnsw.len(), 20);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let hnsw = HNSW::create(3, 8, 20, DistanceMetric::default()).unwrap();
        assert!(hnsw.is_empty());
        assert_eq!(hnsw.entry_point(), None);

        for k in [0, 1, 10, 1000] {
            assert!(hnsw.search(&[1.0, 2.0, 3.0], k, 10).unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let metric = DistanceMetric::default();
        for result in [
            HNSW::create(0, 16, 200, metric),
            HNSW::create(4, 1, 200, metric),
            HNSW::create(4, 0, 200, metric),
            HNSW::create(4, 16, 0, metric),
        ] {
            assert!(matches!(result, Err(HnswError::InvalidParameter(_))));
        }
        assert!(HNSW::create(1, 2, 1, metric).is_ok());
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let mut hnsw = HNSW::create(128, 16, 200, DistanceMetric::default()).unwrap();
        hnsw.insert(&vec![0.5; 128]).unwrap();

        let err = hnsw.insert(&vec![0.5; 64]).unwrap_err();
        assert_eq!(
            err,
            HnswError::DimensionMismatch {
                expected: 128,
                actual: 64
            }
        );
        assert_eq!(hnsw.len(), 1);

        assert!(matches!(
            hnsw.search(&[0.5; 127], 1, 10),
            Err(HnswError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut hnsw = HNSW::create(3, 4, 10, DistanceMetric::default()).unwrap();
        let err = hnsw.insert(&[1.0, f32::NAN, 0.0]).unwrap_err();
        assert!(matches!(err, HnswError::InvalidValue { index: 1, .. }));

        let err = hnsw.search(&[f32::INFINITY, 0.0, 0.0], 1, 10).unwrap_err();
        assert!(matches!(err, HnswError::InvalidValue { index: 0, .. }));
        assert!(hnsw.is_empty());
    }

    #[test]
    fn test_insert_batch_is_all_or_nothing() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::default()).unwrap();
        let batch = vec![vec![0.0f32, 0.0], vec![1.0, 1.0], vec![2.0]];

        assert!(hnsw.insert_batch(&batch).is_err());
        assert!(hnsw.is_empty());

        let ids = hnsw.insert_batch(&batch[..2]).unwrap();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::default()).unwrap();
        let id = hnsw.insert(&[3.0, 4.0]).unwrap();

        assert_eq!(hnsw.vector_of(id).unwrap(), &[3.0, 4.0]);
        assert_eq!(hnsw.vector_of(7), Err(HnswError::NotFound(7)));
        assert_eq!(hnsw.neighbors(7, 0), Err(HnswError::NotFound(7)));
        assert_eq!(hnsw.level_of(7), Err(HnswError::NotFound(7)));
        assert!(hnsw.neighbors(id, 0).unwrap().is_empty());
    }

    #[test]
    fn test_configuration_locked_after_insert() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::SquaredEuclidean).unwrap();

        hnsw.set_metric(DistanceMetric::Cosine).unwrap();
        hnsw.set_dimension(3).unwrap();
        assert!(matches!(
            hnsw.set_dimension(0),
            Err(HnswError::InvalidParameter(_))
        ));

        hnsw.insert(&[1.0, 2.0, 3.0]).unwrap();

        assert_eq!(
            hnsw.set_metric(DistanceMetric::InnerProduct),
            Err(HnswError::ConfigurationLocked("distance metric"))
        );
        assert_eq!(
            hnsw.set_dimension(2),
            Err(HnswError::ConfigurationLocked("dimension"))
        );
        assert_eq!(hnsw.params().metric, DistanceMetric::Cosine);
        assert_eq!(hnsw.dimension(), 3);

        hnsw.set_ef_search(120).unwrap();
        assert_eq!(hnsw.params().ef_search, 120);
        assert!(hnsw.set_ef_search(0).is_err());
    }

    #[test]
    fn test_degree_bounds_hold() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = random_vectors(&mut rng, 1000, 8);
        let hnsw = build(
            &data,
            HNSWParams::default()
                .with_max_connections(4)
                .with_ef_construction(32),
        );

        assert_eq!(hnsw.len(), 1000);
        for (id, node) in hnsw.nodes().iter() {
            for (level, neighbors) in node.connections.iter().enumerate() {
                assert!(
                    neighbors.len() <= hnsw.params().max_connections(level),
                    "node {id} has {} neighbors at level {level}",
                    neighbors.len()
                );
                assert!(!neighbors.contains(&id));
                for &neighbor in neighbors {
                    assert!(hnsw.level_of(neighbor).unwrap() >= level);
                }
            }
            assert!(!node.neighbors(0).is_empty(), "node {id} is isolated");
        }
    }

    #[test]
    fn test_entry_point_sits_on_top_layer() {
        let mut rng = StdRng::seed_from_u64(11);
        let data = random_vectors(&mut rng, 500, 4);
        let hnsw = build(&data, HNSWParams::default().with_max_connections(4));

        let entry_point = hnsw.entry_point().unwrap();
        assert_eq!(hnsw.level_of(entry_point).unwrap(), hnsw.max_level());
        assert!(hnsw.max_level() > 0);
        for (_, node) in hnsw.nodes().iter() {
            assert!(node.level() <= hnsw.max_level());
        }
    }

    #[test]
    fn test_same_seed_builds_same_graph() {
        let mut rng = StdRng::seed_from_u64(3);
        let data = random_vectors(&mut rng, 300, 6);
        let params: HNSWParams = HNSWParams::default()
            .with_max_connections(6)
            .with_ef_construction(40)
            .with_seed(99);

        let first = build(&data, params.clone());
        let second = build(&data, params);

        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.entry_point(), second.entry_point());
    }

    #[test]
    fn test_self_query_and_ordering() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = random_vectors(&mut rng, 600, 24);
        let hnsw = build(&data, HNSWParams::default().with_ef_construction(100));

        for id in 0..data.len() {
            let results = hnsw.search(&data[id], 5, 128).unwrap();
            assert_eq!(results[0], (id, 0.0));
            assert_eq!(results.len(), 5);
            for pair in results.windows(2) {
                assert!(pair[0].1 <= pair[1].1);
                assert_ne!(pair[0].0, pair[1].0);
            }
        }
    }

    #[test]
    fn test_layer_zero_reaches_every_node() {
        for (count, dimension, m, seed) in [(3000, 32, 4, 5), (2000, 16, 2, 9)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let data = random_vectors(&mut rng, count, dimension);
            let hnsw = build(
                &data,
                HNSWParams::default()
                    .with_max_connections(m)
                    .with_ef_construction(32)
                    .with_seed(seed),
            );

            let seen = reachable_from_entry(&hnsw);
            let missing: Vec<_> = (0..count).filter(|&id| !seen[id]).collect();
            assert!(missing.is_empty(), "M={m}: unreachable nodes {missing:?}");

            // A beam as wide as the index must then return every node.
            let mut misses = 0;
            for id in (0..count).step_by(37) {
                let results = hnsw.search(&data[id], 1, count).unwrap();
                if results[0] != (id, 0.0) {
                    misses += 1;
                }
            }
            assert_eq!(misses, 0, "M={m}: self-queries missed");
        }
    }

    #[test]
    fn test_anchor_links_form_a_tree() {
        let mut rng = StdRng::seed_from_u64(13);
        let data = random_vectors(&mut rng, 800, 8);
        let hnsw = build(
            &data,
            HNSWParams::default()
                .with_max_connections(2)
                .with_ef_construction(8),
        );

        for (id, node) in hnsw.nodes().iter() {
            match node.anchor {
                None => assert_eq!(id, 0),
                Some(anchor) => {
                    assert!(anchor < id);
                    assert!(node.neighbors(0).contains(&anchor));
                    assert!(hnsw.neighbors(anchor, 0).unwrap().contains(&id));
                }
            }
            assert!(node.neighbors(0).len() <= hnsw.params().max_connections(0));
        }
    }

    #[test]
    fn test_extreme_level_multiplier_is_clamped() {
        let mut hnsw: HNSW =
            HNSW::new(2, HNSWParams::default().with_level_multiplier(1e300)).unwrap();
        for i in 0..20 {
            hnsw.insert(&[i as f32, 0.0]).unwrap();
        }

        assert!(hnsw.max_level() <= MAX_LEVEL);
        for (_, node) in hnsw.nodes().iter() {
            assert!(node.level() <= MAX_LEVEL);
        }
        assert_eq!(hnsw.search(&[3.0, 0.0], 1, 10).unwrap(), vec![(3, 0.0)]);
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::default()).unwrap();
        hnsw.insert(&[1.0, 1.0]).unwrap();

        assert!(matches!(
            hnsw.search(&[1.0, 1.0], 0, 10),
            Err(HnswError::InvalidParameter(_))
        ));
        assert!(hnsw.search_batch(&[[1.0f32, 1.0]], 0, 10).is_err());
    }

    #[test]
    fn test_search_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = random_vectors(&mut rng, 400, 8);
        let hnsw = build(&data, HNSWParams::default().with_max_connections(8));

        let query: Vec<f32> = (0..8).map(|_| rng.gen()).collect();
        let first = hnsw.search(&query, 10, 30).unwrap();
        let second = hnsw.search(&query, 10, 30).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_small_ef_and_large_k() {
        let mut rng = StdRng::seed_from_u64(8);
        let data = random_vectors(&mut rng, 50, 4);
        let hnsw = build(&data, HNSWParams::default());

        // ef below k is raised to k
        assert_eq!(hnsw.search(&data[0], 10, 1).unwrap().len(), 10);

        let all = hnsw.search(&data[0], 500, 10).unwrap();
        assert_eq!(all.len(), 50);
        let mut ids: Vec<_> = all.iter().map(|&(id, _)| id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_recall_grows_with_ef() {
        let mut rng = StdRng::seed_from_u64(2024);
        let data = random_vectors(&mut rng, 2000, 16);
        let queries = random_vectors(&mut rng, 50, 16);
        let hnsw = build(
            &data,
            HNSWParams::default()
                .with_max_connections(12)
                .with_ef_construction(100),
        );

        let k = 10;
        let truth: Vec<Vec<NodeId>> = queries.iter().map(|q| brute_force(&data, q, k)).collect();

        let recall = |ef: usize| {
            let results = hnsw.search_batch(&queries, k, ef).unwrap();
            let hits: usize = results
                .iter()
                .zip(&truth)
                .map(|(found, expected)| {
                    found.iter().filter(|(id, _)| expected.contains(id)).count()
                })
                .sum();
            hits as f64 / (queries.len() * k) as f64
        };

        let low = recall(10);
        let mid = recall(40);
        let high = recall(160);

        assert!(low <= mid, "recall fell from {low} to {mid}");
        assert!(mid <= high, "recall fell from {mid} to {high}");
        assert!(high >= 0.9, "recall at ef=160 was only {high}");
    }

    #[test]
    fn test_diversity_heuristic_skips_redundant_candidates() {
        let mut hnsw = HNSW::create(1, 4, 10, DistanceMetric::SquaredEuclidean).unwrap();
        for x in [1.0, 2.0, -1.5, 1.2] {
            hnsw.insert(&[x]).unwrap();
        }

        // Candidates relative to a base at 0.0, sorted by distance.
        let mut candidates: Vec<Neighbor> = (0..4)
            .map(|id| Neighbor::new(id, hnsw.distance_to(&[0.0], id)))
            .collect();
        candidates.sort();

        let ids = |selected: Vec<Neighbor>| selected.into_iter().map(|n| n.id).collect::<Vec<_>>();

        // Closest-first would pick 1.0 and 1.2; the heuristic prefers -1.5 over 1.2.
        assert_eq!(ids(hnsw.select_neighbors(&candidates, 2)), vec![0, 2]);
        // 2.0 is shadowed by 1.0 and 1.2 by 1.0.
        assert_eq!(ids(hnsw.select_neighbors(&candidates, 3)), vec![0, 2]);
        // Enough room keeps everything.
        assert_eq!(ids(hnsw.select_neighbors(&candidates, 4)), vec![0, 3, 2, 1]);

        hnsw.params.keep_pruned_connections = true;
        assert_eq!(ids(hnsw.select_neighbors(&candidates, 3)), vec![0, 2, 3]);
    }

    #[test]
    fn test_inner_product_metric() {
        let mut hnsw = HNSW::create(2, 4, 10, DistanceMetric::InnerProduct).unwrap();
        hnsw.insert(&[1.0, 0.0]).unwrap();
        hnsw.insert(&[5.0, 0.0]).unwrap();
        hnsw.insert(&[0.0, 3.0]).unwrap();

        let results = hnsw.search(&[1.0, 0.1], 3, 10).unwrap();
        let ids: Vec<_> = results.iter().map(|&(id, _)| id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert_eq!(results[0].1, -5.0);
    }

    #[test]
    fn test_default_ef_search() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = random_vectors(&mut rng, 100, 4);
        let mut hnsw = build(&data, HNSWParams::default().with_max_connections(4));
        hnsw.set_ef_search(100).unwrap();

        assert_eq!(
            hnsw.search_with_default_ef(&data[17], 3).unwrap(),
            hnsw.search(&data[17], 3, 100).unwrap()
        );
    }
}
