//! Readers-writer wrapper for sharing one index across threads.

use parking_lot::{RwLock, RwLockReadGuard};

use super::{NodeId, HNSW};
use crate::error::Result;
use crate::metric::{DistanceMetric, Metric};

/// An [`HNSW`] behind a `parking_lot::RwLock`: searches run concurrently,
/// inserts take the lock exclusively for their whole duration.
#[derive(Debug)]
pub struct ConcurrentHNSW<D = DistanceMetric> {
    inner: RwLock<HNSW<D>>,
}

impl<D> From<HNSW<D>> for ConcurrentHNSW<D> {
    fn from(index: HNSW<D>) -> Self {
        ConcurrentHNSW {
            inner: RwLock::new(index),
        }
    }
}

impl<D: Metric> ConcurrentHNSW<D> {
    pub fn new(index: HNSW<D>) -> Self {
        index.into()
    }

    pub fn insert(&self, vector: &[f32]) -> Result<NodeId> {
        self.inner.write().insert(vector)
    }

    pub fn insert_batch<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<NodeId>> {
        self.inner.write().insert_batch(vectors)
    }

    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(NodeId, f32)>> {
        self.inner.read().search(query, k, ef)
    }

    pub fn search_with_default_ef(&self, query: &[f32], k: usize) -> Result<Vec<(NodeId, f32)>> {
        self.inner.read().search_with_default_ef(query, k)
    }

    pub fn search_batch<V: AsRef<[f32]>>(
        &self,
        queries: &[V],
        k: usize,
        ef: usize,
    ) -> Result<Vec<Vec<(NodeId, f32)>>> {
        self.inner.read().search_batch(queries, k, ef)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a copy of the stored vector, since the lock is released on return.
    pub fn vector_of(&self, id: NodeId) -> Result<Vec<f32>> {
        self.inner.read().vector_of(id).map(<[f32]>::to_vec)
    }

    /// Holds the read lock for a batch of calls against the same snapshot.
    pub fn read(&self) -> RwLockReadGuard<'_, HNSW<D>> {
        self.inner.read()
    }

    pub fn into_inner(self) -> HNSW<D> {
        self.inner.into_inner()
    }
}
