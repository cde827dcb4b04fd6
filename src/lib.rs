//! proxvec
//!
//! proxvec is a Hierarchical Navigable Small World (HNSW) implementation for
//! fast approximate nearest neighbor search on dense `f32` vectors.

mod error;
mod hnsw;
pub mod metric;

pub use error::{HnswError, Result};
pub use hnsw::params::HNSWParams;
pub use hnsw::shared::ConcurrentHNSW;
pub use hnsw::storage;
pub use hnsw::{HNSWNode, NodeId, HNSW, MAX_LEVEL};
pub use metric::{DistanceMetric, Metric};
