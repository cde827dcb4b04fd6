//! Distance functions. Every metric returns a value where smaller means closer.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub trait Metric {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Calculates the squared Euclidean distance between two vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SquaredEuclidean;

impl Metric for SquaredEuclidean {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

/// Negated inner product, so that larger dot products rank closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InnerProduct;

impl Metric for InnerProduct {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
    }
}

/// Calculates the cosine distance (1 - cosine similarity) between two vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cosine;

impl Metric for Cosine {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        let mut dot = 0.0f32;
        let mut a_norm = 0.0f32;
        let mut b_norm = 0.0f32;

        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            a_norm += x * x;
            b_norm += y * y;
        }

        if a_norm == 0.0 && b_norm == 0.0 {
            return 0.0; // Both vectors are all zeros, consider them identical
        }
        if a_norm == 0.0 || b_norm == 0.0 {
            return 1.0;
        }

        1.0 - dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

/// The built-in metrics, selectable at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceMetric {
    #[default]
    SquaredEuclidean,
    InnerProduct,
    Cosine,
}

impl Metric for DistanceMetric {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::SquaredEuclidean => SquaredEuclidean.distance(a, b),
            DistanceMetric::InnerProduct => InnerProduct.distance(a, b),
            DistanceMetric::Cosine => Cosine.distance(a, b),
        }
    }
}
