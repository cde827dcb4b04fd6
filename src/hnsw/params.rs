//! Contains the HNSWParams structure for configuring the HNSW index.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{HnswError, Result};
use crate::metric::DistanceMetric;

/// Parameters for configuring the HNSW index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HNSWParams<D = DistanceMetric> {
    pub max_connections: usize,
    pub level_0_max_connections_multiplier: f32,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Explicit override; `None` means `1 / ln(max_connections)`.
    pub level_multiplier: Option<f64>,
    pub keep_pruned_connections: bool,
    pub seed: u64,
    pub metric: D,
}

impl<D> HNSWParams<D> {
    pub fn with_max_connections(self, max_connections: usize) -> Self {
        HNSWParams {
            max_connections,
            ..self
        }
    }

    pub fn with_level_0_max_connections_multiplier(
        self,
        level_0_max_connections_multiplier: f32,
    ) -> Self {
        HNSWParams {
            level_0_max_connections_multiplier,
            ..self
        }
    }

    /// Degree bound for `level`: `M` above layer 0, `M * multiplier` at layer 0.
    pub fn max_connections(&self, level: usize) -> usize {
        if level == 0 {
            (self.max_connections as f32 * self.level_0_max_connections_multiplier) as usize
        } else {
            self.max_connections
        }
    }

    pub fn with_ef_construction(self, ef_construction: usize) -> Self {
        HNSWParams {
            ef_construction,
            ..self
        }
    }

    pub fn with_ef_search(self, ef_search: usize) -> Self {
        HNSWParams { ef_search, ..self }
    }

    pub fn with_level_multiplier(self, level_multiplier: f64) -> Self {
        HNSWParams {
            level_multiplier: Some(level_multiplier),
            ..self
        }
    }

    pub fn level_multiplier(&self) -> f64 {
        self.level_multiplier
            .unwrap_or_else(|| 1.0 / (self.max_connections as f64).ln())
    }

    pub fn with_keep_pruned_connections(self, keep_pruned_connections: bool) -> Self {
        HNSWParams {
            keep_pruned_connections,
            ..self
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        HNSWParams { seed, ..self }
    }

    pub fn with_metric<E>(self, metric: E) -> HNSWParams<E> {
        HNSWParams {
            max_connections: self.max_connections,
            level_0_max_connections_multiplier: self.level_0_max_connections_multiplier,
            ef_construction: self.ef_construction,
            ef_search: self.ef_search,
            level_multiplier: self.level_multiplier,
            keep_pruned_connections: self.keep_pruned_connections,
            seed: self.seed,
            metric,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_connections < 2 {
            return Err(HnswError::InvalidParameter(format!(
                "max_connections must be at least 2, got {}",
                self.max_connections
            )));
        }
        if self.max_connections(0) < self.max_connections {
            return Err(HnswError::InvalidParameter(format!(
                "layer 0 bound {} is smaller than max_connections {}",
                self.max_connections(0),
                self.max_connections
            )));
        }
        if self.ef_construction < 1 {
            return Err(HnswError::InvalidParameter(
                "ef_construction must be at least 1".into(),
            ));
        }
        if self.ef_search < 1 {
            return Err(HnswError::InvalidParameter(
                "ef_search must be at least 1".into(),
            ));
        }
        let ml = self.level_multiplier();
        if !ml.is_finite() || ml < 0.0 {
            return Err(HnswError::InvalidParameter(format!(
                "level_multiplier must be finite and non-negative, got {ml}"
            )));
        }
        Ok(())
    }
}

impl<D: Default> Default for HNSWParams<D> {
    fn default() -> Self {
        HNSWParams {
            max_connections: 16,
            level_0_max_connections_multiplier: 2.0,
            ef_construction: 200,
            ef_search: 50,
            level_multiplier: None,
            keep_pruned_connections: false,
            seed: 42,
            metric: D::default(),
        }
    }
}
