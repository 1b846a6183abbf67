//! Index configuration

use serde::{Deserialize, Serialize};

use crate::metric::Metric;

/// Configuration for building a flat index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Ranking metric.
    pub metric: Metric,
    /// Scan rows in parallel once `rows * dimension` reaches this.
    pub parallel_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: Metric::L2,
            parallel_threshold: 1 << 16,
        }
    }
}

impl IndexConfig {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            ..Self::default()
        }
    }

    /// Override the parallel scan threshold.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}
