//! Distance and similarity metrics for ranking corpus rows

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};

use crate::error::{RecommendError, Result};

/// How corpus rows are ranked against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance, lower is closer
    L2,
    /// Inner product over L2-normalized vectors, higher is closer
    Cosine,
    /// Raw inner product, higher is closer
    InnerProduct,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::L2, Metric::Cosine, Metric::InnerProduct];

    /// Name used when parsing and printing the metric.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Cosine => "cosine",
            Metric::InnerProduct => "inner_product",
        }
    }

    /// Parse a metric name, accepting only the metrics in `allowed`.
    pub fn parse_in(name: &str, allowed: &[Metric]) -> Result<Metric> {
        allowed
            .iter()
            .copied()
            .find(|m| m.name() == name)
            .ok_or_else(|| RecommendError::InvalidMetric {
                metric: name.to_string(),
                allowed: allowed
                    .iter()
                    .map(|m| m.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Whether stored rows and queries are L2-normalized for this metric.
    pub fn normalizes(&self) -> bool {
        matches!(self, Metric::Cosine)
    }

    /// Whether a higher score means closer.
    pub fn higher_is_closer(&self) -> bool {
        !matches!(self, Metric::L2)
    }

    /// Score a stored row against a (already prepared) query.
    pub fn score(&self, row: ArrayView1<'_, f32>, query: ArrayView1<'_, f32>) -> f32 {
        match self {
            Metric::L2 => squared_l2(row, query),
            Metric::Cosine | Metric::InnerProduct => inner_product(row, query),
        }
    }

    /// Order two scores so that `Less` means `a` ranks ahead of `b`.
    ///
    /// NaN always ranks last.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if self.higher_is_closer() => {
                b.partial_cmp(&a).unwrap_or(Ordering::Equal)
            }
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::parse_in(s, &Metric::ALL)
    }
}

/// Squared Euclidean distance between two equal-length vectors
pub fn squared_l2(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Inner product of two equal-length vectors
pub fn inner_product(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Largest absolute component of a vector, 0 for an empty one
fn max_abs(v: ArrayView1<'_, f32>) -> f32 {
    v.iter().fold(0.0f32, |m, x| m.max(x.abs()))
}

/// Euclidean norm of a vector.
///
/// Components are scaled by the largest magnitude before squaring, so the
/// sum of squares neither overflows for large components nor underflows for
/// tiny ones.
pub fn l2_norm(v: ArrayView1<'_, f32>) -> f32 {
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * v.iter().map(|x| (x / scale) * (x / scale)).sum::<f32>().sqrt()
}

/// Scale a vector to unit length in place.
///
/// A zero vector is left unchanged and `false` is returned.
pub fn normalize_l2(mut v: ArrayViewMut1<'_, f32>) -> bool {
    let scale = max_abs(v.view());
    if scale == 0.0 {
        return false;
    }
    // After this every component is in [-1, 1] and the norm in [1, sqrt(D)].
    v.mapv_inplace(|x| x / scale);
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.mapv_inplace(|x| x / norm);
    true
}
