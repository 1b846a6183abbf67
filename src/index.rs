//! Index trait for pluggable search backends

use ndarray::ArrayView1;

use crate::error::Result;
use crate::metric::Metric;

/// A scored search hit: a corpus row and its score under the index metric.
///
/// For L2 the score is the squared distance; for cosine and inner product
/// it is the inner product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub score: f32,
}

impl Neighbor {
    pub fn new(index: usize, score: f32) -> Self {
        Self { index, score }
    }
}

/// An immutable search index over a fixed corpus.
///
/// The flat index is the only implementation; an approximate index could
/// sit behind the same trait without changing callers.
pub trait Index: Send + Sync {
    /// Search for the `top_k` best rows for `query`, best first.
    ///
    /// Returns `min(top_k, len())` neighbors.
    fn search_scored(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Result<Vec<Neighbor>>;

    /// Like [`Index::search_scored`], returning only row indices.
    fn search(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Result<Vec<usize>> {
        Ok(self
            .search_scored(query, top_k)?
            .into_iter()
            .map(|n| n.index)
            .collect())
    }

    /// The metric used by this index.
    fn metric(&self) -> Metric;

    /// Length of every stored row.
    fn dimension(&self) -> usize;

    /// The number of rows in this index.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
