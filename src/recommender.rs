//! Recommendation policy layered over a search index

use std::time::Instant;

use ndarray::{Array2, ArrayView1};
use tracing::{debug, warn};

use crate::array::FeatureArray;
use crate::error::{RecommendError, Result};
use crate::flat_index::FlatIndex;
use crate::index::Index;
use crate::metric::Metric;
use crate::metrics::MetricsCollector;

/// Metrics a recommender can be constructed with.
pub const RECOMMENDER_METRICS: [Metric; 2] = [Metric::L2, Metric::Cosine];

/// Recommends the corpus rows most similar to a query vector.
pub trait Recommender {
    /// Indices of the `top_k` most similar corpus rows, best first.
    ///
    /// If `top_k` exceeds the corpus size, every row is returned.
    fn recommend(&self, query: &FeatureArray, top_k: usize) -> Result<Vec<usize>>;
}

/// A recommender backed by any [`Index`].
///
/// Queries are validated before they reach the index and oversized `top_k`
/// requests are clamped to the corpus size. No lock is taken per query.
#[derive(Debug)]
pub struct IndexRecommender<I: Index> {
    index: I,
    metrics: MetricsCollector,
}

/// A recommender over an exact flat index.
pub type FlatRecommender = IndexRecommender<FlatIndex>;

impl IndexRecommender<FlatIndex> {
    /// Build a flat recommender over a copy of `corpus`.
    ///
    /// `metric` must be `"l2"` or `"cosine"`; it is checked before the corpus
    /// is looked at.
    pub fn new(corpus: &FeatureArray, metric: &str) -> Result<Self> {
        let metric = Metric::parse_in(metric, &RECOMMENDER_METRICS)?;
        let matrix = corpus.as_matrix()?;
        Ok(Self::with_index(FlatIndex::build(matrix.to_owned(), metric)?))
    }

    /// Build a flat recommender that takes ownership of `corpus`.
    pub fn from_matrix(corpus: Array2<f32>, metric: &str) -> Result<Self> {
        let metric = Metric::parse_in(metric, &RECOMMENDER_METRICS)?;
        Ok(Self::with_index(FlatIndex::build(corpus, metric)?))
    }
}

impl<I: Index> IndexRecommender<I> {
    /// Wrap an already built index.
    pub fn with_index(index: I) -> Self {
        Self::with_metrics(index, MetricsCollector::new())
    }

    /// Wrap an already built index, recording into `metrics`.
    pub fn with_metrics(index: I, metrics: MetricsCollector) -> Self {
        Self { index, metrics }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Metrics recorded so far.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Recommend with a typed `f32` query; only length and `top_k` are checked.
    pub fn recommend_view(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Result<Vec<usize>> {
        let result = self.recommend_checked(query, top_k);
        if result.is_err() {
            self.metrics.record_rejection();
        }
        result
    }

    fn recommend_checked(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Result<Vec<usize>> {
        if query.len() != self.index.dimension() {
            return Err(RecommendError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Err(RecommendError::InvalidArgument {
                reason: "top_k must be at least 1".to_string(),
            });
        }

        let corpus_size = self.index.len();
        let k = top_k.min(corpus_size);
        if k < top_k {
            warn!(
                requested = top_k,
                corpus_size,
                adjusted = k,
                "requested top_k exceeds corpus size; clamping"
            );
            self.metrics.record_clamp();
        } else {
            debug!(top_k = k, "recommending");
        }

        let start = Instant::now();
        let indices = if k == 0 {
            Vec::new()
        } else {
            self.index.search(query, k)?
        };
        self.metrics.record_query(start.elapsed());

        Ok(indices)
    }
}

impl<I: Index> Recommender for IndexRecommender<I> {
    fn recommend(&self, query: &FeatureArray, top_k: usize) -> Result<Vec<usize>> {
        let query = match query.as_query(self.index.dimension()) {
            Ok(query) => query,
            Err(e) => {
                self.metrics.record_rejection();
                return Err(e);
            }
        };
        self.recommend_view(query, top_k)
    }
}
