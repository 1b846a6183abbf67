//! Brute-force flat index, exact O(N·D) k-NN search

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::array::FeatureArray;
use crate::config::IndexConfig;
use crate::error::{RecommendError, Result};
use crate::index::{Index, Neighbor};
use crate::metric::{normalize_l2, Metric};

/// A flat (brute-force) index that scores every stored row per query.
///
/// The corpus is owned by the index and never changes after [`FlatIndex::build`],
/// so a `FlatIndex` can be shared across threads and queried concurrently.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    vectors: Array2<f32>,
    metric: Metric,
    parallel_threshold: usize,
}

impl FlatIndex {
    /// Build an index over `corpus` (N rows of dimension D).
    ///
    /// With [`Metric::Cosine`] every row is L2-normalized once, here. Rows with
    /// zero norm are stored unchanged, so they score 0 against every query.
    pub fn build(corpus: Array2<f32>, metric: Metric) -> Result<Self> {
        Self::build_with_config(corpus, &IndexConfig::new(metric))
    }

    /// Build an index using the metric and tuning from `config`.
    pub fn build_with_config(mut corpus: Array2<f32>, config: &IndexConfig) -> Result<Self> {
        if corpus.ncols() == 0 {
            return Err(RecommendError::InvalidShape {
                reason: "corpus must have at least one column".to_string(),
            });
        }

        if config.metric.normalizes() {
            debug!("metric is cosine, normalizing corpus rows to unit length");
            let zero_rows = corpus
                .axis_iter_mut(Axis(0))
                .map(normalize_l2)
                .filter(|normalized| !normalized)
                .count();
            if zero_rows > 0 {
                warn!(zero_rows, "corpus contains zero-norm rows; left unnormalized");
            }
        }

        debug!(
            rows = corpus.nrows(),
            dimension = corpus.ncols(),
            metric = %config.metric,
            "built flat index"
        );

        Ok(Self {
            vectors: corpus,
            metric: config.metric,
            parallel_threshold: config.parallel_threshold,
        })
    }

    /// Build from a dynamically typed array, copying its data.
    ///
    /// The array must be a 2-D `f32` matrix with at least one column.
    pub fn from_features(corpus: &FeatureArray, metric: Metric) -> Result<Self> {
        let matrix = corpus.as_matrix()?;
        Self::build(matrix.to_owned(), metric)
    }

    /// The stored rows, normalized when the metric is cosine.
    pub fn vectors(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    /// Search with a dynamically typed query.
    ///
    /// Rank, length and dtype are all validated before any scoring runs.
    pub fn search_features(&self, query: &FeatureArray, top_k: usize) -> Result<Vec<usize>> {
        let query = query.as_query(self.dimension())?;
        self.search(query, top_k)
    }

    /// Search every row of `queries`, returning one result list per row.
    pub fn search_batch(
        &self,
        queries: ArrayView2<'_, f32>,
        top_k: usize,
    ) -> Result<Vec<Vec<usize>>> {
        self.check_dimension(queries.ncols())?;
        let k = self.effective_k(top_k)?;

        Ok((0..queries.nrows())
            .into_par_iter()
            .map(|i| {
                self.search_unchecked(queries.row(i), k)
                    .into_iter()
                    .map(|n| n.index)
                    .collect::<Vec<usize>>()
            })
            .collect())
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension() {
            return Err(RecommendError::DimensionMismatch {
                expected: self.dimension(),
                actual,
            });
        }
        Ok(())
    }

    /// Validate `top_k` and clamp it to the corpus size.
    fn effective_k(&self, top_k: usize) -> Result<usize> {
        if top_k == 0 {
            return Err(RecommendError::InvalidArgument {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        let k = top_k.min(self.len());
        if k < top_k {
            warn!(
                requested = top_k,
                corpus_size = self.len(),
                adjusted = k,
                "requested top_k exceeds corpus size; clamping"
            );
        }
        Ok(k)
    }

    /// Private copy of the query, normalized when the metric asks for it.
    fn prepare_query(&self, query: ArrayView1<'_, f32>) -> Array1<f32> {
        let mut prepared = query.to_owned();
        if self.metric.normalizes() {
            normalize_l2(prepared.view_mut());
        }
        prepared
    }

    fn scores(&self, query: ArrayView1<'_, f32>) -> Vec<f32> {
        let metric = self.metric;
        let rows = self.vectors.nrows();
        if rows * self.dimension() >= self.parallel_threshold {
            (0..rows)
                .into_par_iter()
                .map(|i| metric.score(self.vectors.row(i), query))
                .collect()
        } else {
            self.vectors
                .outer_iter()
                .map(|row| metric.score(row, query))
                .collect()
        }
    }

    /// Score and rank with an already validated query and clamped `k`.
    fn search_unchecked(&self, query: ArrayView1<'_, f32>, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let query = self.prepare_query(query);
        let scores = self.scores(query.view());
        select_top_k(self.metric, scores, k)
    }
}

/// Keep the best `k` scores, ordered best first with ties by ascending row.
fn select_top_k(metric: Metric, scores: Vec<f32>, k: usize) -> Vec<Neighbor> {
    let cmp = move |a: &Neighbor, b: &Neighbor| {
        metric
            .compare(a.score, b.score)
            .then_with(|| a.index.cmp(&b.index))
    };

    let mut hits: Vec<Neighbor> = scores
        .into_iter()
        .enumerate()
        .map(|(i, score)| Neighbor::new(i, score))
        .collect();

    if k < hits.len() {
        hits.select_nth_unstable_by(k - 1, cmp);
        hits.truncate(k);
    }
    hits.sort_unstable_by(cmp);
    hits
}

impl Index for FlatIndex {
    fn search_scored(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query.len())?;
        let k = self.effective_k(top_k)?;
        Ok(self.search_unchecked(query, k))
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    fn len(&self) -> usize {
        self.vectors.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array2};

    fn small_corpus() -> Array2<f32> {
        arr2(&[[0.0, 1.0], [1.0, 0.0], [0.5, 0.5]])
    }

    #[test]
    fn test_flat_index_exact_match() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let query = arr1(&[1.0f32, 0.0]);
        assert_eq!(index.search(query.view(), 1).unwrap(), vec![1]);

        let scored = index.search_scored(query.view(), 3).unwrap();
        assert_eq!(scored[0].index, 1);
        assert!(scored[0].score < 1e-6);
        assert_relative_eq!(scored[1].score, 0.5, epsilon = 1e-6);
        assert_eq!(scored[1].index, 2);
    }

    #[test]
    fn test_cosine_normalizes_corpus() {
        let corpus = arr2(&[[3.0f32, 4.0], [0.0, 2.0]]);
        let index = FlatIndex::build(corpus, Metric::Cosine).unwrap();
        let stored = index.vectors();
        assert_relative_eq!(stored[[0, 0]], 0.6, epsilon = 1e-6);
        assert_relative_eq!(stored[[0, 1]], 0.8, epsilon = 1e-6);
        assert_relative_eq!(stored[[1, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let corpus = arr2(&[[10.0f32, 0.0], [1.0, 1.0], [0.0, 0.1]]);
        let index = FlatIndex::build(corpus, Metric::Cosine).unwrap();
        let query = arr1(&[0.0f32, 50.0]);
        assert_eq!(index.search(query.view(), 3).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_cosine_zero_row_left_unchanged() {
        let corpus = arr2(&[[0.0f32, 0.0], [1.0, 0.0], [-1.0, 0.0]]);
        let index = FlatIndex::build(corpus, Metric::Cosine).unwrap();
        assert_eq!(index.vectors().row(0), arr1(&[0.0f32, 0.0]).view());

        let query = arr1(&[1.0f32, 0.0]);
        let scored = index.search_scored(query.view(), 3).unwrap();
        let order: Vec<usize> = scored.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(scored[1].score, 0.0);
    }

    #[test]
    fn test_cosine_keeps_large_magnitude_rows() {
        let corpus = arr2(&[[1e20f32, 0.0], [0.0, 1.0]]);
        let index = FlatIndex::build(corpus, Metric::Cosine).unwrap();
        assert_eq!(index.vectors().row(0), arr1(&[1.0f32, 0.0]).view());

        let query = arr1(&[1.0f32, 0.0]);
        let scored = index.search_scored(query.view(), 2).unwrap();
        assert_eq!(scored[0].index, 0);
        assert_relative_eq!(scored[0].score, 1.0, epsilon = 1e-6);
        assert_eq!(scored[1].index, 1);
        assert_eq!(scored[1].score, 0.0);

        let huge_query = arr1(&[0.0f32, 3e25]);
        assert_eq!(index.search(huge_query.view(), 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_cosine_zero_query_ties_by_row() {
        let corpus = arr2(&[[1.0f32, 2.0], [3.0, 1.0], [0.5, 0.5]]);
        let index = FlatIndex::build(corpus, Metric::Cosine).unwrap();
        let query = arr1(&[0.0f32, 0.0]);
        assert_eq!(index.search(query.view(), 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_query_buffer_not_mutated() {
        let index = FlatIndex::build(small_corpus(), Metric::Cosine).unwrap();
        let query = arr1(&[3.0f32, 4.0]);
        index.search(query.view(), 2).unwrap();
        assert_eq!(query, arr1(&[3.0f32, 4.0]));
    }

    #[test]
    fn test_inner_product_prefers_magnitude() {
        let corpus = arr2(&[[1.0f32, 0.0], [5.0, 0.0], [0.0, 9.0]]);
        let index = FlatIndex::build(corpus, Metric::InnerProduct).unwrap();
        let query = arr1(&[1.0f32, 0.0]);
        assert_eq!(index.search(query.view(), 2).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_ties_break_by_ascending_index() {
        let corpus = arr2(&[[1.0f32, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]);
        let index = FlatIndex::build(corpus, Metric::L2).unwrap();
        let query = arr1(&[0.0f32, 1.0]);
        assert_eq!(index.search(query.view(), 4).unwrap(), vec![1, 3, 0, 2]);
        assert_eq!(index.search(query.view(), 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_nan_rows_rank_last() {
        let corpus = arr2(&[[f32::NAN, 0.0], [5.0, 5.0], [1.0, 1.0]]);
        let index = FlatIndex::build(corpus, Metric::L2).unwrap();
        let query = arr1(&[0.0f32, 0.0]);
        assert_eq!(index.search(query.view(), 3).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_top_k_clamped_to_corpus() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let query = arr1(&[1.0f32, 0.0]);
        assert_eq!(index.search(query.view(), 10).unwrap().len(), 3);
    }

    #[test]
    fn test_top_k_zero_rejected() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let query = arr1(&[1.0f32, 0.0]);
        assert!(matches!(
            index.search(query.view(), 0),
            Err(RecommendError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_empty_index() {
        let index = FlatIndex::build(Array2::zeros((0, 3)), Metric::Cosine).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 3);
        let query = arr1(&[1.0f32, 2.0, 3.0]);
        assert!(index.search(query.view(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_columns_rejected() {
        assert!(matches!(
            FlatIndex::build(Array2::zeros((4, 0)), Metric::L2),
            Err(RecommendError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let query = arr1(&[1.0f32, 0.0, 0.0]);
        assert_eq!(
            index.search(query.view(), 1).unwrap_err(),
            RecommendError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_search_features_validates() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let f64_query = FeatureArray::from(vec![1.0f64, 0.0]);
        assert!(matches!(
            index.search_features(&f64_query, 1),
            Err(RecommendError::DtypeMismatch { .. })
        ));
        let ok = FeatureArray::from(vec![1.0f32, 0.0]);
        assert_eq!(index.search_features(&ok, 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_from_features_copies_corpus() {
        let corpus = FeatureArray::from(arr2(&[[3.0f32, 4.0], [1.0, 0.0]]));
        let index = FlatIndex::from_features(&corpus, Metric::Cosine).unwrap();
        assert_relative_eq!(index.vectors()[[0, 0]], 0.6, epsilon = 1e-6);
        assert_eq!(corpus, FeatureArray::from(arr2(&[[3.0f32, 4.0], [1.0, 0.0]])));
    }

    #[test]
    fn test_batch_matches_single_queries() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let queries = arr2(&[[1.0f32, 0.0], [0.0, 1.0], [0.4, 0.6]]);
        let batch = index.search_batch(queries.view(), 2).unwrap();
        assert_eq!(batch.len(), 3);
        for (i, row) in queries.outer_iter().enumerate() {
            assert_eq!(batch[i], index.search(row, 2).unwrap());
        }
    }

    #[test]
    fn test_batch_dimension_mismatch() {
        let index = FlatIndex::build(small_corpus(), Metric::L2).unwrap();
        let queries = Array2::<f32>::zeros((2, 5));
        assert!(matches!(
            index.search_batch(queries.view(), 1),
            Err(RecommendError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let corpus = Array2::from_shape_fn((200, 8), |(i, j)| ((i * 7 + j * 3) % 11) as f32 / 11.0);
        let query = arr1(&[0.3f32, 0.1, 0.9, 0.4, 0.2, 0.8, 0.5, 0.6]);

        for metric in Metric::ALL {
            let sequential = FlatIndex::build_with_config(
                corpus.clone(),
                &IndexConfig::new(metric).with_parallel_threshold(usize::MAX),
            )
            .unwrap();
            let parallel = FlatIndex::build_with_config(
                corpus.clone(),
                &IndexConfig::new(metric).with_parallel_threshold(0),
            )
            .unwrap();
            assert_eq!(
                sequential.search(query.view(), 20).unwrap(),
                parallel.search(query.view(), 20).unwrap()
            );
        }
    }

    #[test]
    fn test_repeated_search_is_deterministic() {
        let index = FlatIndex::build(small_corpus(), Metric::Cosine).unwrap();
        let query = arr1(&[0.2f32, 0.7]);
        let first = index.search(query.view(), 3).unwrap();
        for _ in 0..5 {
            assert_eq!(index.search(query.view(), 3).unwrap(), first);
        }
    }
}
