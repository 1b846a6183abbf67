//! One-shot top-k lookup without keeping an index around

use crate::array::FeatureArray;
use crate::error::Result;
use crate::flat_index::FlatIndex;
use crate::index::Index;
use crate::metric::Metric;

/// Indices of the `top_k` rows of `data` most similar to `query`.
///
/// Builds a throwaway flat index over a copy of `data`; neither input is
/// modified. `metric` is one of `"l2"`, `"cosine"` or `"inner_product"`.
/// Both arrays are validated before the metric name is looked at.
pub fn topk_similar(
    query: &FeatureArray,
    data: &FeatureArray,
    top_k: usize,
    metric: &str,
) -> Result<Vec<usize>> {
    let matrix = data.as_matrix()?;
    let query = query.as_query(matrix.ncols())?;
    let metric: Metric = metric.parse()?;

    let index = FlatIndex::build(matrix.to_owned(), metric)?;
    index.search(query, top_k)
}
