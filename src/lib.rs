//! # Flat Recommender
//!
//! Exact top-k similarity search over a fixed corpus of feature vectors.
//!
//! This library provides:
//! - A flat (brute-force) index with L2, cosine and inner-product ranking
//! - A recommender that validates queries and clamps oversized requests
//! - Dtype-tagged arrays for inputs whose rank and precision are only known at runtime
//!
//! ## Example
//!
//! ```rust
//! use flat_recommender::{FeatureArray, FlatRecommender, Recommender};
//! use ndarray::arr2;
//!
//! let corpus = FeatureArray::from(arr2(&[[0.0f32, 1.0], [1.0, 0.0], [0.5, 0.5]]));
//! let recommender = FlatRecommender::new(&corpus, "l2").unwrap();
//!
//! let query = FeatureArray::from(vec![1.0f32, 0.0]);
//! assert_eq!(recommender.recommend(&query, 1).unwrap(), vec![1]);
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod flat_index;
pub mod index;
pub mod metric;
pub mod metrics;
pub mod recommender;
pub mod similar;

pub use array::{Dtype, FeatureArray};
pub use config::IndexConfig;
pub use error::{RecommendError, Result};
pub use flat_index::FlatIndex;
pub use index::{Index, Neighbor};
pub use metric::Metric;
pub use metrics::MetricsCollector;
pub use recommender::{FlatRecommender, IndexRecommender, Recommender};
pub use similar::topk_similar;
