//! Dtype-tagged feature arrays handed over by the ingestion layer

use std::fmt;

use ndarray::{Array, ArrayD, ArrayView1, ArrayView2, Dimension, Ix1, Ix2};

use crate::error::{RecommendError, Result};

/// Scalar precision of a feature array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F32,
    F64,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::F32 => f.write_str("float32"),
            Dtype::F64 => f.write_str("float64"),
        }
    }
}

/// A dynamically shaped array whose rank and scalar type are only known at
/// runtime.
///
/// Searches run on `f32` data only; the `F64` variant exists so that a
/// wrong-precision input is reported as [`RecommendError::DtypeMismatch`]
/// instead of being silently converted.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl FeatureArray {
    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureArray::F32(_) => Dtype::F32,
            FeatureArray::F64(_) => Dtype::F64,
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            FeatureArray::F32(a) => a.shape(),
            FeatureArray::F64(a) => a.shape(),
        }
    }

    /// Borrow this array as a query of length `dimension`.
    ///
    /// Rank is checked first, then length, then dtype.
    pub fn as_query(&self, dimension: usize) -> Result<ArrayView1<'_, f32>> {
        if self.ndim() != 1 {
            return Err(RecommendError::rank("query vector", 1, self.ndim()));
        }
        let len = self.shape()[0];
        if len != dimension {
            return Err(RecommendError::DimensionMismatch {
                expected: dimension,
                actual: len,
            });
        }
        let data = self.f32_data()?;
        data.view()
            .into_dimensionality::<Ix1>()
            .map_err(|e| RecommendError::InvalidShape {
                reason: e.to_string(),
            })
    }

    /// Borrow this array as an N x D corpus matrix with D >= 1.
    pub fn as_matrix(&self) -> Result<ArrayView2<'_, f32>> {
        if self.ndim() != 2 {
            return Err(RecommendError::rank("corpus", 2, self.ndim()));
        }
        let data = self.f32_data()?;
        let matrix = data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| RecommendError::InvalidShape {
                reason: e.to_string(),
            })?;
        if matrix.ncols() == 0 {
            return Err(RecommendError::InvalidShape {
                reason: "corpus must have at least one column".to_string(),
            });
        }
        Ok(matrix)
    }

    fn f32_data(&self) -> Result<&ArrayD<f32>> {
        match self {
            FeatureArray::F32(a) => Ok(a),
            FeatureArray::F64(_) => Err(RecommendError::DtypeMismatch {
                expected: Dtype::F32,
                actual: Dtype::F64,
            }),
        }
    }
}

impl<D: Dimension> From<Array<f32, D>> for FeatureArray {
    fn from(a: Array<f32, D>) -> Self {
        FeatureArray::F32(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<f64, D>> for FeatureArray {
    fn from(a: Array<f64, D>) -> Self {
        FeatureArray::F64(a.into_dyn())
    }
}

impl From<Vec<f32>> for FeatureArray {
    fn from(v: Vec<f32>) -> Self {
        FeatureArray::F32(Array::from_vec(v).into_dyn())
    }
}

impl From<Vec<f64>> for FeatureArray {
    fn from(v: Vec<f64>) -> Self {
        FeatureArray::F64(Array::from_vec(v).into_dyn())
    }
}
