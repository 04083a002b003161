// ========================================================================================
//
//                       Core data types shared across the pipeline
//
// ========================================================================================
//
// This module holds the types that cross module boundaries: the floating-point width the
// whole pipeline runs in, the wire tags handed to the solver, and the row-major dataset
// with its borrowed matrix view. Types used by a single stage live with that stage.

use ndarray::{Array2, NdFloat};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::{Copied, Skip, StepBy};
use std::slice::Iter;

// ========================================================================================
//                                  Precision and layout tags
// ========================================================================================

/// The floating-point width chosen once for an entire pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    /// The datatype tag the solver expects for this width.
    pub fn datatype_tag(self) -> i32 {
        match self {
            Precision::Single => 0,
            Precision::Double => 1,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Single => write!(f, "single (f32)"),
            Precision::Double => write!(f, "double (f64)"),
        }
    }
}

/// Storage order of the feature matrix as seen by the device collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    RowMajor,
}

impl Layout {
    pub fn order_tag(self) -> char {
        match self {
            Layout::RowMajor => 'r',
        }
    }
}

/// Scalar type of every stage in the pipeline.
///
/// Implemented for `f32` and `f64` only. Mixing widths between stages is not
/// expressible: every generic function in the crate is parameterized by exactly one `T`.
///
/// The conversions below go through `num_traits`. Between `f32`, `f64` and `usize` they
/// always succeed (out-of-range doubles saturate to infinity), so the fallbacks are never
/// taken for the two implementing types.
pub trait PipelineFloat: NdFloat + FromPrimitive + Default {
    const PRECISION: Precision;

    /// Converts a row count into this width.
    fn from_count(count: usize) -> Self {
        Self::from_usize(count).unwrap_or_else(Self::infinity)
    }

    /// Narrows (or passes through) a double-precision value.
    fn from_f64_lossy(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }

    fn to_f64_lossless(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl PipelineFloat for f32 {
    const PRECISION: Precision = Precision::Single;
}

impl PipelineFloat for f64 {
    const PRECISION: Precision = Precision::Double;
}

// ========================================================================================
//                                    Row-major dataset
// ========================================================================================

/// Reasons a buffer pair cannot form a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// `features.len()` is not `rows * ncols`.
    FeatureLength { found: usize, rows: usize, ncols: usize },
    /// Rows exist but the matrix has no columns.
    NoColumns { rows: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::FeatureLength { found, rows, ncols } => write!(
                f,
                "feature buffer has {found} values, but {rows} rows x {ncols} columns requires {}",
                rows * ncols
            ),
            ShapeError::NoColumns { rows } => {
                write!(f, "dataset has {rows} rows but zero feature columns")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// A dense `m x n` feature matrix stored row-major, paired with an `m`-long response.
///
/// Every instance upholds `features.len() == nrows() * ncols()` and
/// `response.len() == nrows()`. No two datasets share storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    features: Vec<T>,
    response: Vec<T>,
    ncols: usize,
}

impl<T: PipelineFloat> Dataset<T> {
    pub fn from_row_major(
        features: Vec<T>,
        response: Vec<T>,
        ncols: usize,
    ) -> Result<Self, ShapeError> {
        let rows = response.len();
        if ncols == 0 && rows > 0 {
            return Err(ShapeError::NoColumns { rows });
        }
        if features.len() != rows * ncols {
            return Err(ShapeError::FeatureLength {
                found: features.len(),
                rows,
                ncols,
            });
        }
        Ok(Self {
            features,
            response,
            ncols,
        })
    }

    /// An empty dataset that still remembers its column count.
    pub fn empty(ncols: usize) -> Self {
        Self {
            features: Vec::new(),
            response: Vec::new(),
            ncols,
        }
    }

    pub fn nrows(&self) -> usize {
        self.response.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }

    pub fn features(&self) -> MatrixView<'_, T> {
        MatrixView {
            data: &self.features,
            nrows: self.nrows(),
            ncols: self.ncols,
        }
    }

    /// The contiguous row-major buffer, in the layout the upload collaborator expects.
    pub fn features_row_major(&self) -> &[T] {
        &self.features
    }

    pub fn response(&self) -> &[T] {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut [T] {
        &mut self.response
    }

    /// Returns a copy with a constant column of ones inserted at column 0.
    pub fn with_intercept_column(&self) -> Self {
        let ncols = self.ncols + 1;
        let mut features = Vec::with_capacity(self.nrows() * ncols);
        for row in self.features.chunks_exact(self.ncols.max(1)).take(self.nrows()) {
            features.push(T::one());
            features.extend_from_slice(row);
        }
        Self {
            features,
            response: self.response.clone(),
            ncols,
        }
    }

    /// Splits into the owned buffers `(features, response, ncols)`.
    pub fn into_parts(self) -> (Vec<T>, Vec<T>, usize) {
        (self.features, self.response, self.ncols)
    }
}

// ========================================================================================
//                                   Borrowed matrix view
// ========================================================================================

/// A borrowed row-major view with bounds-checked accessors.
///
/// All column scans go through this type instead of hand-written `i * n + j` arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    nrows: usize,
    ncols: usize,
}

/// Iterator over the entries of one column, top to bottom.
pub type ColumnIter<'a, T> = Copied<StepBy<Skip<Iter<'a, T>>>>;

impl<'a, T: PipelineFloat> MatrixView<'a, T> {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        Some(self.data[row * self.ncols + col])
    }

    pub fn row(&self, row: usize) -> Option<&'a [T]> {
        if row >= self.nrows {
            return None;
        }
        let start = row * self.ncols;
        Some(&self.data[start..start + self.ncols])
    }

    /// Iterates column `col`. Returns `None` when the column does not exist.
    pub fn column(&self, col: usize) -> Option<ColumnIter<'a, T>> {
        if col >= self.ncols {
            return None;
        }
        Some(self.data.iter().skip(col).step_by(self.ncols).copied())
    }

    /// Materializes the view as an owned `ndarray` matrix.
    pub fn to_array(&self) -> Array2<T> {
        Array2::from_shape_fn((self.nrows, self.ncols), |(i, j)| {
            self.data[i * self.ncols + j]
        })
    }
}
