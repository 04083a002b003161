//! # Regularization Path Anchor
//!
//! `lambda_max` is the smallest penalty at which the elastic-net soft threshold zeroes
//! every non-intercept coefficient:
//!
//! ```text
//! u_j        = sum_i w_i * x[i, j] * (y_i - intercept * mean_final)
//! lambda_max = max_j |u_j|        for j in [intercept, n)
//! ```
//!
//! The solver sweeps a geometric path from `lambda_max` down to
//! `lambda_max * lambda_min_ratio`.

use crate::types::{Dataset, PipelineFloat};
use ndarray::Array1;

/// Lower end of the path as a fraction of `lambda_max`.
///
/// Fixed, and independent of the data shape.
pub const LAMBDA_MIN_RATIO: f64 = 1e-9;

/// Computes `lambda_max` over the (possibly standardized) training split.
///
/// With `intercept` set, column 0 is skipped and the residual is taken against
/// `mean_train_final`, the training response mean after standardization. The running
/// maximum starts at zero, so data uncorrelated with every column yields exactly zero.
pub fn lambda_max<T: PipelineFloat>(train: &Dataset<T>, intercept: bool, mean_train_final: T) -> T {
    let view = train.features();
    let shift = if intercept { mean_train_final } else { T::zero() };
    // Uniform observation weights.
    let weight = T::one();

    let mut lambda_max = T::zero();
    for col in usize::from(intercept)..view.ncols() {
        let Some(column) = view.column(col) else {
            continue;
        };
        let u = column
            .zip(train.response())
            .fold(T::zero(), |acc, (x, &y)| acc + weight * x * (y - shift));
        lambda_max = lambda_max.max(u.abs());
    }

    log::info!("lambda_max0 {lambda_max}");
    lambda_max
}

/// The two scalars that pin down the regularization path handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaAnchor<T> {
    pub lambda_max: T,
    pub lambda_min_ratio: T,
}

impl<T: PipelineFloat> LambdaAnchor<T> {
    pub fn lambda_min(&self) -> T {
        self.lambda_max * self.lambda_min_ratio
    }

    /// The `n_lambdas`-point path this anchor defines.
    pub fn path(&self, n_lambdas: usize) -> Array1<T> {
        lambda_path(self.lambda_max, self.lambda_min_ratio, n_lambdas)
    }
}

/// Geometric grid from `lambda_max` down to `lambda_max * lambda_min_ratio`, both ends
/// included.
pub fn lambda_path<T: PipelineFloat>(
    lambda_max: T,
    lambda_min_ratio: T,
    n_lambdas: usize,
) -> Array1<T> {
    match n_lambdas {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, lambda_max),
        _ => {
            let last = T::from_count(n_lambdas - 1);
            Array1::from_shape_fn(n_lambdas, |k| {
                lambda_max * lambda_min_ratio.powf(T::from_count(k) / last)
            })
        }
    }
}
