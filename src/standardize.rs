//! # Response Standardization
//!
//! Computes the training response mean and standard deviation and, when enabled,
//! rescales both splits with `y' = (y - mean) / sd`.
//!
//! The validation response is always transformed with the statistics fitted on the
//! training response, never with its own. This is the transform a deployed model
//! would apply at scoring time, and every validation metric downstream depends on it.
//!
//! Variance is the two-pass population form: the mean first, then the mean of squared
//! deviations from it.

use crate::pipeline::PipelineError;
use crate::types::PipelineFloat;
use ndarray::{ArrayView1, ArrayViewMut1};

/// Mean and standard deviation of a response vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseStats<T> {
    pub mean: T,
    pub sd: T,
}

impl<T: PipelineFloat> ResponseStats<T> {
    /// Two-pass statistics of `values`. Returns `None` for an empty slice.
    ///
    /// Deviations are divided by the largest absolute deviation before squaring, so the
    /// variance of a finite response never overflows (`1e20` in `f32` squares to `inf`).
    pub fn of(values: &[T]) -> Option<Self> {
        let view = ArrayView1::from(values);
        let mean = view.mean()?;
        let scale = view.fold(T::zero(), |acc, &v| acc.max((v - mean).abs()));
        if scale == T::zero() || !scale.is_finite() {
            let variance = view.mapv(|v| (v - mean) * (v - mean)).mean()?;
            return Some(Self {
                mean,
                sd: variance.sqrt(),
            });
        }
        let scaled_variance = view
            .mapv(|v| {
                let d = (v - mean) / scale;
                d * d
            })
            .mean()?;
        Some(Self {
            mean,
            sd: scale * scaled_variance.sqrt(),
        })
    }

    /// `(value - mean) / sd`
    pub fn apply(&self, value: T) -> T {
        (value - self.mean) / self.sd
    }

    /// `value * sd + mean`, mapping a standardized value back to response units.
    pub fn inverse(&self, value: T) -> T {
        value * self.sd + self.mean
    }

    /// The identity transform: mean 0, sd 1.
    pub fn identity() -> Self {
        Self {
            mean: T::zero(),
            sd: T::one(),
        }
    }
}

/// Statistics reported by [`standardize`].
///
/// `train_raw` is the only pair that ever transforms data. The others are diagnostics.
/// Validation entries are `None` when the validation split is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardizeOutcome<T> {
    pub train_raw: ResponseStats<T>,
    pub train_final: ResponseStats<T>,
    pub valid_raw: Option<ResponseStats<T>>,
    pub valid_final: Option<ResponseStats<T>>,
}

impl<T: PipelineFloat> StandardizeOutcome<T> {
    /// The fitted transform, or the identity when standardization was off.
    pub fn fitted_transform(&self, enabled: bool) -> ResponseStats<T> {
        if enabled {
            self.train_raw
        } else {
            ResponseStats::identity()
        }
    }
}

/// Computes training statistics and, if `enabled`, standardizes both splits in place.
///
/// An empty `valid` slice is a no-op for every validation statistic. A constant (or
/// non-finite) training response with `enabled` set fails with
/// [`PipelineError::DegenerateInput`] before any division happens.
pub fn standardize<T: PipelineFloat>(
    train: &mut [T],
    valid: &mut [T],
    enabled: bool,
) -> Result<StandardizeOutcome<T>, PipelineError> {
    let train_raw = ResponseStats::of(train).ok_or_else(|| {
        PipelineError::DegenerateInput("training response is empty".to_string())
    })?;
    log::info!("Mean trainY: {}", train_raw.mean);
    log::info!("StdDev trainY: {}", train_raw.sd);

    if enabled {
        if !train_raw.mean.is_finite() || !train_raw.sd.is_finite() {
            return Err(PipelineError::DegenerateInput(format!(
                "training response has non-finite statistics (mean {}, sd {})",
                train_raw.mean, train_raw.sd
            )));
        }
        // A constant response can carry a tiny nonzero sd from rounding in the mean.
        if train_raw.sd == T::zero() || is_constant(train) {
            return Err(PipelineError::DegenerateInput(format!(
                "training response is constant ({}); its standard deviation is zero",
                train_raw.mean
            )));
        }
    }

    let valid_raw = ResponseStats::of(valid);
    if let Some(stats) = &valid_raw {
        log::info!("Rows in validation data: {}", valid.len());
        log::info!("Mean validY: {}", stats.mean);
        log::info!("StdDev validY: {}", stats.sd);
    }

    if !enabled {
        return Ok(StandardizeOutcome {
            train_raw,
            train_final: train_raw,
            valid_raw,
            valid_final: valid_raw,
        });
    }

    ArrayViewMut1::from(&mut *train).mapv_inplace(|v| train_raw.apply(v));
    ArrayViewMut1::from(&mut *valid).mapv_inplace(|v| train_raw.apply(v));

    let train_final = ResponseStats::of(train).unwrap_or(train_raw);
    let valid_final = ResponseStats::of(valid);
    log::debug!(
        "Standardized trainY: mean {}, sd {}",
        train_final.mean,
        train_final.sd
    );
    if let Some(stats) = &valid_final {
        log::debug!("Standardized validY: mean {}, sd {}", stats.mean, stats.sd);
    }

    Ok(StandardizeOutcome {
        train_raw,
        train_final,
        valid_raw,
        valid_final,
    })
}

fn is_constant<T: PipelineFloat>(values: &[T]) -> bool {
    match values.split_first() {
        Some((first, rest)) => rest.iter().all(|v| v == first),
        None => true,
    }
}
