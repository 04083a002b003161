//! # Train/Validation Partitioning
//!
//! Deterministic row partitioning of a [`Dataset`] into a training and a validation
//! subset. The default policy holds out the trailing rows without any reordering, so
//! two runs over the same input always produce the same split. A seeded shuffle is
//! available as an explicit opt-in.

use crate::pipeline::PipelineError;
use crate::types::{Dataset, PipelineFloat};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Which rows are held out for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// The last `round(valid_fraction * m)` rows, in input order.
    #[default]
    Tail,
    /// The last `round(valid_fraction * m)` rows of a permutation drawn from `seed`.
    Shuffled { seed: u64 },
}

/// The two owned halves of a split. Neither aliases the input's storage.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainValidSplit<T> {
    pub train: Dataset<T>,
    pub valid: Dataset<T>,
}

/// Checks `0 <= valid_fraction < 1`.
pub fn check_valid_fraction(valid_fraction: f64) -> Result<(), PipelineError> {
    if !valid_fraction.is_finite() || !(0.0..1.0).contains(&valid_fraction) {
        return Err(PipelineError::InvalidArgument(format!(
            "valid_fraction must be in [0, 1), got {valid_fraction}"
        )));
    }
    Ok(())
}

/// Number of validation rows for `m` total rows. Training always keeps at least one row.
pub fn validation_row_count(total_rows: usize, valid_fraction: f64) -> usize {
    if total_rows == 0 {
        return 0;
    }
    let requested = (valid_fraction * total_rows as f64).round() as usize;
    requested.min(total_rows - 1)
}

/// Partitions `data` into training and validation rows.
///
/// Fails with [`PipelineError::InvalidArgument`] when `valid_fraction` is outside
/// `[0, 1)`, when the dataset has no rows, or when `intercept` is set on a matrix
/// with no column 0.
pub fn split<T: PipelineFloat>(
    data: &Dataset<T>,
    valid_fraction: f64,
    intercept: bool,
    policy: SplitPolicy,
) -> Result<TrainValidSplit<T>, PipelineError> {
    check_valid_fraction(valid_fraction)?;

    let total_rows = data.nrows();
    let ncols = data.ncols();
    if intercept && ncols == 0 {
        return Err(PipelineError::InvalidArgument(
            "intercept requested but the feature matrix has no column 0".to_string(),
        ));
    }
    if total_rows == 0 {
        return Err(PipelineError::InvalidArgument(
            "cannot split a dataset with zero rows".to_string(),
        ));
    }
    if intercept && !column_is_constant(data, 0) {
        log::warn!("Intercept requested, but column 0 is not constant across rows.");
    }

    let valid_rows = validation_row_count(total_rows, valid_fraction);
    let train_rows = total_rows - valid_rows;

    let mut order: Vec<usize> = (0..total_rows).collect();
    if let SplitPolicy::Shuffled { seed } = policy {
        order.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    let (train_order, valid_order) = order.split_at(train_rows);

    let train = gather_rows(data, train_order)?;
    let valid = if valid_order.is_empty() {
        Dataset::empty(ncols)
    } else {
        gather_rows(data, valid_order)?
    };

    log::info!("Rows in training data: {}", train.nrows());
    log::info!("Rows in validation data: {}", valid.nrows());
    log::info!("Cols in training data: {}", train.ncols());

    Ok(TrainValidSplit { train, valid })
}

fn column_is_constant<T: PipelineFloat>(data: &Dataset<T>, col: usize) -> bool {
    let Some(mut values) = data.features().column(col) else {
        return false;
    };
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

fn gather_rows<T: PipelineFloat>(
    data: &Dataset<T>,
    rows: &[usize],
) -> Result<Dataset<T>, PipelineError> {
    let view = data.features();
    let mut features = Vec::with_capacity(rows.len() * data.ncols());
    let mut response = Vec::with_capacity(rows.len());
    for &row in rows {
        let values = view.row(row).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("row {row} is outside the dataset"))
        })?;
        features.extend_from_slice(values);
        response.push(data.response()[row]);
    }
    Dataset::from_row_major(features, response, data.ncols())
        .map_err(|e| PipelineError::InvalidArgument(e.to_string()))
}
