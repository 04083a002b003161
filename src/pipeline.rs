// ========================================================================================
//
//                          The preparation pipeline orchestrator
//
// ========================================================================================
//
// Runs the host-side stages in strict order, each consuming the previous one's output:
//
//   1. split        -> training and validation datasets
//   2. standardize  -> training-fitted response transform, applied to both splits
//   3. lambda_max   -> the path anchor, computed on the final training data
//   4. upload/solve -> handed to the device collaborators
//
// Arguments are checked once at entry, before any work is done. There are no retries;
// collaborator failures are passed through as `DownstreamFailure`.

use crate::config::PipelineConfig;
use crate::device::{
    CollaboratorError, DeviceHandles, DeviceUploader, ElasticNetSolver, SolveRequest,
    UploadRequest,
};
use crate::lambda::{LambdaAnchor, lambda_max};
use crate::split::{TrainValidSplit, split};
use crate::standardize::{StandardizeOutcome, standardize};
use crate::types::{Dataset, Layout, PipelineFloat};
use thiserror::Error;

/// Every failure the pipeline can surface.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A bad argument at pipeline entry. Nothing downstream can be trusted after one.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The data cannot be standardized, e.g. a constant training response.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// The upload or solve collaborator failed.
    #[error("Device collaborator failed: {0}")]
    DownstreamFailure(#[source] CollaboratorError),
}

/// The host arrays and scalars produced by stages 1 to 3.
#[derive(Debug, Clone)]
pub struct PreparedProblem<T> {
    pub split: TrainValidSplit<T>,
    pub stats: StandardizeOutcome<T>,
    pub anchor: LambdaAnchor<T>,
}

impl<T: PipelineFloat> PreparedProblem<T> {
    /// Builds the scalar arguments of the solve call.
    pub fn solve_request(&self, config: &PipelineConfig) -> SolveRequest<T> {
        let train = &self.split.train;
        SolveRequest {
            source_device: config.source_device,
            precision: T::PRECISION,
            device_count: config.device_count,
            layout: Layout::RowMajor,
            m_train: train.nrows(),
            n: train.ncols(),
            m_valid: self.split.valid.nrows(),
            intercept: config.intercept,
            standardize: config.standardize,
            anchor: self.anchor,
            n_lambdas: config.n_lambdas,
            n_alphas: config.n_alphas,
            train_stats: self.stats.train_raw,
            valid_stats: self.stats.valid_raw.unwrap_or(self.stats.train_raw),
        }
    }

    pub fn upload_request(&self, source_device: usize) -> UploadRequest<'_, T> {
        let TrainValidSplit { train, valid } = &self.split;
        UploadRequest {
            source_device,
            m_train: train.nrows(),
            n: train.ncols(),
            m_valid: valid.nrows(),
            train_features: train.features_row_major(),
            train_response: train.response(),
            valid_features: valid.features_row_major(),
            valid_response: valid.response(),
        }
    }
}

/// Summary of a full run.
#[derive(Debug, Clone)]
pub struct PipelineReport<T> {
    pub m_train: usize,
    pub m_valid: usize,
    pub n: usize,
    pub stats: StandardizeOutcome<T>,
    pub anchor: LambdaAnchor<T>,
    /// The solver's result, unchanged.
    pub result: f64,
}

/// Stages 1 to 3: split, standardize and anchor the path. Pure host arithmetic.
pub fn prepare<T: PipelineFloat>(
    data: &Dataset<T>,
    config: &PipelineConfig,
) -> Result<PreparedProblem<T>, PipelineError> {
    config.validate()?;

    let mut parts = split(data, config.valid_fraction, config.intercept, config.split)?;
    let TrainValidSplit { train, valid } = &mut parts;
    let stats = standardize(train.response_mut(), valid.response_mut(), config.standardize)?;

    let computed = lambda_max(&parts.train, config.intercept, stats.train_final.mean);
    let anchor = LambdaAnchor {
        lambda_max: match config.lambda_max {
            Some(fixed) => {
                log::info!("Using configured lambda_max {fixed} in place of {computed}");
                T::from_f64_lossy(fixed)
            }
            None => computed,
        },
        lambda_min_ratio: T::from_f64_lossy(config.lambda_min_ratio),
    };
    log::info!("lambda_min_ratio {}", anchor.lambda_min_ratio);

    Ok(PreparedProblem {
        split: parts,
        stats,
        anchor,
    })
}

/// Runs every stage and returns the solver's scalar result unchanged.
pub fn run<T, U, S>(
    data: &Dataset<T>,
    config: &PipelineConfig,
    uploader: &mut U,
    solver: &mut S,
) -> Result<f64, PipelineError>
where
    T: PipelineFloat,
    U: DeviceUploader<T>,
    S: ElasticNetSolver<T, U::Handle>,
{
    run_reported(data, config, uploader, solver).map(|report| report.result)
}

/// Like [`run`], but also returns the intermediate statistics.
pub fn run_reported<T, U, S>(
    data: &Dataset<T>,
    config: &PipelineConfig,
    uploader: &mut U,
    solver: &mut S,
) -> Result<PipelineReport<T>, PipelineError>
where
    T: PipelineFloat,
    U: DeviceUploader<T>,
    S: ElasticNetSolver<T, U::Handle>,
{
    let prepared = prepare(data, config)?;

    let diagnostics = &config.diagnostics;
    if diagnostics.warm_up {
        uploader
            .warm_up(config.device_count)
            .map_err(PipelineError::DownstreamFailure)?;
    }
    if diagnostics.peer_to_peer_check {
        uploader
            .peer_to_peer_check()
            .map_err(PipelineError::DownstreamFailure)?;
    }
    if diagnostics.bandwidth_check {
        uploader
            .bandwidth_check()
            .map_err(PipelineError::DownstreamFailure)?;
    }

    let handles: DeviceHandles<U::Handle> = uploader
        .upload(prepared.upload_request(config.source_device))
        .map_err(PipelineError::DownstreamFailure)?;

    let request = prepared.solve_request(config);
    log::debug!(
        "Solving with datatype {} on {} device(s), order '{}'",
        request.datatype_tag(),
        request.device_count,
        request.order_tag()
    );
    let result = solver
        .solve(&request, handles)
        .map_err(PipelineError::DownstreamFailure)?;

    Ok(PipelineReport {
        m_train: request.m_train,
        m_valid: request.m_valid,
        n: request.n,
        stats: prepared.stats,
        anchor: prepared.anchor,
        result,
    })
}
