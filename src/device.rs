// ========================================================================================
//
//                       Device collaborators: upload and path solve
//
// ========================================================================================
//
// The preparation stages end by handing host arrays to two external capabilities:
//
//   upload(host arrays) -> four opaque device handles
//   solve(handles, path parameters, response statistics) -> scalar result
//
// Both are traits so an accelerator backend can be plugged in. The handles are an
// associated type that the pipeline moves from one call to the next without ever
// looking inside. Both calls are blocking; whatever parallelism a backend uses stays
// behind the trait.
//
// The host implementations at the bottom of this file let the binary run end to end on a
// machine with no accelerator.

use crate::lambda::LambdaAnchor;
use crate::standardize::ResponseStats;
use crate::types::{Layout, PipelineFloat, Precision};
use std::ops::Deref;

/// Opaque failure raised by a collaborator. The pipeline forwards it untouched.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

// ========================================================================================
//                                  Collaborator contracts
// ========================================================================================

/// Everything the upload collaborator receives. All matrices are row-major.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a, T> {
    pub source_device: usize,
    pub m_train: usize,
    pub n: usize,
    pub m_valid: usize,
    pub train_features: &'a [T],
    pub train_response: &'a [T],
    pub valid_features: &'a [T],
    pub valid_response: &'a [T],
}

/// The four device-resident handles produced by an upload.
#[derive(Debug)]
pub struct DeviceHandles<H> {
    pub train_features: H,
    pub train_response: H,
    pub valid_features: H,
    pub valid_response: H,
}

/// Copies host arrays to a device.
pub trait DeviceUploader<T: PipelineFloat> {
    type Handle;

    fn upload(
        &mut self,
        request: UploadRequest<'_, T>,
    ) -> Result<DeviceHandles<Self::Handle>, CollaboratorError>;

    /// Optional device warm-up before the first transfer.
    fn warm_up(&mut self, device_count: usize) -> Result<(), CollaboratorError> {
        let _ = device_count;
        Ok(())
    }

    /// Optional peer-to-peer bandwidth diagnostic.
    fn peer_to_peer_check(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// Optional host-to-device bandwidth diagnostic.
    fn bandwidth_check(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Scalar arguments of a path solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveRequest<T> {
    pub source_device: usize,
    pub precision: Precision,
    pub device_count: usize,
    pub layout: Layout,
    pub m_train: usize,
    pub n: usize,
    pub m_valid: usize,
    pub intercept: bool,
    pub standardize: bool,
    pub anchor: LambdaAnchor<T>,
    pub n_lambdas: usize,
    pub n_alphas: usize,
    /// Pre-standardization training response statistics.
    pub train_stats: ResponseStats<T>,
    /// Pre-standardization validation response statistics. Equal to `train_stats`
    /// when the validation split is empty.
    pub valid_stats: ResponseStats<T>,
}

impl<T> SolveRequest<T> {
    pub fn datatype_tag(&self) -> i32 {
        self.precision.datatype_tag()
    }

    pub fn order_tag(&self) -> char {
        self.layout.order_tag()
    }
}

/// Runs the elastic-net path over previously uploaded data.
pub trait ElasticNetSolver<T: PipelineFloat, H> {
    fn solve(
        &mut self,
        request: &SolveRequest<T>,
        handles: DeviceHandles<H>,
    ) -> Result<f64, CollaboratorError>;
}

// ========================================================================================
//                                  Host collaborators
// ========================================================================================

/// A host-memory stand-in for a device allocation.
#[derive(Debug, Clone, PartialEq)]
#[repr(transparent)]
pub struct HostBuffer<T>(pub Vec<T>);

impl<T> Deref for HostBuffer<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Uploader that keeps the data in host memory. It exposes a single device, index 0.
#[derive(Debug, Default)]
pub struct HostUploader {
    uploads: usize,
}

impl HostUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed uploads.
    pub fn uploads(&self) -> usize {
        self.uploads
    }
}

impl<T: PipelineFloat> DeviceUploader<T> for HostUploader {
    type Handle = HostBuffer<T>;

    fn upload(
        &mut self,
        request: UploadRequest<'_, T>,
    ) -> Result<DeviceHandles<Self::Handle>, CollaboratorError> {
        if request.source_device != 0 {
            return Err(format!(
                "host uploader only provides device 0, requested device {}",
                request.source_device
            )
            .into());
        }
        if request.train_features.len() != request.m_train * request.n
            || request.train_response.len() != request.m_train
            || request.valid_features.len() != request.m_valid * request.n
            || request.valid_response.len() != request.m_valid
        {
            return Err("upload buffers do not match the declared shape".into());
        }

        self.uploads += 1;
        log::debug!(
            "Copied {} training and {} validation rows to host buffers",
            request.m_train,
            request.m_valid
        );
        Ok(DeviceHandles {
            train_features: HostBuffer(request.train_features.to_vec()),
            train_response: HostBuffer(request.train_response.to_vec()),
            valid_features: HostBuffer(request.valid_features.to_vec()),
            valid_response: HostBuffer(request.valid_response.to_vec()),
        })
    }

    fn warm_up(&mut self, device_count: usize) -> Result<(), CollaboratorError> {
        log::debug!("Host uploader has no accelerator to warm up ({device_count} requested)");
        Ok(())
    }
}

/// Evaluates the model at the entry point of the regularization path.
///
/// At `lambda >= lambda_max` every non-intercept coefficient is zero, so the fitted model
/// predicts the training response mean. Without an intercept it predicts zero in the units
/// it was fit in: zero itself on a raw response, and the training mean once mapped back
/// from a standardized one. The result is the root-mean-square error of that prediction
/// in original response units, measured on the validation split, or on the training split
/// when there is no validation data.
///
/// This does not minimize the elastic-net objective; it reports the baseline every path
/// starts from.
#[derive(Debug, Default)]
pub struct PathEntrySolver;

impl<T: PipelineFloat> ElasticNetSolver<T, HostBuffer<T>> for PathEntrySolver {
    fn solve(
        &mut self,
        request: &SolveRequest<T>,
        handles: DeviceHandles<HostBuffer<T>>,
    ) -> Result<f64, CollaboratorError> {
        if request.precision != T::PRECISION {
            return Err(format!(
                "datatype tag {} does not match the uploaded {} data",
                request.datatype_tag(),
                T::PRECISION
            )
            .into());
        }
        if request.n_lambdas == 0 || request.n_alphas == 0 {
            return Err("the path needs at least one lambda and one alpha".into());
        }
        if handles.train_response.len() != request.m_train
            || handles.train_features.len() != request.m_train * request.n
        {
            return Err("training handles do not match the declared shape".into());
        }

        let path = request.anchor.path(request.n_lambdas);
        log::debug!(
            "Path of {} lambdas from {} to {} over {} alphas, order '{}'",
            path.len(),
            request.anchor.lambda_max,
            request.anchor.lambda_min(),
            request.n_alphas,
            request.order_tag()
        );

        let prediction = if request.intercept {
            ResponseStats::of(&handles.train_response)
                .map(|stats| stats.mean)
                .unwrap_or_else(T::zero)
        } else {
            T::zero()
        };
        let transform = if request.standardize {
            request.train_stats
        } else {
            ResponseStats::identity()
        };

        let targets: &[T] = if request.m_valid > 0 {
            &handles.valid_response
        } else {
            &handles.train_response
        };
        if targets.is_empty() {
            return Err("no rows to evaluate".into());
        }

        let predicted = transform.inverse(prediction).to_f64_lossless();
        let squared_error: f64 = targets
            .iter()
            .map(|&y| {
                let residual = transform.inverse(y).to_f64_lossless() - predicted;
                residual * residual
            })
            .sum();
        Ok((squared_error / targets.len() as f64).sqrt())
    }
}
