#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Host-side preparation of a dense regression problem for an elastic-net path solve:
//! deterministic train/validation splitting, response standardization with
//! training-fitted statistics, and the `lambda_max` anchor of the regularization path.

pub mod config;
pub mod data;
pub mod device;
pub mod lambda;
pub mod pipeline;
pub mod split;
pub mod standardize;
pub mod types;

pub use config::{DiagnosticsConfig, PipelineConfig};
pub use pipeline::{PipelineError, prepare, run, run_reported};
pub use types::{Dataset, PipelineFloat, Precision};
