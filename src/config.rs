//! # Run Configuration
//!
//! All knobs of a pipeline run, loadable from and savable to a TOML file. Command-line
//! flags are layered on top by the binary. Diagnostic side paths (device warm-up,
//! bandwidth checks) are explicit flags here rather than build-time switches.

use crate::lambda::LAMBDA_MIN_RATIO;
use crate::pipeline::PipelineError;
use crate::split::{SplitPolicy, check_valid_fraction};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Diagnostic-only device hooks. None of them affects numeric output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub warm_up: bool,
    pub peer_to_peer_check: bool,
    pub bandwidth_check: bool,
}

/// The complete configuration of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of rows held out for validation, in `[0, 1)`.
    pub valid_fraction: f64,
    /// Column 0 of the feature matrix is a constant intercept column.
    pub intercept: bool,
    /// Standardize the response with training statistics.
    pub standardize: bool,
    pub n_lambdas: usize,
    pub n_alphas: usize,
    /// Number of accelerator devices the solver may use.
    pub device_count: usize,
    /// Index of the device that receives the uploaded data.
    pub source_device: usize,
    /// Lower end of the path as a fraction of `lambda_max`, in `[0, 1)`.
    pub lambda_min_ratio: f64,
    /// Fixed path anchor. When unset, `lambda_max` is computed from the training data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_max: Option<f64>,
    pub split: SplitPolicy,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            valid_fraction: 0.0,
            intercept: true,
            standardize: false,
            n_lambdas: 100,
            n_alphas: 1,
            device_count: 1,
            source_device: 0,
            lambda_min_ratio: LAMBDA_MIN_RATIO,
            lambda_max: None,
            split: SplitPolicy::Tail,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Failures reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl PipelineConfig {
    /// Ordinary least squares: a single path point at `lambda = 0`, one alpha, intercept on.
    pub fn linear_regression() -> Self {
        Self::default().with_linear_regression()
    }

    /// Pins the path to the single point `lambda = 0`, keeping every other setting.
    pub fn with_linear_regression(self) -> Self {
        Self {
            intercept: true,
            n_lambdas: 1,
            n_alphas: 1,
            lambda_min_ratio: 0.0,
            lambda_max: Some(0.0),
            ..self
        }
    }

    /// Entry-point argument checks. Run once, before any stage does work.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_valid_fraction(self.valid_fraction)?;
        if !(0.0..1.0).contains(&self.lambda_min_ratio) {
            return Err(PipelineError::InvalidArgument(format!(
                "lambda_min_ratio must be in [0, 1), got {}",
                self.lambda_min_ratio
            )));
        }
        if let Some(lambda_max) = self.lambda_max {
            if !lambda_max.is_finite() || lambda_max < 0.0 {
                return Err(PipelineError::InvalidArgument(format!(
                    "lambda_max must be finite and non-negative, got {lambda_max}"
                )));
            }
        }
        if self.device_count == 0 {
            return Err(PipelineError::InvalidArgument(
                "device_count must be at least 1".to_string(),
            ));
        }
        if self.source_device >= self.device_count {
            return Err(PipelineError::InvalidArgument(format!(
                "source_device {} is outside the {} configured device(s)",
                self.source_device, self.device_count
            )));
        }
        if self.n_lambdas == 0 || self.n_alphas == 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "n_lambdas and n_alphas must be positive, got {} and {}",
                self.n_lambdas, self.n_alphas
            )));
        }
        Ok(())
    }

    /// Saves the configuration in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lambda_min_ratio, 1e-9);
        assert_eq!(config.split, SplitPolicy::Tail);
    }

    #[test]
    fn save_then_load_preserves_every_field() {
        let config = PipelineConfig {
            valid_fraction: 0.2,
            standardize: true,
            n_lambdas: 20,
            n_alphas: 3,
            device_count: 2,
            split: SplitPolicy::Shuffled { seed: 7 },
            diagnostics: DiagnosticsConfig {
                warm_up: true,
                ..DiagnosticsConfig::default()
            },
            ..PipelineConfig::default()
        };
        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();
        let loaded = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_takes_defaults() {
        let parsed: PipelineConfig = toml::from_str(
            "valid_fraction = 0.25\nstandardize = true\n\n[split]\npolicy = \"shuffled\"\nseed = 3\n",
        )
        .unwrap();
        assert_eq!(parsed.valid_fraction, 0.25);
        assert!(parsed.standardize);
        assert!(parsed.intercept);
        assert_eq!(parsed.n_lambdas, 100);
        assert_eq!(parsed.split, SplitPolicy::Shuffled { seed: 3 });
        assert!(!parsed.diagnostics.bandwidth_check);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases = [
            PipelineConfig {
                valid_fraction: -0.5,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                lambda_min_ratio: 1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                lambda_min_ratio: f64::NAN,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                lambda_max: Some(-1.0),
                ..PipelineConfig::default()
            },
            PipelineConfig {
                device_count: 0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                source_device: 1,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                n_lambdas: 0,
                ..PipelineConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn linear_regression_preset_is_a_single_zero_lambda() {
        let config = PipelineConfig::linear_regression();
        config.validate().unwrap();
        assert!(config.intercept);
        assert_eq!((config.n_lambdas, config.n_alphas), (1, 1));
        assert_eq!(config.lambda_min_ratio, 0.0);
        assert_eq!(config.lambda_max, Some(0.0));

        let layered = PipelineConfig {
            valid_fraction: 0.3,
            intercept: false,
            n_lambdas: 50,
            ..PipelineConfig::default()
        }
        .with_linear_regression();
        assert_eq!(layered.valid_fraction, 0.3);
        assert!(layered.intercept);
        assert_eq!(layered.n_lambdas, 1);
    }

    #[test]
    fn zero_lambda_min_ratio_is_accepted() {
        let config = PipelineConfig {
            lambda_min_ratio: 0.0,
            n_lambdas: 1,
            ..PipelineConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn unset_lambda_max_is_omitted_from_toml() {
        let text = toml::to_string_pretty(&PipelineConfig::default()).unwrap();
        assert!(!text.contains("lambda_max"));
        let text = toml::to_string_pretty(&PipelineConfig::linear_regression()).unwrap();
        let loaded: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.lambda_max, Some(0.0));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = PipelineConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
