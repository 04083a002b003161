use approx::{assert_abs_diff_eq, assert_relative_eq};
use enet_prep::device::{HostUploader, PathEntrySolver};
use enet_prep::lambda::lambda_max;
use enet_prep::split::{SplitPolicy, split};
use enet_prep::standardize::standardize;
use enet_prep::{Dataset, PipelineConfig, PipelineError, prepare, run, run_reported};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// A noisy linear problem with an intercept column at position 0.
fn linear_problem(rows: usize, features: usize, seed: u64) -> Dataset<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();
    let coefficients: Vec<f64> = (0..features).map(|j| (j as f64 - 1.5) * 0.8).collect();

    let mut x = Vec::with_capacity(rows * (features + 1));
    let mut y = Vec::with_capacity(rows);
    for _ in 0..rows {
        x.push(1.0);
        let mut target = 4.0;
        for beta in &coefficients {
            let value: f64 = rng.gen_range(-2.0..2.0);
            target += beta * value;
            x.push(value);
        }
        y.push(target + noise.sample(&mut rng));
    }
    Dataset::from_row_major(x, y, features + 1).unwrap()
}

#[test]
fn split_conserves_rows_for_many_shapes() {
    for (rows, features) in [(1, 1), (2, 3), (17, 4), (100, 2)] {
        let data = linear_problem(rows, features, 11);
        for fraction in [0.0, 0.05, 0.33, 0.5, 0.95] {
            for policy in [SplitPolicy::Tail, SplitPolicy::Shuffled { seed: 5 }] {
                let parts = split(&data, fraction, true, policy).unwrap();
                let n = data.ncols();
                assert_eq!(parts.train.nrows() + parts.valid.nrows(), rows);
                assert_eq!(
                    parts.train.nrows() * n + parts.valid.nrows() * n,
                    rows * n
                );
                assert_eq!(parts.train.features_row_major().len(), parts.train.nrows() * n);
                assert_eq!(parts.valid.features_row_major().len(), parts.valid.nrows() * n);
            }
        }
    }
}

#[test]
fn validation_is_scored_with_training_statistics() {
    let data = linear_problem(60, 3, 3);
    let config = PipelineConfig {
        valid_fraction: 0.25,
        standardize: true,
        ..PipelineConfig::default()
    };
    let prepared = prepare(&data, &config).unwrap();

    let raw = split(&data, 0.25, true, SplitPolicy::Tail).unwrap();
    let fitted = prepared.stats.train_raw;
    for (standardized, original) in prepared
        .split
        .valid
        .response()
        .iter()
        .zip(raw.valid.response())
    {
        assert_abs_diff_eq!(*standardized, (original - fitted.mean) / fitted.sd, epsilon = 1e-12);
    }

    // Different validation rows, identical training rows: identical fitted transform.
    let mut other_valid = raw.valid.response().to_vec();
    other_valid.iter_mut().for_each(|v| *v = *v * 3.0 - 100.0);
    let mut train_copy = raw.train.response().to_vec();
    let other = standardize(&mut train_copy, &mut other_valid, true).unwrap();
    assert_eq!(other.train_raw.mean.to_bits(), fitted.mean.to_bits());
    assert_eq!(other.train_raw.sd.to_bits(), fitted.sd.to_bits());
}

#[test]
fn lambda_max_is_non_negative_and_zeroes_on_constant_response() {
    let data = linear_problem(40, 5, 8);
    let prepared = prepare(&data, &PipelineConfig::default()).unwrap();
    assert!(prepared.anchor.lambda_max > 0.0);

    let (features, response, ncols) = data.into_parts();
    let constant = Dataset::from_row_major(features, vec![2.5; response.len()], ncols).unwrap();
    assert_eq!(lambda_max(&constant, true, 2.5), 0.0);
    let prepared = prepare(&constant, &PipelineConfig::default()).unwrap();
    assert_eq!(prepared.anchor.lambda_max, 0.0);
}

#[test]
fn constant_response_with_standardization_is_rejected() {
    let data = Dataset::from_row_major(vec![1.0, 0.1, 1.0, 0.2, 1.0, 0.3], vec![5.0; 3], 2)
        .unwrap();
    let config = PipelineConfig {
        standardize: true,
        ..PipelineConfig::default()
    };
    let err = run(&data, &config, &mut HostUploader::new(), &mut PathEntrySolver).unwrap_err();
    assert!(matches!(err, PipelineError::DegenerateInput(_)));
}

#[test]
fn precision_is_carried_through_every_stage() {
    let wide = linear_problem(50, 2, 21);
    let (features, response, ncols) = wide.clone().into_parts();
    let narrow = Dataset::<f32>::from_row_major(
        features.iter().map(|&v| v as f32).collect(),
        response.iter().map(|&v| v as f32).collect(),
        ncols,
    )
    .unwrap();

    let config = PipelineConfig {
        valid_fraction: 0.2,
        standardize: true,
        ..PipelineConfig::default()
    };
    let single = run_reported(&narrow, &config, &mut HostUploader::new(), &mut PathEntrySolver)
        .unwrap();
    let double = run_reported(&wide, &config, &mut HostUploader::new(), &mut PathEntrySolver)
        .unwrap();

    assert_relative_eq!(
        f64::from(single.anchor.lambda_max),
        double.anchor.lambda_max,
        max_relative = 1e-4
    );
    assert_relative_eq!(single.result, double.result, max_relative = 1e-4);
    assert_eq!(single.anchor.lambda_min_ratio, 1e-9_f64 as f32);
}

#[test]
fn path_entry_result_matches_mean_prediction() {
    let data = linear_problem(30, 2, 99);
    let config = PipelineConfig {
        valid_fraction: 0.3,
        standardize: true,
        ..PipelineConfig::default()
    };
    let result = run(&data, &config, &mut HostUploader::new(), &mut PathEntrySolver).unwrap();

    let raw = split(&data, 0.3, true, SplitPolicy::Tail).unwrap();
    let mean = raw.train.response().iter().sum::<f64>() / raw.train.nrows() as f64;
    let mse = raw
        .valid
        .response()
        .iter()
        .map(|y| (y - mean).powi(2))
        .sum::<f64>()
        / raw.valid.nrows() as f64;
    assert_relative_eq!(result, mse.sqrt(), max_relative = 1e-9);
}

#[test]
fn linear_regression_preset_runs_end_to_end() {
    let data = linear_problem(40, 3, 17);
    let config = PipelineConfig {
        valid_fraction: 0.25,
        ..PipelineConfig::linear_regression()
    };
    let report =
        run_reported(&data, &config, &mut HostUploader::new(), &mut PathEntrySolver).unwrap();

    assert_eq!(report.anchor.lambda_max, 0.0);
    assert_eq!(report.anchor.lambda_min(), 0.0);
    assert_eq!(report.anchor.path(config.n_lambdas).to_vec(), vec![0.0]);
    assert_eq!((report.m_train, report.m_valid), (30, 10));
    assert!(report.result.is_finite() && report.result > 0.0);
}
