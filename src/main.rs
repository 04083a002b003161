// ========================================================================================
//
//                      Command-line driver for the preparation pipeline
//
// ========================================================================================
//
// Resolves the run configuration (file first, then flags), validates it before touching
// the data, loads the dataset in the requested precision and drives the pipeline with the
// host collaborators. Any error prints a diagnostic and exits with a non-zero status.

use clap::{Parser, ValueEnum};
use enet_prep::config::PipelineConfig;
use enet_prep::data::{DEFAULT_RESPONSE_COLUMN, load_dataset};
use enet_prep::device::{HostUploader, PathEntrySolver};
use enet_prep::pipeline::run_reported;
use enet_prep::split::SplitPolicy;
use enet_prep::types::PipelineFloat;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PrecisionCli {
    Single,
    Double,
}

#[derive(Parser, Debug)]
#[clap(
    name = "enet-prep",
    version,
    about = "Split, standardize and anchor the lambda path of a dense regression dataset."
)]
struct Args {
    /// Tab-separated input file with a header row.
    data: PathBuf,

    /// Name of the response column. All other columns are features.
    #[arg(long, default_value = DEFAULT_RESPONSE_COLUMN)]
    response: String,

    /// TOML configuration file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fraction of rows held out for validation, in [0, 1).
    #[arg(long)]
    valid_fraction: Option<f64>,

    /// Fit an intercept (1) or not (0).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    intercept: Option<u8>,

    /// Standardize the response using training statistics.
    #[arg(long)]
    standardize: bool,

    /// Number of lambdas on the regularization path.
    #[arg(long)]
    n_lambdas: Option<usize>,

    /// Number of alphas (L1/L2 mixing values).
    #[arg(long)]
    n_alphas: Option<usize>,

    /// Number of accelerator devices.
    #[arg(long)]
    devices: Option<usize>,

    /// Floating-point width for the whole pipeline.
    #[arg(long, value_enum, default_value_t = PrecisionCli::Double)]
    precision: PrecisionCli,

    /// Fit ordinary least squares: one path point at lambda = 0 with an intercept.
    /// Applied after the config file and before the flags below.
    #[arg(long)]
    linear_regression: bool,

    /// Shuffle rows with this seed before holding out validation rows.
    #[arg(long, value_name = "SEED")]
    shuffle_seed: Option<u64>,

    /// Write the effective configuration to this TOML file.
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start_time = Instant::now();
    let args = Args::parse();

    if let Err(e) = execute(&args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    eprintln!("\nDone in {:.2?}", start_time.elapsed());
}

fn execute(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(args)?;
    config.validate()?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        println!("Configuration written to: {}", path.display());
    }

    match args.precision {
        PrecisionCli::Single => run_with::<f32>(args, &config),
        PrecisionCli::Double => run_with::<f64>(args, &config),
    }
}

/// Starts from the config file (or defaults) and applies every flag that was given.
fn resolve_config(args: &Args) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.linear_regression {
        config = config.with_linear_regression();
    }

    if let Some(fraction) = args.valid_fraction {
        config.valid_fraction = fraction;
    }
    if let Some(intercept) = args.intercept {
        config.intercept = intercept == 1;
    }
    if args.standardize {
        config.standardize = true;
    }
    if let Some(n_lambdas) = args.n_lambdas {
        config.n_lambdas = n_lambdas;
    }
    if let Some(n_alphas) = args.n_alphas {
        config.n_alphas = n_alphas;
    }
    if let Some(devices) = args.devices {
        config.device_count = devices;
    }
    if let Some(seed) = args.shuffle_seed {
        config.split = SplitPolicy::Shuffled { seed };
    }
    Ok(config)
}

fn run_with<T: PipelineFloat>(args: &Args, config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    let data = load_dataset::<T>(&args.data, &args.response, config.intercept)?;
    let report = run_reported(&data, config, &mut HostUploader::new(), &mut PathEntrySolver)?;

    println!("Precision: {}", T::PRECISION);
    println!(
        "Rows: {} training, {} validation; columns: {}",
        report.m_train, report.m_valid, report.n
    );
    println!(
        "Training response: mean {}, sd {}",
        report.stats.train_raw.mean, report.stats.train_raw.sd
    );
    if let Some(valid) = report.stats.valid_raw {
        println!("Validation response: mean {}, sd {}", valid.mean, valid.sd);
    }
    println!("lambda_max: {}", report.anchor.lambda_max);
    println!(
        "lambda_min: {} (ratio {})",
        report.anchor.lambda_min(),
        report.anchor.lambda_min_ratio
    );
    println!("Path-entry RMSE: {}", report.result);
    Ok(())
}
