//! Experiment runner for the accuracy of stochastic Lanczos quadrature.
//!
//! This executable estimates `tr f(A)` for a synthetic sparse diagonal operator with a
//! known spectrum, sweeping the Lanczos order `k`, and compares each estimate against
//! the exact trace. One CSV row is written per order.

use anyhow::{Context, Result, anyhow, ensure};
use clap::{Parser, ValueEnum};
use faer::sparse::{SparseColMat, Triplet};
use lanczos_spectral::{
    ApproxSpectralOptions, PositiveSemidefinite, RandomVectorKind, RayonPool, SequentialPool,
    SpectralEstimate, SpectralFunction, approx_spectral_function_with_pool,
};
use serde::Serialize;
use std::path::PathBuf;

/// Parses a function name accepted by [`SpectralFunction::from_name`].
fn parse_function(name: &str) -> Result<SpectralFunction, String> {
    SpectralFunction::from_name(name).ok_or_else(|| {
        format!("unknown function `{name}`; expected identity, abs, log, sqrt, xlogx or exp")
    })
}

/// The shape of the synthetic spectrum.
#[derive(ValueEnum, Clone, Debug, Copy)]
enum Spectrum {
    /// Eigenvalues evenly spaced in [0.1, 10].
    Uniform,
    /// A normalized density-matrix-like spectrum with geometric decay.
    Decaying,
    /// Eigenvalues evenly spaced in [1e-8, 1], with one eigenvalue at 1e-12.
    NearSingular,
    /// Eigenvalues evenly spaced in [-5, 5].
    Indefinite,
}

#[derive(ValueEnum, Clone, Debug, Copy)]
enum Generator {
    Gaussian,
    Rademacher,
}

/// Command-line arguments for the trace estimation experiment.
#[derive(Parser, Debug)]
#[clap(
    name = "approx-trace",
    about = "Estimates tr f(A) by stochastic Lanczos quadrature against an exact ground truth."
)]
struct ApproxTraceArgs {
    /// The spectral function to test (identity, abs, log, sqrt, xlogx or exp).
    #[clap(long, value_parser = parse_function)]
    function: SpectralFunction,

    /// The synthetic spectrum of the test operator.
    #[clap(long, value_enum)]
    spectrum: Spectrum,

    /// Dimension of the test operator.
    #[clap(long, default_value_t = 1000)]
    n: usize,

    /// Minimum Lanczos order (k) to test.
    #[clap(long, default_value_t = 2)]
    k_min: usize,

    /// Maximum Lanczos order (k) to test.
    #[clap(long, default_value_t = 40)]
    k_max: usize,

    /// Step size for iterating k.
    #[clap(long, default_value_t = 2)]
    k_step: usize,

    /// Relative tolerance on the standard error.
    #[clap(long, default_value_t = 0.01)]
    tolerance: f64,

    /// Maximum number of random vectors per estimate.
    #[clap(long, default_value_t = 1024)]
    max_samples: usize,

    /// Random vector distribution.
    #[clap(long, value_enum, default_value_t = Generator::Gaussian)]
    generator: Generator,

    /// Seed of the random vector generator.
    #[clap(long, default_value_t = 42)]
    seed: u64,

    /// Worker threads; 0 runs sequentially on the main thread.
    #[clap(long, default_value_t = 0)]
    threads: usize,

    /// Also compute a 95% bootstrap confidence interval.
    #[clap(long)]
    bootstrap: bool,

    /// Path to the output CSV file where results will be written.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// A single row of the accuracy CSV.
#[derive(Debug, Serialize)]
struct TraceResult {
    k: usize,
    exact: f64,
    estimate: f64,
    relative_error: f64,
    standard_error: f64,
    ci_lower: Option<f64>,
    ci_upper: Option<f64>,
    num_samples: usize,
    lanczos_steps: usize,
    converged: bool,
}

/// Eigenvalues of the synthetic operator.
fn spectrum(n: usize, shape: Spectrum) -> Vec<f64> {
    let spaced = |lo: f64, hi: f64| -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) / n.saturating_sub(1).max(1) as f64 * i as f64)
            .collect()
    };
    match shape {
        Spectrum::Uniform => spaced(0.1, 10.0),
        Spectrum::Decaying => {
            let raw: Vec<f64> = (0..n).map(|i| (-(i as f64) / 20.0).exp()).collect();
            let total: f64 = raw.iter().sum();
            raw.into_iter().map(|x| x / total).collect()
        }
        Spectrum::NearSingular => {
            let mut eigs = spaced(1e-8, 1.0);
            eigs[0] = 1e-12;
            eigs
        }
        Spectrum::Indefinite => spaced(-5.0, 5.0),
    }
}

/// Creates a sparse diagonal operator with the given eigenvalues.
fn diagonal_operator(eigs: &[f64]) -> Result<SparseColMat<usize, f64>> {
    let n = eigs.len();
    let triplets: Vec<Triplet<usize, usize, f64>> = eigs
        .iter()
        .enumerate()
        .map(|(i, &val)| Triplet {
            row: i,
            col: i,
            val,
        })
        .collect();
    SparseColMat::try_new_from_triplets(n, n, &triplets)
        .map_err(|e| anyhow!("Failed to construct the diagonal operator: {:?}", e))
}

fn row(k: usize, exact: f64, result: &SpectralEstimate) -> TraceResult {
    TraceResult {
        k,
        exact,
        estimate: result.estimate,
        relative_error: (result.estimate - exact).abs() / exact.abs().max(f64::MIN_POSITIVE),
        standard_error: result.standard_error,
        ci_lower: result.confidence_interval.map(|ci| ci.lower),
        ci_upper: result.confidence_interval.map(|ci| ci.upper),
        num_samples: result.num_samples,
        lanczos_steps: result.lanczos_steps,
        converged: result.converged,
    }
}

/// Rejects argument combinations that would describe an empty problem or an empty sweep.
fn validate(args: &ApproxTraceArgs) -> Result<()> {
    ensure!(args.n >= 1, "the operator dimension must be at least 1");
    ensure!(
        1 <= args.k_min && args.k_min <= args.k_max,
        "expected 1 <= k_min <= k_max, got k_min = {}, k_max = {}",
        args.k_min,
        args.k_max
    );
    Ok(())
}

/// The main entry point for the trace estimation experiment.
fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()?;
    let args = ApproxTraceArgs::parse();
    validate(&args)?;
    log::info!(
        "Starting trace estimation for function: {:?}, spectrum: {:?}",
        args.function,
        args.spectrum
    );

    // 1. Setup the test problem and ground truth.
    let eigs = spectrum(args.n, args.spectrum);
    let f = &args.function;
    let exact: f64 = eigs.iter().map(|&x| f.apply(x)).sum();
    let operator = PositiveSemidefinite(diagonal_operator(&eigs)?);
    let psd = eigs.iter().all(|&x| x >= 0.0);
    log::info!("Exact tr {}(A) = {exact:e}", f.name());

    let pool = (args.threads > 0)
        .then(|| RayonPool::new(args.threads))
        .transpose()
        .context("Failed to build the worker pool")?;

    let base = ApproxSpectralOptions::default()
        .with_tolerance(args.tolerance)
        .with_max_samples(args.max_samples)
        .with_seed(args.seed)
        .with_bootstrap(args.bootstrap)
        .with_generator_kind(match args.generator {
            Generator::Gaussian => RandomVectorKind::Gaussian,
            Generator::Rademacher => RandomVectorKind::Rademacher,
        });

    // 2. Iterate through k.
    let mut results = Vec::new();
    for k in (args.k_min..=args.k_max).step_by(args.k_step.max(1)) {
        log::info!("Running for k = {}...", k);
        let options = base.clone().with_lanczos_order(k);

        let outcome = match (&pool, psd) {
            (Some(pool), true) => approx_spectral_function_with_pool(&operator, f, &options, pool),
            (Some(pool), false) => {
                approx_spectral_function_with_pool(&operator.0, f, &options, pool)
            }
            (None, true) => {
                approx_spectral_function_with_pool(&operator, f, &options, &SequentialPool)
            }
            (None, false) => {
                approx_spectral_function_with_pool(&operator.0, f, &options, &SequentialPool)
            }
        };
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Estimation failed at k={}: {}. Stopping.", k, e);
                break;
            }
        };

        // 3. Compute and store metrics.
        results.push(row(k, exact, &result));
    }

    // 4. Write results to CSV.
    log::info!("Writing results to {:?}...", &args.output);
    let mut writer = csv::Writer::from_path(&args.output)?;
    for record in results {
        writer.serialize(record)?;
    }
    writer.flush()?;

    log::info!("Trace estimation experiment complete.");
    Ok(())
}
