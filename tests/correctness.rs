//! Integration test suite to verify the mathematical correctness of stochastic Lanczos
//! quadrature.
//!
//! # Test Methodology
//!
//! Every estimate is checked against a ground truth that can be computed analytically.
//!
//! 1.  **Quadrature of a bilinear form:** For a diagonal matrix `A = diag(λ_1, ..., λ_n)`
//!     and a fixed vector `b`, `⟨b|f(A)|b⟩ = Σ f(λ_i) b_i²` exactly. The Gauss quadrature
//!     rule of `k` Lanczos steps must reproduce it to within a tolerance that reflects how
//!     well a polynomial of degree `2k - 1` approximates `f` on the spectrum.
//! 2.  **Stochastic trace estimation:** For a dense matrix `A = U diag(λ) U^H` with a
//!     random unitary `U`, `tr f(A) = Σ f(λ_i)`. With the Lanczos order equal to the
//!     dimension every sample is exact up to rounding, so the only error left is the
//!     Monte Carlo error. The estimate must lie within a few standard errors of the truth.
//!
//! This is repeated for a set of functions covering the named variants.

use anyhow::{Result, anyhow, ensure};
use faer::{
    Side, c64,
    prelude::*,
    sparse::{SparseColMat, Triplet},
};
use lanczos_spectral::{
    ApproxSpectralOptions, PositiveSemidefinite, RandomVectorKind, SpectralFunction,
    algorithms::{
        DEFAULT_BETA_TOLERANCE, lanczos::lanczos_tridiagonal, quadrature::GaussQuadrature,
    },
    approx_spectral_function,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// A tolerance for the relative quadrature error of non-polynomial functions.
///
/// The spectrum lies in `[0.01, 1]`, so the Gauss rule converges geometrically at a rate
/// set by the condition number 100. Thirty steps leave a small but non-zero error.
const APPROX_TOLERANCE: f64 = 1e-3;

/// A tighter tolerance for polynomials of degree below `2k`, which Gauss quadrature
/// integrates exactly.
const EXACT_TOLERANCE: f64 = 1e-10;

/// Number of standard errors within which a stochastic estimate must fall.
const SIGMAS: f64 = 5.0;

/// Creates a diagonal sparse matrix with eigenvalues `(i + 1) / n` and a random vector.
///
/// A random starting vector has a non-trivial projection on every eigenvector, so the
/// Krylov subspace is rich and the recurrence does not break down early. A fixed seed
/// makes the test deterministic.
fn create_diagonal_problem(n: usize) -> (SparseColMat<usize, f64>, Mat<f64>, Vec<f64>) {
    let mut triplets = Vec::with_capacity(n);
    let mut eigs = Vec::with_capacity(n);

    for i in 0..n {
        let val = (i + 1) as f64 / n as f64;
        triplets.push(Triplet {
            row: i,
            col: i,
            val,
        });
        eigs.push(val);
    }
    let a = SparseColMat::try_new_from_triplets(n, n, &triplets).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let b = Mat::from_fn(n, 1, |_, _| rng.random::<f64>() - 0.5);

    (a, b, eigs)
}

/// Builds `U diag(eigs) U^T` for a random orthogonal `U`.
fn rotated_real(eigs: &[f64], seed: u64) -> Result<Mat<f64>> {
    let n = eigs.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let g = Mat::from_fn(n, n, |_, _| rng.random::<f64>() - 0.5);
    let sym = Mat::from_fn(n, n, |i, j| g[(i, j)] + g[(j, i)]);
    let evd = sym
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| anyhow!("EVD failed: {:?}", e))?;
    let u = evd.U();
    let d = Mat::from_fn(n, n, |i, j| if i == j { eigs[i] } else { 0.0 });
    Ok(u * &d * u.adjoint())
}

/// Builds `U diag(eigs) U^H` for a random unitary `U`.
fn rotated_complex(eigs: &[f64], seed: u64) -> Result<Mat<c64>> {
    let n = eigs.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let g = Mat::from_fn(n, n, |_, _| {
        c64::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5)
    });
    let herm = Mat::from_fn(n, n, |i, j| g[(i, j)] + g[(j, i)].conj());
    let evd = herm
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| anyhow!("EVD failed: {:?}", e))?;
    let u = evd.U();
    let d = Mat::from_fn(n, n, |i, j| {
        if i == j {
            c64::new(eigs[i], 0.0)
        } else {
            c64::new(0.0, 0.0)
        }
    });
    Ok(u * &d * u.adjoint())
}

/// A macro to generate the boilerplate of each quadrature test.
///
/// 1. Build the diagonal problem with `n = 100` and run `k = 30` Lanczos steps.
/// 2. Compute the exact bilinear form `Σ f(λ_i) b_i²`.
/// 3. Build the Gauss rule and integrate `f`.
/// 4. Assert the relative error is within tolerance.
macro_rules! generate_quadrature_test {
    ($test_name:ident, $f:expr, $tolerance:expr, $error_msg_prefix:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let n = 100;
            let k = 30;
            let (a, b, eigs) = create_diagonal_problem(n);
            let f: SpectralFunction = $f;

            let exact: f64 = eigs
                .iter()
                .enumerate()
                .map(|(i, &eig)| f.apply(eig) * b[(i, 0)] * b[(i, 0)])
                .sum();

            let decomposition =
                lanczos_tridiagonal(&a, b.as_ref(), k, DEFAULT_BETA_TOLERANCE, None)?;
            ensure!(decomposition.steps_taken == k, "unexpected early breakdown");
            let rule = GaussQuadrature::from_decomposition(&decomposition)?;
            let approx = rule.integrate(|x| f.apply(x));

            let rel_err = (approx - exact).abs() / exact.abs();
            ensure!(
                rel_err < $tolerance,
                "{} error too high: {}",
                $error_msg_prefix,
                rel_err
            );
            Ok(())
        }
    };
}

// --- Quadrature of a single bilinear form ---

// f(x) = x is a polynomial of degree 1: the Rayleigh quotient is reproduced exactly.
generate_quadrature_test!(
    test_quadrature_identity,
    SpectralFunction::Identity,
    EXACT_TOLERANCE,
    "Identity quadrature"
);

// f(x) = x^3 of degree 3 < 2k is also integrated exactly.
generate_quadrature_test!(
    test_quadrature_cubic,
    SpectralFunction::custom("cube", lanczos_spectral::Domain::Real, |x| x * x * x),
    EXACT_TOLERANCE,
    "Cubic quadrature"
);

generate_quadrature_test!(
    test_quadrature_log,
    SpectralFunction::Log,
    APPROX_TOLERANCE,
    "Log quadrature"
);

generate_quadrature_test!(
    test_quadrature_sqrt,
    SpectralFunction::Sqrt,
    APPROX_TOLERANCE,
    "Sqrt quadrature"
);

generate_quadrature_test!(
    test_quadrature_exp,
    SpectralFunction::Exp,
    APPROX_TOLERANCE,
    "Exp quadrature"
);

generate_quadrature_test!(
    test_quadrature_xlogx,
    SpectralFunction::XLogX,
    APPROX_TOLERANCE,
    "x log x quadrature"
);

/// A macro to generate the boilerplate of each stochastic trace test.
///
/// The operator is a dense 12x12 matrix with the given spectrum in a random basis. The
/// Lanczos order defaults to the dimension, so each sample is exact up to rounding and
/// the estimate must be within [`SIGMAS`] standard errors of `Σ f(λ_i)`.
macro_rules! generate_trace_test {
    ($test_name:ident, $operator:expr, $eigs:expr, $f:expr, $kind:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let eigs: Vec<f64> = $eigs;
            let f: SpectralFunction = $f;
            let operator = $operator(&eigs)?;
            let exact: f64 = eigs.iter().map(|&x| f.apply(x)).sum();

            let options = ApproxSpectralOptions::default()
                .with_tolerance(0.01)
                .with_max_samples(50_000)
                .with_generator_kind($kind)
                .with_seed(2024);
            let result = approx_spectral_function(&operator, &f, &options)?;

            ensure!(result.converged, "did not converge: {:?}", result);
            let err = (result.estimate - exact).abs();
            ensure!(
                err <= SIGMAS * result.standard_error + 1e-9 * exact.abs(),
                "tr {}(A): estimate {} vs exact {} (standard error {})",
                f.name(),
                result.estimate,
                exact,
                result.standard_error
            );
            Ok(())
        }
    };
}

fn spread_spectrum() -> Vec<f64> {
    (0..12).map(|i| 0.25 + 0.3 * i as f64).collect()
}

fn indefinite_spectrum() -> Vec<f64> {
    (0..12).map(|i| -2.0 + 0.4 * i as f64).collect()
}

fn density_spectrum() -> Vec<f64> {
    let raw: Vec<f64> = (0..12).map(|i| (-(i as f64) / 3.0).exp()).collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|x| x / total).collect()
}

// --- Stochastic trace estimation ---

generate_trace_test!(
    test_trace_identity_gaussian,
    |e: &[f64]| rotated_real(e, 1),
    spread_spectrum(),
    SpectralFunction::Identity,
    RandomVectorKind::Gaussian
);

generate_trace_test!(
    test_trace_abs_indefinite,
    |e: &[f64]| rotated_real(e, 2),
    indefinite_spectrum(),
    SpectralFunction::Abs,
    RandomVectorKind::Gaussian
);

generate_trace_test!(
    test_trace_log_positive,
    |e: &[f64]| rotated_real(e, 3),
    spread_spectrum(),
    SpectralFunction::Log,
    RandomVectorKind::Rademacher
);

generate_trace_test!(
    test_trace_sqrt_psd,
    |e: &[f64]| rotated_real(e, 4).map(PositiveSemidefinite),
    spread_spectrum(),
    SpectralFunction::Sqrt,
    RandomVectorKind::Gaussian
);

generate_trace_test!(
    test_trace_entropy_complex_density_matrix,
    |e: &[f64]| rotated_complex(e, 5).map(PositiveSemidefinite),
    density_spectrum(),
    SpectralFunction::XLogX,
    RandomVectorKind::Gaussian
);

generate_trace_test!(
    test_trace_log_complex_rademacher,
    |e: &[f64]| rotated_complex(e, 6),
    spread_spectrum(),
    SpectralFunction::Log,
    RandomVectorKind::Rademacher
);
