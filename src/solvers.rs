//! This module provides the high-level API: stochastic Lanczos quadrature estimates of
//! `tr f(A)` for a Hermitian operator `A`.

use crate::{
    algorithms::{
        LanczosCallback, TridiagonalSystemView, lanczos::lanczos_tridiagonal,
        quadrature::GaussQuadrature,
    },
    config::ApproxSpectralOptions,
    error::{ErrorKind, SpectralError},
    estimator::{Decision, SpectralEstimate, TraceEstimator, TraceSample, bootstrap_interval},
    functions::{SpectralFunction, SpectralRange},
    matrix::LinearOperator,
    pool::{SequentialPool, TaskPool},
    random::RandomVectorGenerator,
    scalar::Scalar,
};
use log::{debug, info, warn};

/// Computes one Hutchinson sample `d · ⟨v|f(A)|v⟩ / ‖v‖²` of `tr f(A)`.
///
/// A random vector is drawn from `generator`, up to `options.lanczos_order` Lanczos
/// steps are run from it, and the resulting Gauss quadrature rule is applied to `f`
/// after clamping its nodes into the operator's declared spectral range.
///
/// # Arguments
/// * `operator`: A Hermitian operator implementing [`LinearOperator`].
/// * `f`: The spectral function.
/// * `generator`: The source of the random starting vector.
/// * `options`: Per-sample settings (`lanczos_order`, `lanczos_tol`, `beta_tol`,
///   `product_vectors`).
///
/// # Returns
/// The sample, or an error if the operator misbehaves, the eigensolver fails, or `f` is
/// undefined at a node. An early Lanczos breakdown is not an error.
pub fn sample_trace<T, O>(
    operator: &O,
    f: &SpectralFunction,
    generator: &mut RandomVectorGenerator,
    options: &ApproxSpectralOptions,
) -> Result<TraceSample, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    let dim = operator.dim();
    let v = if options.product_vectors {
        let dims = operator.subsystem_dims().ok_or_else(|| {
            ErrorKind::InputError(
                "product vectors need an operator that reports its subsystem dimensions"
                    .to_string(),
            )
        })?;
        generator.sample_product::<T>(&dims)?
    } else {
        generator.sample::<T>(dim)?
    };

    let range = SpectralRange::of(operator);
    let k = options.lanczos_order.min(dim);

    // Early stop once two successive quadrature estimates agree.
    let lanczos_tol = options.lanczos_tol;
    let mut previous: Option<f64> = None;
    let mut stop_when_stable = |view: &TridiagonalSystemView<'_>| -> bool {
        let Some(tol) = lanczos_tol else {
            return true;
        };
        let Ok(current) =
            GaussQuadrature::from_view(view).and_then(|rule| f.evaluate(&rule, range))
        else {
            // Left to the final evaluation, which reports the error.
            return true;
        };
        let stable = previous
            .is_some_and(|p| (current - p).abs() <= tol * current.abs().max(p.abs()));
        previous = Some(current);
        !stable
    };
    let callback = lanczos_tol
        .is_some()
        .then_some(&mut stop_when_stable as &mut LanczosCallback<'_>);

    let decomposition = lanczos_tridiagonal(operator, v.as_ref(), k, options.beta_tol, callback)?;
    let rule = GaussQuadrature::from_decomposition(&decomposition)?;
    let value = f.evaluate(&rule, range)?;
    let b_norm_sq = decomposition.b_norm * decomposition.b_norm;

    // A continuous random vector is an eigenvector only if A = cI (almost surely), in
    // which case the single node c is the whole spectrum.
    let exact = decomposition.breakdown
        && decomposition.steps_taken == 1
        && generator.kind().is_continuous()
        && !options.product_vectors;

    Ok(TraceSample {
        estimate: dim as f64 * value / b_norm_sq,
        lanczos_steps: decomposition.steps_taken,
        exact,
    })
}

/// Estimates `tr f(A)` sequentially on the calling thread.
///
/// Equivalent to [`approx_spectral_function_with_pool`] with a [`SequentialPool`]. With
/// `options.seed` set, two calls with the same arguments return bit-identical results.
///
/// # Example
///
/// ```rust
/// use faer::Mat;
/// use lanczos_spectral::{ApproxSpectralOptions, SpectralFunction, approx_spectral_function};
///
/// // diag(1, 2, ..., 8): tr sqrt(A) = Σ sqrt(i).
/// let a = Mat::from_fn(8, 8, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
/// let options = ApproxSpectralOptions::default()
///     .with_seed(3)
///     .with_tolerance(2e-3)
///     .with_max_samples(100_000);
/// let result = approx_spectral_function(&a, &SpectralFunction::Sqrt, &options).unwrap();
///
/// let exact: f64 = (1..=8).map(|i| (i as f64).sqrt()).sum();
/// assert!(result.converged);
/// assert!((result.estimate - exact).abs() < 0.15);
/// ```
pub fn approx_spectral_function<T, O>(
    operator: &O,
    f: &SpectralFunction,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function_with_pool::<T, O, _>(operator, f, options, &SequentialPool)
}

/// Estimates `tr f(A)` with the sampling tasks distributed over `pool`.
///
/// Samples are drawn in batches of `options.batch_size` (default: one per worker). Each
/// task gets its own random stream forked from the seeded generator in task order, and
/// results are folded in task order, so a seeded run gives the same answer on any pool.
/// After every batch the stopping rule decides whether another batch is issued.
///
/// # Arguments
/// * `operator`: A Hermitian operator implementing [`LinearOperator`]. It is shared
///   read-only by all tasks.
/// * `f`: The spectral function.
/// * `options`: See [`ApproxSpectralOptions`].
/// * `pool`: The parallel-map capability.
///
/// # Returns
/// The estimate, flagged `converged == false` if a budget ran out first. Invalid options,
/// a non-Hermitian operator, dimension mismatches, eigensolver failures and values of
/// `f` that are undefined at a node abort the whole call once the current batch is
/// done.
pub fn approx_spectral_function_with_pool<T, O, P>(
    operator: &O,
    f: &SpectralFunction,
    options: &ApproxSpectralOptions,
    pool: &P,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
    P: TaskPool,
{
    options.validate()?;
    let dim = operator.dim();
    if dim == 0 {
        return Err(ErrorKind::InputError("operator has dimension 0".to_string()).into());
    }
    if !operator.is_hermitian() {
        return Err(ErrorKind::InputError(
            "Lanczos quadrature requires a Hermitian operator".to_string(),
        )
        .into());
    }

    let rule = options.stopping_rule();
    let batch_size = options.batch_size.unwrap_or_else(|| pool.num_workers()).max(1);
    let mut generator = RandomVectorGenerator::new(options.generator_kind, options.seed);
    let mut estimator = TraceEstimator::new(rule, options.bootstrap);

    debug!(
        "Estimating tr {}(A) for d = {dim}, order {}, batches of {batch_size}",
        f.name(),
        options.lanczos_order.min(dim)
    );

    let mut decision = Decision::Continue;
    let mut batches = 0usize;
    while decision == Decision::Continue {
        let remaining = rule.max_samples - estimator.stats().count();
        let tasks: Vec<_> = (0..batch_size.min(remaining))
            .map(|_| {
                let mut task_generator = generator.fork();
                move || sample_trace::<T, O>(operator, f, &mut task_generator, options)
            })
            .collect();

        for sample in pool.map(tasks) {
            estimator.fold(sample?);
        }
        batches += 1;
        decision = estimator.decision();

        let stats = estimator.stats();
        debug!(
            "Batch {batches}: {} samples, mean = {:e}, standard error = {:e}",
            stats.count(),
            stats.mean(),
            stats.standard_error()
        );
    }

    let confidence_interval = if options.bootstrap {
        bootstrap_interval(
            estimator.samples(),
            options.bootstrap_resamples,
            options.confidence_level,
            &mut generator.fork(),
        )
    } else {
        None
    };

    let result = estimator.finish(confidence_interval);
    match decision {
        Decision::Converged => info!(
            "tr {}(A) ≈ {:e} ± {:e} after {} samples ({} Lanczos steps)",
            f.name(),
            result.estimate,
            result.standard_error,
            result.num_samples,
            result.lanczos_steps
        ),
        _ => warn!(
            "tr {}(A) did not reach tolerance {} within budget; best estimate {:e} ± {:e} \
             after {} samples",
            f.name(),
            options.tolerance,
            result.estimate,
            result.standard_error,
            result.num_samples
        ),
    }
    Ok(result)
}

/// Estimates the trace norm `tr |A|`.
pub fn tr_abs_approx<T, O>(
    operator: &O,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function::<T, O>(operator, &SpectralFunction::Abs, options)
}

/// Estimates `tr exp(A)`.
pub fn tr_exp_approx<T, O>(
    operator: &O,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function::<T, O>(operator, &SpectralFunction::Exp, options)
}

/// Estimates `tr sqrt(A)` of a positive semidefinite operator.
pub fn tr_sqrt_approx<T, O>(
    operator: &O,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function::<T, O>(operator, &SpectralFunction::Sqrt, options)
}

/// Estimates `tr A ln A`; for a density matrix this is minus the von Neumann entropy.
pub fn tr_xlogx_approx<T, O>(
    operator: &O,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function::<T, O>(operator, &SpectralFunction::XLogX, options)
}

/// Estimates `ln det A = tr ln A` of a positive definite operator.
pub fn tr_log_approx<T, O>(
    operator: &O,
    options: &ApproxSpectralOptions,
) -> Result<SpectralEstimate, SpectralError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    approx_spectral_function::<T, O>(operator, &SpectralFunction::Log, options)
}
