//! Symmetric Lanczos tridiagonalization with local re-orthogonalization.
//!
//! ** NOTE: most callers want [`crate::solvers::approx_spectral_function`]. This module is
//! intended for use cases where fine-grained control over the Lanczos process is required.
//!
//! For quadrature only the scalar coefficients of T_k are needed, so the basis vectors are
//! never stored: the iteration keeps the current and previous vectors only and uses O(n)
//! memory regardless of the number of steps. Each new residual is re-orthogonalized
//! against those two vectors with a second Gram-Schmidt sweep. This does not restore
//! global orthogonality (full re-orthogonalization would need the whole basis), but it
//! removes the cancellation error of the three-term recurrence itself, which is what
//! drifts first over the short runs used for quadrature.
//!
//! When β becomes numerically zero the Krylov subspace is invariant. The run then ends
//! early with a shorter, exact decomposition; this is a normal termination.

use super::{
    LanczosCallback, LanczosDecomposition, LanczosError, LanczosStep, TridiagonalSystemView,
    is_breakdown,
};
use crate::{error::ErrorKind, matrix::LinearOperator, scalar::Scalar};
use faer::{prelude::*, traits::ComplexField};
use log::debug;
use std::marker::PhantomData;

/// ⟨x, y⟩ = x^H y for two column vectors.
#[inline]
pub(crate) fn dot<T: Scalar>(x: MatRef<'_, T>, y: MatRef<'_, T>) -> T {
    (x.adjoint() * y)[(0, 0)]
}

/// A stateful Lanczos iterator holding the two most recent basis vectors.
pub struct LanczosIteration<'a, T: Scalar, O: LinearOperator<T> + ?Sized> {
    operator: &'a O,
    v_prev: Mat<T>,
    v_curr: Mat<T>,
    beta_prev: f64,
    k: usize,
    max_k: usize,
    _scalar: PhantomData<T>,
}

impl<'a, T: Scalar, O: LinearOperator<T> + ?Sized> LanczosIteration<'a, T, O> {
    /// Prepares the iteration for at most `max_k` steps starting from `b`, whose norm
    /// `b_norm` the caller has already computed.
    pub fn new(
        operator: &'a O,
        b: MatRef<'_, T>,
        max_k: usize,
        b_norm: f64,
    ) -> Result<Self, LanczosError> {
        if b.ncols() != 1 {
            return Err(ErrorKind::InputError(format!(
                "the starting vector must have exactly one column, got {}",
                b.ncols()
            ))
            .into());
        }
        if operator.dim() != b.nrows() {
            return Err(ErrorKind::DimensionMismatch {
                expected: operator.dim(),
                actual: b.nrows(),
            }
            .into());
        }
        if max_k == 0 {
            return Err(ErrorKind::InputError(
                "the number of Lanczos steps must be positive".to_string(),
            )
            .into());
        }
        if b_norm <= 0.0 || !b_norm.is_finite() {
            return Err(ErrorKind::InputError(
                "The starting vector must be a finite, non-zero vector.".to_string(),
            )
            .into());
        }

        let v_curr = b * Scale(T::from_real_impl(&b_norm.recip()));

        Ok(Self {
            operator,
            v_prev: Mat::zeros(b.nrows(), 1),
            v_curr,
            beta_prev: 0.0,
            k: 0,
            max_k,
            _scalar: PhantomData,
        })
    }

    /// Performs one step of the recurrence
    /// `β_{j+1} v_{j+1} = A v_j - α_j v_j - β_j v_{j-1}`.
    ///
    /// Returns `Ok(None)` once `max_k` steps have been taken. When β is exactly zero the
    /// internal vectors are left untouched; the caller is expected to stop. A NaN or
    /// infinite coefficient means the operator itself is broken and is reported as an
    /// [`ErrorKind::InputError`].
    pub fn next_step(&mut self) -> Result<Option<LanczosStep>, LanczosError> {
        if self.k >= self.max_k {
            return Ok(None);
        }

        let mut w = self.operator.apply(self.v_curr.as_ref())?;

        let alpha = T::real_part_impl(&dot(self.v_curr.as_ref(), w.as_ref()));
        w -= &self.v_curr * Scale(T::from_real_impl(&alpha));
        w -= &self.v_prev * Scale(T::from_real_impl(&self.beta_prev));

        // Local re-orthogonalization against v_j and v_{j-1}.
        let c_curr = dot(self.v_curr.as_ref(), w.as_ref());
        let c_prev = dot(self.v_prev.as_ref(), w.as_ref());
        w -= &self.v_curr * Scale(c_curr);
        w -= &self.v_prev * Scale(c_prev);
        let alpha = alpha + T::real_part_impl(&c_curr);

        let beta = w.norm_l2();
        if !alpha.is_finite() || !beta.is_finite() {
            return Err(ErrorKind::InputError(format!(
                "non-finite Lanczos coefficient at step {} (alpha = {alpha}, beta = {beta})",
                self.k + 1
            ))
            .into());
        }
        self.k += 1;

        if beta > 0.0 {
            let next = &w * Scale(T::from_real_impl(&beta.recip()));
            self.v_prev = core::mem::replace(&mut self.v_curr, next);
            self.beta_prev = beta;
        }

        Ok(Some(LanczosStep { alpha, beta }))
    }
}

/// Runs up to `k` Lanczos steps from `b` and returns the coefficients of T_k.
///
/// # Arguments
/// * `operator`: A Hermitian operator implementing [`LinearOperator`].
/// * `b`: The starting vector. Must not be a zero vector.
/// * `k`: The maximum number of iterations to perform.
/// * `beta_tol`: Relative breakdown threshold (see [`super::DEFAULT_BETA_TOLERANCE`]).
/// * `callback`: An optional callback invoked after each step; returning `false` stops
///   the run early.
///
/// # Returns
/// The [`LanczosDecomposition`], with `steps_taken <= k`. An invariant subspace ends the
/// run early with `breakdown == true`.
pub fn lanczos_tridiagonal<T, O>(
    operator: &O,
    b: MatRef<'_, T>,
    k: usize,
    beta_tol: f64,
    mut callback: Option<&mut LanczosCallback<'_>>,
) -> Result<LanczosDecomposition, LanczosError>
where
    T: Scalar,
    O: LinearOperator<T> + ?Sized,
{
    let b_norm = b.norm_l2();
    let mut lanczos_iter = LanczosIteration::new(operator, b, k, b_norm)?;

    let mut alphas = Vec::with_capacity(k);
    let mut betas = Vec::with_capacity(k.saturating_sub(1));
    let mut steps_taken = 0;
    let mut breakdown = false;
    let mut scale: f64 = 0.0;
    let mut beta_prev = 0.0;

    while let Some(step) = lanczos_iter.next_step()? {
        alphas.push(step.alpha);
        steps_taken += 1;
        scale = scale.max(step.alpha.abs() + step.beta + beta_prev);
        beta_prev = step.beta;

        if let Some(ref mut cb) = callback {
            let view = TridiagonalSystemView {
                alphas: &alphas,
                betas: &betas,
                steps_taken,
                b_norm,
            };
            if !cb(&view) {
                break;
            }
        }

        if is_breakdown(step.beta, scale, beta_tol) {
            debug!(
                "Lanczos breakdown after {steps_taken} steps (beta = {:e})",
                step.beta
            );
            breakdown = true;
            break;
        }

        // The off-diagonal coefficient is only part of T_k if another step follows.
        if steps_taken < k {
            betas.push(step.beta);
        }
    }

    Ok(LanczosDecomposition {
        alphas,
        betas,
        steps_taken,
        b_norm,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::DEFAULT_BETA_TOLERANCE;
    use faer::{Side, c64, mat};

    fn tridiagonal(alphas: &[f64], betas: &[f64]) -> Mat<f64> {
        let k = alphas.len();
        let mut t = Mat::zeros(k, k);
        for (i, &a) in alphas.iter().enumerate() {
            t[(i, i)] = a;
        }
        for (i, &b) in betas.iter().enumerate() {
            t[(i, i + 1)] = b;
            t[(i + 1, i)] = b;
        }
        t
    }

    #[test]
    fn full_run_reproduces_the_spectrum() {
        let a: Mat<f64> = mat![
            [4.0, 1.0, 0.0, 0.5],
            [1.0, 3.0, 0.2, 0.0],
            [0.0, 0.2, 2.0, 0.1],
            [0.5, 0.0, 0.1, 1.0],
        ];
        let b: Mat<f64> = mat![[1.0], [0.3], [-0.7], [0.2]];
        let dec = lanczos_tridiagonal(&a, b.as_ref(), 4, DEFAULT_BETA_TOLERANCE, None).unwrap();
        assert_eq!(dec.steps_taken, 4);
        assert_eq!(dec.betas.len(), 3);

        let t = tridiagonal(&dec.alphas, &dec.betas);
        let t_eigs = t.as_ref().self_adjoint_eigen(Side::Upper).unwrap();
        let a_eigs = a.as_ref().self_adjoint_eigen(Side::Upper).unwrap();
        for i in 0..4 {
            assert!((t_eigs.S()[i] - a_eigs.S()[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn first_alpha_is_the_rayleigh_quotient() {
        let a: Mat<f64> = mat![[2.0, 1.0], [1.0, 3.0]];
        let b: Mat<f64> = mat![[1.0], [1.0]];
        let dec = lanczos_tridiagonal(&a, b.as_ref(), 1, DEFAULT_BETA_TOLERANCE, None).unwrap();
        assert_eq!(dec.steps_taken, 1);
        assert!(dec.betas.is_empty());
        assert!((dec.alphas[0] - 3.5).abs() < 1e-14);
        assert!((dec.b_norm - 2f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn eigenvector_start_breaks_down_immediately() {
        let a: Mat<f64> = mat![[2.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 7.0]];
        let b: Mat<f64> = mat![[0.0], [3.0], [0.0]];
        let dec = lanczos_tridiagonal(&a, b.as_ref(), 3, DEFAULT_BETA_TOLERANCE, None).unwrap();
        assert!(dec.breakdown);
        assert_eq!(dec.steps_taken, 1);
        assert!((dec.alphas[0] - 5.0).abs() < 1e-14);
    }

    #[test]
    fn complex_hermitian_operator() {
        let a: Mat<c64> = mat![
            [c64::new(2.0, 0.0), c64::new(0.0, -1.0)],
            [c64::new(0.0, 1.0), c64::new(2.0, 0.0)],
        ];
        let b: Mat<c64> = mat![[c64::new(1.0, 0.0)], [c64::new(0.0, 0.0)]];
        let dec = lanczos_tridiagonal(&a, b.as_ref(), 2, DEFAULT_BETA_TOLERANCE, None).unwrap();
        // Eigenvalues 1 and 3: trace and determinant of T must match.
        let (a0, a1, b0) = (dec.alphas[0], dec.alphas[1], dec.betas[0]);
        assert!((a0 + a1 - 4.0).abs() < 1e-12);
        assert!((a0 * a1 - b0 * b0 - 3.0).abs() < 1e-12);
    }

    #[test]
    fn callback_can_stop_the_run() {
        let a: Mat<f64> = Mat::from_fn(10, 10, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
        let b: Mat<f64> = Mat::from_fn(10, 1, |_, _| 1.0);
        let mut calls = 0;
        let mut cb = |view: &TridiagonalSystemView<'_>| {
            calls += 1;
            assert_eq!(view.betas.len(), view.steps_taken - 1);
            view.steps_taken < 3
        };
        let dec = lanczos_tridiagonal(
            &a,
            b.as_ref(),
            10,
            DEFAULT_BETA_TOLERANCE,
            Some(&mut cb as &mut LanczosCallback<'_>),
        )
        .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(dec.steps_taken, 3);
        assert_eq!(dec.betas.len(), 2);
    }

    #[test]
    fn non_finite_operator_output_is_rejected() {
        let op = crate::matrix::FnOperator::new(3, |rhs: MatRef<'_, f64>| {
            Mat::from_fn(3, rhs.ncols(), |i, j| if i == 0 { f64::NAN } else { rhs[(i, j)] })
        });
        let b: Mat<f64> = mat![[1.0], [1.0], [1.0]];
        let err = lanczos_tridiagonal(&op, b.as_ref(), 3, DEFAULT_BETA_TOLERANCE, None)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InputError(_)));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let a: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let zero: Mat<f64> = Mat::zeros(2, 1);
        let err = lanczos_tridiagonal(&a, zero.as_ref(), 2, DEFAULT_BETA_TOLERANCE, None);
        assert!(matches!(
            err.unwrap_err().kind(),
            ErrorKind::InputError(_)
        ));

        let wrong: Mat<f64> = Mat::from_fn(3, 1, |_, _| 1.0);
        let err = lanczos_tridiagonal(&a, wrong.as_ref(), 2, DEFAULT_BETA_TOLERANCE, None);
        assert!(matches!(
            err.unwrap_err().kind(),
            ErrorKind::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }
}
