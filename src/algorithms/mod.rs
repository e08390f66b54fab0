//! Core algorithms: the Lanczos tridiagonalization and the Gauss quadrature rule it
//! induces.
//!
//! This module holds the data types shared by both stages. [`lanczos`] runs the
//! three-term recurrence and produces a [`LanczosDecomposition`], the scalar description
//! of the real symmetric tridiagonal matrix T_k. [`quadrature`] diagonalizes T_k and
//! turns it into the node/weight pairs of a [`quadrature::GaussQuadrature`].

pub mod lanczos;
pub mod quadrature;

pub use crate::error::SpectralError as LanczosError;

/// The output of one Lanczos iteration step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LanczosStep {
    /// Diagonal coefficient α_j = Re⟨v_j, A v_j⟩.
    pub alpha: f64,
    /// Off-diagonal coefficient β_{j+1} = ‖w_j‖ of the residual after orthogonalization.
    pub beta: f64,
}

/// The scalar output of a Lanczos run: the coefficients of T_k and the norm of the
/// starting vector.
///
/// `betas` always has `steps_taken - 1` entries, so `(alphas, betas)` defines a
/// `steps_taken x steps_taken` tridiagonal matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct LanczosDecomposition {
    pub alphas: Vec<f64>,
    pub betas: Vec<f64>,
    pub steps_taken: usize,
    /// ‖b‖ of the starting vector.
    pub b_norm: f64,
    /// Whether the recurrence stopped because the Krylov subspace became invariant.
    pub breakdown: bool,
}

/// A borrowed view of the tridiagonal matrix built so far, handed to callbacks.
#[derive(Clone, Copy, Debug)]
pub struct TridiagonalSystemView<'a> {
    pub alphas: &'a [f64],
    pub betas: &'a [f64],
    pub steps_taken: usize,
    pub b_norm: f64,
}

/// A callback invoked after every Lanczos step. Returning `false` stops the iteration
/// gracefully with the coefficients computed so far.
pub type LanczosCallback<'a> = dyn FnMut(&TridiagonalSystemView<'_>) -> bool + 'a;

/// Relative threshold below which β_{j+1} is treated as zero.
pub const DEFAULT_BETA_TOLERANCE: f64 = 1e-10;

/// Decides whether β signals an invariant Krylov subspace.
///
/// The test is relative to `scale`, a running estimate of ‖A‖ built from the
/// coefficients seen so far, so that it is invariant under rescaling of the operator.
/// A zero operator has `scale == 0` and breaks down immediately.
#[inline]
pub(crate) fn is_breakdown(beta: f64, scale: f64, beta_tol: f64) -> bool {
    beta <= beta_tol * scale
}
