//! Gauss quadrature from a Lanczos tridiagonal matrix.
//!
//! If T_k = S Θ S^T is the eigendecomposition of the `k x k` tridiagonal matrix produced
//! from a starting vector `b`, then
//!
//! ```text
//! b^H f(A) b ≈ ‖b‖² e_1^T f(T_k) e_1 = Σ_i ‖b‖² (S_{0i})² f(θ_i)
//! ```
//!
//! which is the k-point Gauss rule for the spectral measure of `A` induced by `b`. The
//! rule integrates polynomials of degree up to `2k - 1` exactly, and is exact for every
//! `f` once the Krylov subspace is invariant.

use super::{LanczosDecomposition, TridiagonalSystemView};
use crate::error::{ErrorKind, SpectralError};
use faer::{Mat, Side};

/// Nodes θ_i and weights w_i of a Gauss quadrature rule, with `Σ w_i = ‖b‖²`.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussQuadrature {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussQuadrature {
    /// Builds the rule from a completed Lanczos run.
    pub fn from_decomposition(decomposition: &LanczosDecomposition) -> Result<Self, SpectralError> {
        Self::from_tridiagonal(
            &decomposition.alphas,
            &decomposition.betas,
            decomposition.b_norm,
        )
    }

    /// Builds the rule from the partial tridiagonal matrix seen by a Lanczos callback.
    pub fn from_view(view: &TridiagonalSystemView<'_>) -> Result<Self, SpectralError> {
        Self::from_tridiagonal(
            &view.alphas[..view.steps_taken],
            &view.betas[..view.steps_taken - 1],
            view.b_norm,
        )
    }

    /// Builds the rule from the coefficients of T_k and the norm of the starting vector.
    pub fn from_tridiagonal(
        alphas: &[f64],
        betas: &[f64],
        b_norm: f64,
    ) -> Result<Self, SpectralError> {
        let steps = alphas.len();
        if steps == 0 {
            return Err(ErrorKind::InputError(
                "cannot build a quadrature rule from zero Lanczos steps".to_string(),
            )
            .into());
        }
        if betas.len() + 1 != steps {
            return Err(ErrorKind::InputError(format!(
                "T_k needs {} off-diagonal coefficients, got {}",
                steps - 1,
                betas.len()
            ))
            .into());
        }

        let b_norm_sq = b_norm * b_norm;
        if steps == 1 {
            return Ok(Self {
                nodes: vec![alphas[0]],
                weights: vec![b_norm_sq],
            });
        }

        let t_k = assemble_tridiagonal(alphas, betas);
        let evd = t_k
            .as_ref()
            .self_adjoint_eigen(Side::Upper)
            .map_err(|e| SpectralError::from(ErrorKind::EvdError(e)))?;
        let s = evd.U();
        let theta = evd.S();

        let nodes = (0..steps).map(|i| theta[i]).collect();
        let weights = (0..steps)
            .map(|i| {
                let first = s[(0, i)];
                first * first * b_norm_sq
            })
            .collect();

        Ok(Self { nodes, weights })
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Σ w_i, which equals ‖b‖² up to rounding.
    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Largest node magnitude, an estimate of the spectral radius seen by this rule.
    pub fn spectral_scale(&self) -> f64 {
        self.nodes.iter().fold(0.0, |acc: f64, &t| acc.max(t.abs()))
    }

    /// Σ w_i f(θ_i), with `f` applied to the raw nodes.
    pub fn integrate(&self, f: impl Fn(f64) -> f64) -> f64 {
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(|(&theta, &w)| w * f(theta))
            .sum()
    }

    /// Iterates over `(θ_i, w_i)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.nodes.iter().copied().zip(self.weights.iter().copied())
    }
}

/// Assembles a dense `faer::Mat` from the Lanczos coefficients.
fn assemble_tridiagonal(alphas: &[f64], betas: &[f64]) -> Mat<f64> {
    let steps = alphas.len();
    let mut t_k = Mat::zeros(steps, steps);
    for (i, &alpha) in alphas.iter().enumerate() {
        t_k[(i, i)] = alpha;
    }
    for (i, &beta) in betas.iter().enumerate() {
        t_k[(i, i + 1)] = beta;
        t_k[(i + 1, i)] = beta;
    }
    t_k
}
