//! Stochastic Lanczos quadrature for spectral functionals of large Hermitian operators.
//!
//! This crate estimates `tr f(A) = Σ f(λ_i)` for a Hermitian (often positive
//! semidefinite) operator `A` that is only available through its action on vectors,
//! e.g. the reduced density matrix of a many-body quantum state. Typical functionals are
//! `ln det A` (`f = ln`), the trace norm (`f = |x|`) and the von Neumann entropy
//! (`f = -x ln x`).
//!
//! ## Method
//!
//! For a random vector `v` with `E[v v^H] = I / d`, `d · ⟨v|f(A)|v⟩` is an unbiased
//! estimate of `tr f(A)` (Hutchinson). The bilinear form is approximated by Gauss
//! quadrature: `k` Lanczos steps from `v` build a tridiagonal `T_k`, whose eigenpairs
//! `(θ_i, s_i)` give nodes `θ_i` and weights `w_i = s_i[0]² ‖v‖²`, so that
//! `⟨v|f(A)|v⟩ ≈ Σ w_i f(θ_i)`. Samples are averaged until the standard error of the
//! mean meets the tolerance.
//!
//! - **Operators** ([`matrix`], [`operators`]): the [`LinearOperator`] capability, with
//!   implementations for dense and sparse [`faer`] matrices and lazy composites such as
//!   [`Kronecker`] products and partial traces.
//! - **Random vectors** ([`random`]): seedable Gaussian or Rademacher generators.
//! - **Lanczos quadrature** ([`algorithms`]): the three-term recurrence with local
//!   re-orthogonalization and early breakdown, and the quadrature rule of `T_k`.
//! - **Estimation** ([`estimator`], [`solvers`]): running statistics, the stopping rule,
//!   bootstrap confidence intervals, and the batched dispatcher over a [`TaskPool`].
//!
//! ## Example Usage
//!
//! ```rust
//! use faer::Mat;
//! use lanczos_spectral::{ApproxSpectralOptions, SpectralFunction, approx_spectral_function};
//!
//! // A 4x4 identity: one Lanczos step on one vector already gives the exact trace.
//! let a = Mat::<f64>::identity(4, 4);
//! let options = ApproxSpectralOptions::default()
//!     .with_lanczos_order(1)
//!     .with_max_samples(1)
//!     .with_seed(42);
//!
//! let result = approx_spectral_function(&a, &SpectralFunction::Identity, &options).unwrap();
//! assert!((result.estimate - 4.0).abs() < 1e-8);
//! assert!(result.converged);
//! ```

pub mod algorithms;
pub mod config;
pub mod error;
pub mod estimator;
pub mod functions;
pub mod matrix;
pub mod operators;
pub mod pool;
pub mod random;
pub mod scalar;
pub mod solvers;

pub use config::ApproxSpectralOptions;
pub use error::{ErrorKind, SpectralError};
pub use estimator::{ConfidenceInterval, SpectralEstimate};
pub use functions::{Domain, SpectralFunction};
pub use matrix::{FnOperator, LinearOperator, PositiveSemidefinite, ScaledIdentity};
pub use operators::{Kronecker, OperatorSum, PartialTrace, ReducedPureState};
pub use pool::{RayonPool, SequentialPool, TaskHandle, TaskPool};
pub use random::{RandomVectorGenerator, RandomVectorKind};
pub use scalar::Scalar;
pub use solvers::{
    approx_spectral_function, approx_spectral_function_with_pool, sample_trace, tr_abs_approx,
    tr_exp_approx, tr_log_approx, tr_sqrt_approx, tr_xlogx_approx,
};
