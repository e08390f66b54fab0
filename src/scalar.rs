//! Scalar types over which operators and Krylov vectors are defined.
//!
//! Density matrices of quantum states live on complex Hilbert spaces, while many test
//! problems (and real symmetric operators in general) only need `f64`. Arithmetic,
//! conjugation and norms come from [`faer`]'s `ComplexField`; the [`Scalar`] trait only
//! adds the entry distributions of the random vector generator, and is implemented for
//! [`f64`] and [`faer::c64`].
//!
//! The spectrum of a Hermitian operator is real in both cases, so every quantity the
//! estimator aggregates (α, β, quadrature nodes and weights) is an `f64`.

use core::fmt::Debug;
use core::ops::{Add, Mul, Sub};
use faer::{c64, traits::ComplexField};
use rand::Rng;
use rand_distr::StandardNormal;

/// A field element usable as the entry type of operators and vectors.
pub trait Scalar:
    ComplexField<Real = f64>
    + Copy
    + Send
    + Sync
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + 'static
{
    /// Draws a unit-variance Gaussian entry: `N(0, 1)` for reals, `(N + iN)/sqrt(2)` for
    /// complex numbers.
    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Draws a unit-modulus Rademacher-like entry: `±1` for reals, a uniformly random
    /// element of `{1, i, -1, -i}` for complex numbers.
    fn sample_rademacher<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl Scalar for f64 {
    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }

    fn sample_rademacher<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) { 1.0 } else { -1.0 }
    }
}

impl Scalar for c64 {
    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        c64::new(re, im) * core::f64::consts::FRAC_1_SQRT_2
    }

    fn sample_rademacher<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.random_range(0..4u8) {
            0 => c64::new(1.0, 0.0),
            1 => c64::new(0.0, 1.0),
            2 => c64::new(-1.0, 0.0),
            _ => c64::new(0.0, -1.0),
        }
    }
}
