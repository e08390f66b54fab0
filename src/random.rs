//! Random starting vectors for stochastic trace estimation.
//!
//! A Hutchinson-type estimator needs random vectors `v` with `E[v v^H] / E[|v|^2] = I / d`.
//! Two distributions are offered through [`RandomVectorKind`]: Gaussian entries (the
//! default, whose normalized vectors are uniformly distributed on the sphere) and
//! Rademacher-like unit-modulus entries (lower variance for diagonally dominant
//! operators). Vectors are always normalized to unit norm before they are returned.
//!
//! For operators acting on a tensor product space, [`RandomVectorGenerator::sample_product`]
//! draws one independent normalized vector per factor and returns their Kronecker
//! product, so each random draw only touches `sum(d_i)` numbers instead of `prod(d_i)`.
//!
//! The generator owns its state. There is no process-wide RNG: callers seed a generator
//! explicitly with [`RandomVectorGenerator::seed`], and parallel tasks receive their own
//! streams via [`RandomVectorGenerator::fork`], so concurrent estimations never race.

use crate::{
    error::{ErrorKind, SpectralError},
    scalar::Scalar,
};
use faer::{prelude::*, traits::ComplexField};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// The distribution of the entries of a random starting vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RandomVectorKind {
    /// i.i.d. unit-variance real or complex Gaussian entries.
    #[default]
    Gaussian,
    /// i.i.d. `±1` entries (real) or random quarter phases `{1, i, -1, -i}` (complex).
    Rademacher,
}

impl RandomVectorKind {
    /// Whether normalized vectors of this kind are rotation invariant. Only then does a
    /// random vector being an eigenvector imply, almost surely, that the operator is a
    /// multiple of the identity.
    pub fn is_continuous(self) -> bool {
        matches!(self, RandomVectorKind::Gaussian)
    }
}

/// A seedable source of normalized random vectors.
#[derive(Clone, Debug)]
pub struct RandomVectorGenerator {
    kind: RandomVectorKind,
    rng: StdRng,
}

impl RandomVectorGenerator {
    /// Creates a generator. Without a seed, the state is drawn from operating system
    /// entropy, which is the only implicit source of randomness in the crate.
    pub fn new(kind: RandomVectorKind, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { kind, rng }
    }

    /// Resets the generator state.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn kind(&self) -> RandomVectorKind {
        self.kind
    }

    /// Derives an independent generator for one sampling task.
    ///
    /// The child seed is drawn from this generator, so forking in a fixed order yields a
    /// fixed family of streams regardless of which worker later consumes them.
    pub fn fork(&mut self) -> Self {
        Self {
            kind: self.kind,
            rng: StdRng::seed_from_u64(self.rng.next_u64()),
        }
    }

    /// Draws a uniformly distributed index in `0..n`, for bootstrap resampling.
    pub(crate) fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }

    /// Draws a unit-norm random vector of dimension `dim`, as an `dim x 1` matrix.
    pub fn sample<T: Scalar>(&mut self, dim: usize) -> Result<Mat<T>, SpectralError> {
        if dim == 0 {
            return Err(ErrorKind::InputError(
                "cannot draw a random vector of dimension 0".to_string(),
            )
            .into());
        }
        let raw = Mat::from_fn(dim, 1, |_, _| self.entry::<T>());
        let norm = raw.norm_l2();
        // A Gaussian draw of exact zeros is impossible in practice, but keep the
        // normalization well defined regardless.
        if norm == 0.0 {
            return self.sample(dim);
        }
        Ok(&raw * Scale(T::from_real_impl(&norm.recip())))
    }

    /// Draws `v_1 ⊗ v_2 ⊗ ... ⊗ v_m` with each `v_i` an independent unit-norm random
    /// vector of dimension `dims[i]`. The result has unit norm and dimension `prod(dims)`.
    pub fn sample_product<T: Scalar>(&mut self, dims: &[usize]) -> Result<Mat<T>, SpectralError> {
        if dims.is_empty() {
            return Err(ErrorKind::InputError(
                "product vectors need at least one factor dimension".to_string(),
            )
            .into());
        }
        let mut product = self.sample::<T>(dims[0])?;
        for &d in &dims[1..] {
            let factor = self.sample::<T>(d)?;
            // Row-major Kronecker ordering: the first factor is the most significant index.
            product = Mat::from_fn(product.nrows() * d, 1, |i, _| {
                product[(i / d, 0)] * factor[(i % d, 0)]
            });
        }
        Ok(product)
    }

    fn entry<T: Scalar>(&mut self) -> T {
        match self.kind {
            RandomVectorKind::Gaussian => T::sample_gaussian(&mut self.rng),
            RandomVectorKind::Rademacher => T::sample_rademacher(&mut self.rng),
        }
    }
}
