//! Reduced operators obtained by tracing out subsystems.

use super::{check_subsystem_dims, subsystem_offsets};
use crate::{
    error::{ErrorKind, SpectralError},
    matrix::{LinearOperator, check_dimension},
    scalar::Scalar,
};
use faer::{prelude::*, traits::ComplexField};

/// Splits the axes `0..n` into the sorted kept axes and the traced remainder.
fn split_axes(n: usize, keep: &[usize]) -> Result<(Vec<usize>, Vec<usize>), SpectralError> {
    let mut kept = keep.to_vec();
    kept.sort_unstable();
    kept.dedup();
    if kept.len() != keep.len() || kept.iter().any(|&k| k >= n) {
        return Err(ErrorKind::InputError(format!(
            "kept subsystems {keep:?} must be distinct indices below {n}"
        ))
        .into());
    }
    if kept.is_empty() {
        return Err(ErrorKind::InputError(
            "at least one subsystem must be kept".to_string(),
        )
        .into());
    }
    let traced = (0..n).filter(|i| !kept.contains(i)).collect();
    Ok((kept, traced))
}

/// The reduced operator `Tr_B[A]` of an operator `A` on `H_1 ⊗ ... ⊗ H_m`.
///
/// With `K` the kept and `B` the traced subsystems,
/// `(Tr_B[A] v)_a = Σ_b (A (v ⊗ e_b))_{(a, b)}`, so one application costs `d_B`
/// applications of `A` and O(d) memory. This is the right tool when `A` itself is
/// structured (e.g. a [`super::Kronecker`] product or a sum of local terms).
pub struct PartialTrace<O> {
    inner: O,
    full_dim: usize,
    kept_dims: Vec<usize>,
    kept_offsets: Vec<usize>,
    traced_offsets: Vec<usize>,
}

impl<O> PartialTrace<O> {
    /// Traces out every subsystem of `dims` not listed in `keep`.
    pub fn new<T>(inner: O, dims: &[usize], keep: &[usize]) -> Result<Self, SpectralError>
    where
        T: Scalar,
        O: LinearOperator<T>,
    {
        check_subsystem_dims(dims, inner.dim())?;
        let (kept, traced) = split_axes(dims.len(), keep)?;
        Ok(Self {
            full_dim: inner.dim(),
            kept_dims: kept.iter().map(|&k| dims[k]).collect(),
            kept_offsets: subsystem_offsets(dims, &kept),
            traced_offsets: subsystem_offsets(dims, &traced),
            inner,
        })
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<T: Scalar, O: LinearOperator<T>> LinearOperator<T> for PartialTrace<O> {
    fn dim(&self) -> usize {
        self.kept_offsets.len()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        let d_kept = self.kept_offsets.len();
        check_dimension(d_kept, rhs.nrows())?;

        let zero = T::zero_impl();
        let mut out = Mat::<T>::zeros(d_kept, rhs.ncols());
        let mut lifted = Mat::<T>::zeros(self.full_dim, 1);
        for c in 0..rhs.ncols() {
            for &t in &self.traced_offsets {
                for (a, &k) in self.kept_offsets.iter().enumerate() {
                    lifted[(k + t, 0)] = rhs[(a, c)];
                }
                let image = self.inner.apply(lifted.as_ref())?;
                for (a, &k) in self.kept_offsets.iter().enumerate() {
                    out[(a, c)] = out[(a, c)] + image[(k + t, 0)];
                    lifted[(k + t, 0)] = zero;
                }
            }
        }
        Ok(out)
    }

    fn is_hermitian(&self) -> bool {
        self.inner.is_hermitian()
    }

    fn is_positive_semidefinite(&self) -> bool {
        self.inner.is_positive_semidefinite()
    }

    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        Some(self.kept_dims.clone())
    }
}

/// The reduced density matrix `ρ_K = Tr_B |ψ⟩⟨ψ|` of a pure state.
///
/// The state is reshaped once into the `d_K x d_B` matrix `Ψ` (same storage as `ψ`), and
/// `ρ_K v = Ψ (Ψ^H v)` is applied with two thin matrix products. `ρ_K` itself, which can
/// be far larger than `ψ` when `d_K > d_B`, is never formed.
#[derive(Clone, Debug)]
pub struct ReducedPureState<T: Scalar> {
    psi: Mat<T>,
    kept_dims: Vec<usize>,
}

impl<T: Scalar> ReducedPureState<T> {
    /// Builds `Tr_B |ψ⟩⟨ψ|` for a state vector `psi` (a `d x 1` matrix) on subsystems of
    /// dimensions `dims`, keeping the subsystems listed in `keep`.
    pub fn new(psi: MatRef<'_, T>, dims: &[usize], keep: &[usize]) -> Result<Self, SpectralError> {
        if psi.ncols() != 1 {
            return Err(ErrorKind::InputError(format!(
                "a pure state must be a single column, got {} columns",
                psi.ncols()
            ))
            .into());
        }
        check_subsystem_dims(dims, psi.nrows())?;
        let (kept, traced) = split_axes(dims.len(), keep)?;
        let kept_offsets = subsystem_offsets(dims, &kept);
        let traced_offsets = subsystem_offsets(dims, &traced);

        let reshaped = Mat::from_fn(kept_offsets.len(), traced_offsets.len(), |a, b| {
            psi[(kept_offsets[a] + traced_offsets[b], 0)]
        });
        Ok(Self {
            psi: reshaped,
            kept_dims: kept.iter().map(|&k| dims[k]).collect(),
        })
    }
}

impl<T: Scalar> LinearOperator<T> for ReducedPureState<T> {
    fn dim(&self) -> usize {
        self.psi.nrows()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        check_dimension(self.psi.nrows(), rhs.nrows())?;
        let projected = self.psi.as_ref().adjoint() * rhs;
        Ok(self.psi.as_ref() * projected.as_ref())
    }

    fn is_positive_semidefinite(&self) -> bool {
        true
    }

    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        Some(self.kept_dims.clone())
    }
}
