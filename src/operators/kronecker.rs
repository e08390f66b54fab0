//! Lazy Kronecker products.

use super::strides;
use crate::{
    error::{ErrorKind, SpectralError},
    matrix::{LinearOperator, check_dimension},
    scalar::Scalar,
};
use faer::{MatMut, prelude::*};

/// The operator `A_1 ⊗ A_2 ⊗ ... ⊗ A_m`.
///
/// The product matrix is never formed. To apply it, each input column is viewed as a
/// tensor of shape `(d_1, ..., d_m)`, and every factor is contracted along its own axis.
/// For axis `k` the column splits into contiguous row-major `d_k x stride_k` blocks,
/// each viewed in place as a strided matrix and multiplied by `A_k`. The cost is
/// `Σ_k (d / d_k) · cost(A_k)` instead of `d²`.
pub struct Kronecker<T: Scalar> {
    factors: Vec<Box<dyn LinearOperator<T>>>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    dim: usize,
}

impl<T: Scalar> Kronecker<T> {
    pub fn new(factors: Vec<Box<dyn LinearOperator<T>>>) -> Result<Self, SpectralError> {
        if factors.is_empty() {
            return Err(ErrorKind::InputError(
                "a Kronecker product needs at least one factor".to_string(),
            )
            .into());
        }
        let dims: Vec<usize> = factors.iter().map(|f| f.dim()).collect();
        if dims.contains(&0) {
            return Err(ErrorKind::InputError(format!(
                "Kronecker factors must have positive dimension, got {dims:?}"
            ))
            .into());
        }
        let dim = dims.iter().product();
        Ok(Self {
            strides: strides(&dims),
            factors,
            dims,
            dim,
        })
    }

    pub fn factors(&self) -> &[Box<dyn LinearOperator<T>>] {
        &self.factors
    }

    /// Applies factor `k` along its tensor axis, in place.
    fn contract_axis(&self, k: usize, y: &mut [T]) -> Result<(), SpectralError> {
        let (d_k, stride) = (self.dims[k], self.strides[k]);
        for block in y.chunks_exact_mut(d_k * stride) {
            // Column-major `stride x d_k`, i.e. the row-major `d_k x stride` block transposed.
            let mut fibers = MatMut::from_column_major_slice_mut(block, stride, d_k);
            let contracted = self.factors[k].apply(fibers.rb().transpose())?;
            fibers.copy_from(contracted.transpose());
        }
        Ok(())
    }
}

impl<T: Scalar> LinearOperator<T> for Kronecker<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        check_dimension(self.dim, rhs.nrows())?;
        let mut out = rhs.to_owned();
        for c in 0..out.ncols() {
            let y = out.col_as_slice_mut(c);
            for k in 0..self.factors.len() {
                self.contract_axis(k, y)?;
            }
        }
        Ok(out)
    }

    fn is_hermitian(&self) -> bool {
        self.factors.iter().all(|f| f.is_hermitian())
    }

    fn is_positive_semidefinite(&self) -> bool {
        self.factors.iter().all(|f| f.is_positive_semidefinite())
    }

    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        Some(self.dims.clone())
    }
}
