//! This module defines the core abstraction for linear operators.
//!
//! Stochastic Lanczos quadrature never looks at individual matrix elements: the only
//! thing it asks of an operator is its dimension and its action on vectors. Reduced
//! density matrices of many-body states are far too large to materialize, but their
//! action can be computed from the structure of the state (Kronecker products, partial
//! traces, sums of local terms). The [`LinearOperator`] trait formalizes that contract
//! so the same estimator runs on a 4x4 dense test matrix and on a lazily contracted
//! operator of dimension 2^30.
//!
//! Besides dense and sparse [`faer`] matrices, this module provides the small leaf
//! operators used to build composites: [`ScaledIdentity`], [`FnOperator`] for arbitrary
//! closures, and the [`PositiveSemidefinite`] wrapper that declares a spectral range.
//! The composite operators live in [`crate::operators`].

use crate::{
    error::{ErrorKind, SpectralError},
    scalar::Scalar,
};
use faer::{
    Par,
    dyn_stack::{MemBuffer, MemStack},
    matrix_free,
    prelude::*,
    sparse::SparseColMat,
    traits::ComplexField,
};
use std::{marker::PhantomData, sync::Arc};

/// Represents a square linear operator that can be applied to a block of vectors.
///
/// Implementations must be linear and consistent with [`LinearOperator::dim`] on every
/// call. `apply` must fail fast with [`ErrorKind::DimensionMismatch`] if the number of
/// rows of `rhs` differs from the declared dimension.
///
/// The `Send + Sync` bound lets the estimator share one read-only operator across all
/// worker tasks of a [`crate::pool::TaskPool`].
///
/// # Example
///
/// ```
/// use faer::{Mat, mat};
/// use lanczos_spectral::matrix::LinearOperator;
///
/// let a: Mat<f64> = mat![[2.0, -1.0], [-1.0, 2.0]];
/// let v: Mat<f64> = mat![[1.0], [1.0]];
/// let av = a.apply(v.as_ref()).unwrap();
/// assert_eq!(av, mat![[1.0], [1.0]]);
/// assert!(a.apply(Mat::<f64>::zeros(3, 1).as_ref()).is_err());
/// ```
pub trait LinearOperator<T: Scalar>: Send + Sync {
    /// Returns the dimension `d` of the Hilbert space the operator acts on.
    fn dim(&self) -> usize;

    /// Applies the operator to every column of `rhs`, returning an owned `d x m` matrix.
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError>;

    /// Whether the operator is declared Hermitian. Lanczos quadrature assumes it is.
    fn is_hermitian(&self) -> bool {
        true
    }

    /// Whether the operator is declared positive semidefinite. Quadrature nodes of a PSD
    /// operator are clamped to `[0, inf)` before the spectral function is applied.
    fn is_positive_semidefinite(&self) -> bool {
        false
    }

    /// Dimensions of the tensor factors of the underlying Hilbert space, if the operator
    /// is structured. Used to draw product random vectors.
    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        None
    }
}

/// Returns a [`ErrorKind::DimensionMismatch`] error unless `actual == expected`.
#[inline]
pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), SpectralError> {
    if expected != actual {
        return Err(ErrorKind::DimensionMismatch { expected, actual }.into());
    }
    Ok(())
}

/// Implementation of `LinearOperator` for `faer`'s immutable dense matrix view (`MatRef`).
impl<'a, T: Scalar> LinearOperator<T> for MatRef<'a, T> {
    #[inline]
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        if self.nrows() != self.ncols() {
            return Err(ErrorKind::InputError(format!(
                "a dense operator must be square, got {}x{}",
                self.nrows(),
                self.ncols()
            ))
            .into());
        }
        check_dimension(self.ncols(), rhs.nrows())?;
        Ok(self * rhs)
    }
}

/// Implementation of `LinearOperator` for `faer`'s mutable dense matrix view (`MatMut`).
/// This implementation delegates to the `MatRef` implementation via a reborrow.
impl<'a, T: Scalar> LinearOperator<T> for MatMut<'a, T> {
    #[inline]
    fn dim(&self) -> usize {
        self.rb().nrows()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        self.rb().apply(rhs)
    }
}

/// Implementation of `LinearOperator` for `faer`'s owned dense matrix (`Mat`).
impl<T: Scalar> LinearOperator<T> for Mat<T> {
    #[inline]
    fn dim(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        self.as_ref().apply(rhs)
    }
}

/// Implementation of `LinearOperator` for a square sparse matrix in compressed column
/// format, through `faer`'s own matrix-free product.
impl<T: Scalar> LinearOperator<T> for SparseColMat<usize, T> {
    #[inline]
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        if self.nrows() != self.ncols() {
            return Err(ErrorKind::InputError(format!(
                "a sparse operator must be square, got {}x{}",
                self.nrows(),
                self.ncols()
            ))
            .into());
        }
        check_dimension(self.ncols(), rhs.nrows())?;

        let a = self.as_ref();
        let mut out = Mat::<T>::zeros(self.nrows(), rhs.ncols());
        let mut mem = MemBuffer::new(matrix_free::LinOp::apply_scratch(&a, rhs.ncols(), Par::Seq));
        matrix_free::LinOp::apply(&a, out.as_mut(), rhs, Par::Seq, MemStack::new(&mut mem));
        Ok(out)
    }
}

// Forwarding implementations so that composites can own boxed or shared sub-operators
// and so that `&op` can be passed wherever an operator is expected.
impl<T: Scalar, O: LinearOperator<T> + ?Sized> LinearOperator<T> for &O {
    fn dim(&self) -> usize {
        (**self).dim()
    }
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        (**self).apply(rhs)
    }
    fn is_hermitian(&self) -> bool {
        (**self).is_hermitian()
    }
    fn is_positive_semidefinite(&self) -> bool {
        (**self).is_positive_semidefinite()
    }
    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        (**self).subsystem_dims()
    }
}

impl<T: Scalar, O: LinearOperator<T> + ?Sized> LinearOperator<T> for Box<O> {
    fn dim(&self) -> usize {
        (**self).dim()
    }
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        (**self).apply(rhs)
    }
    fn is_hermitian(&self) -> bool {
        (**self).is_hermitian()
    }
    fn is_positive_semidefinite(&self) -> bool {
        (**self).is_positive_semidefinite()
    }
    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        (**self).subsystem_dims()
    }
}

impl<T: Scalar, O: LinearOperator<T> + ?Sized> LinearOperator<T> for Arc<O> {
    fn dim(&self) -> usize {
        (**self).dim()
    }
    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        (**self).apply(rhs)
    }
    fn is_hermitian(&self) -> bool {
        (**self).is_hermitian()
    }
    fn is_positive_semidefinite(&self) -> bool {
        (**self).is_positive_semidefinite()
    }
    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        (**self).subsystem_dims()
    }
}

/// The operator `c * I` of dimension `d`, applied without storage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaledIdentity {
    dim: usize,
    scale: f64,
}

impl ScaledIdentity {
    pub fn new(dim: usize, scale: f64) -> Self {
        Self { dim, scale }
    }

    pub fn identity(dim: usize) -> Self {
        Self::new(dim, 1.0)
    }
}

impl<T: Scalar> LinearOperator<T> for ScaledIdentity {
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        check_dimension(self.dim, rhs.nrows())?;
        Ok(rhs * Scale(T::from_real_impl(&self.scale)))
    }

    fn is_positive_semidefinite(&self) -> bool {
        self.scale >= 0.0
    }
}

/// A black-box operator defined by a closure computing `A * rhs`.
///
/// The closure is trusted to be linear; its output shape is checked after every call.
pub struct FnOperator<T, F> {
    dim: usize,
    positive_semidefinite: bool,
    action: F,
    _scalar: PhantomData<fn() -> T>,
}

impl<T, F> FnOperator<T, F>
where
    T: Scalar,
    F: Fn(MatRef<'_, T>) -> Mat<T> + Send + Sync,
{
    pub fn new(dim: usize, action: F) -> Self {
        Self {
            dim,
            positive_semidefinite: false,
            action,
            _scalar: PhantomData,
        }
    }

    /// Declares the operator positive semidefinite.
    pub fn positive_semidefinite(mut self) -> Self {
        self.positive_semidefinite = true;
        self
    }
}

impl<T, F> LinearOperator<T> for FnOperator<T, F>
where
    T: Scalar,
    F: Fn(MatRef<'_, T>) -> Mat<T> + Send + Sync,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        check_dimension(self.dim, rhs.nrows())?;
        let out = (self.action)(rhs);
        check_dimension(self.dim, out.nrows())?;
        check_dimension(rhs.ncols(), out.ncols())?;
        Ok(out)
    }

    fn is_positive_semidefinite(&self) -> bool {
        self.positive_semidefinite
    }
}

/// Wraps an operator and declares it positive semidefinite, e.g. a density matrix
/// supplied as a plain dense matrix.
#[derive(Clone, Debug)]
pub struct PositiveSemidefinite<O>(pub O);

impl<T: Scalar, O: LinearOperator<T>> LinearOperator<T> for PositiveSemidefinite<O> {
    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        self.0.apply(rhs)
    }

    fn is_positive_semidefinite(&self) -> bool {
        true
    }

    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        self.0.subsystem_dims()
    }
}
