//! Structured operators that are applied without ever being materialized.
//!
//! - [`Kronecker`]: `A_1 ⊗ A_2 ⊗ ... ⊗ A_m`, applied by contracting each factor along
//!   its own tensor axis.
//! - [`PartialTrace`]: `Tr_B[A]` for any operator `A` on a tensor product space,
//!   applied through `A` itself.
//! - [`ReducedPureState`]: `Tr_B |ψ⟩⟨ψ|` applied as `Ψ (Ψ^H v)`, where `Ψ` is the
//!   state reshaped into a `d_kept x d_traced` matrix.
//! - [`OperatorSum`]: `Σ_i A_i`, e.g. a Hamiltonian given as a sum of local terms.
//!
//! Subsystems follow the usual Kronecker convention: in `A ⊗ B` the first factor is the
//! most significant index, so basis state `(i, j)` sits at position `i * d_B + j`.

pub mod kronecker;
pub mod partial_trace;
pub mod sum;

pub use kronecker::Kronecker;
pub use partial_trace::{PartialTrace, ReducedPureState};
pub use sum::OperatorSum;

use crate::error::{ErrorKind, SpectralError};

/// Row-major strides of a tensor with axis lengths `dims`.
pub(crate) fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Flat offsets of all multi-indices over the axes in `subset`, in row-major order of
/// `subset`, with every other axis fixed at zero.
pub(crate) fn subsystem_offsets(dims: &[usize], subset: &[usize]) -> Vec<usize> {
    let strides = strides(dims);
    let mut offsets = vec![0];
    for &axis in subset {
        let (len, stride) = (dims[axis], strides[axis]);
        offsets = offsets
            .iter()
            .flat_map(|&o| (0..len).map(move |j| o + j * stride))
            .collect();
    }
    offsets
}

/// Checks that `dims` describes a non-trivial tensor product space of dimension `total`.
pub(crate) fn check_subsystem_dims(dims: &[usize], total: usize) -> Result<(), SpectralError> {
    if dims.is_empty() || dims.contains(&0) {
        return Err(ErrorKind::InputError(format!(
            "subsystem dimensions must be non-empty and positive, got {dims:?}"
        ))
        .into());
    }
    let product: usize = dims.iter().product();
    if product != total {
        return Err(ErrorKind::DimensionMismatch {
            expected: total,
            actual: product,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_row_major() {
        assert_eq!(strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(strides(&[5]), vec![1]);
    }

    #[test]
    fn offsets_enumerate_the_subset() {
        // dims (2, 3, 2): keep axes 0 and 2.
        assert_eq!(subsystem_offsets(&[2, 3, 2], &[0, 2]), vec![0, 1, 6, 7]);
        assert_eq!(subsystem_offsets(&[2, 3, 2], &[1]), vec![0, 2, 4]);
        assert_eq!(subsystem_offsets(&[2, 3, 2], &[]), vec![0]);
    }

    #[test]
    fn subsystem_dims_must_multiply_to_total() {
        assert!(check_subsystem_dims(&[2, 2], 4).is_ok());
        assert!(check_subsystem_dims(&[2, 3], 4).is_err());
        assert!(check_subsystem_dims(&[], 1).is_err());
    }
}
