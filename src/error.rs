//! This module defines the custom error types for the library.
//!
//! All failure conditions of the estimation pipeline are centralized into a single
//! enum, [`ErrorKind`], wrapped by the public [`SpectralError`] type.
//!
//! Two conditions that a reader might expect here are deliberately absent:
//! a Lanczos breakdown (the Krylov subspace became invariant) is a normal, shorter
//! termination of the recurrence, and running out of samples before the tolerance is
//! met is reported through [`crate::SpectralEstimate::converged`]. Neither aborts a call.
//!
//! Note that [`faer::linalg::evd::EvdError`] does not implement the standard
//! [`std::error::Error`] trait, so we wrap it manually.
use thiserror::Error;

/// Represents all possible errors that can occur while estimating a spectral function.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SpectralError(#[from] ErrorKind);

impl SpectralError {
    /// Returns the kind of failure, so callers can branch on it.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Whether the error is structural, i.e. caused by inconsistent shapes rather than
    /// by the numerics of a single sample.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.0,
            ErrorKind::DimensionMismatch { .. } | ErrorKind::InputError(_)
        )
    }
}

/// The distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The operator and the vector it was applied to have incompatible dimensions.
    #[error("Dimension mismatch: operator has dimension {expected} but vector has {actual} rows.")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An invalid input parameter, operator or vector was provided.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during the eigendecomposition of T_k: {0:?}")]
    EvdError(faer::linalg::evd::EvdError),

    /// The spectral function is undefined at a quadrature node that lies outside the
    /// tolerated neighbourhood of the operator's valid spectral range.
    #[error("Function `{function}` is undefined at quadrature node {node:e}.")]
    UndefinedFunctionValue { function: String, node: f64 },

    /// The worker pool could not be constructed.
    #[error("Worker pool error: {0}")]
    PoolError(String),
}

// Manually implement PartialEq for the public error type.
// We compare the inner `ErrorKind`.
impl PartialEq for SpectralError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// Unit tests to ensure error messages are formatted correctly.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_error_message() {
        let error = SpectralError(ErrorKind::DimensionMismatch {
            expected: 100,
            actual: 99,
        });
        let expected_message =
            "Dimension mismatch: operator has dimension 100 but vector has 99 rows.";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_structural());
    }

    #[test]
    fn test_input_error_message() {
        let error = SpectralError(ErrorKind::InputError(
            "The starting vector must not be a zero vector.".to_string(),
        ));
        let expected_message =
            "Invalid input parameter: The starting vector must not be a zero vector.";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_evd_error_message() {
        let evd_error = faer::linalg::evd::EvdError::NoConvergence;
        let error = SpectralError(ErrorKind::EvdError(evd_error));
        let expected_message =
            "A numerical error occurred during the eigendecomposition of T_k: NoConvergence";
        assert_eq!(error.to_string(), expected_message);
        assert!(!error.is_structural());
    }

    #[test]
    fn test_undefined_function_value_message() {
        let error = SpectralError(ErrorKind::UndefinedFunctionValue {
            function: "log".to_string(),
            node: -0.5,
        });
        assert_eq!(
            error.to_string(),
            "Function `log` is undefined at quadrature node -5e-1."
        );
        assert_eq!(
            error.kind(),
            &ErrorKind::UndefinedFunctionValue {
                function: "log".to_string(),
                node: -0.5
            }
        );
    }
}
