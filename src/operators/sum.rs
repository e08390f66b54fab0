//! Sums of operators.

use crate::{
    error::{ErrorKind, SpectralError},
    matrix::{LinearOperator, check_dimension},
    scalar::Scalar,
};
use faer::{Mat, MatRef};

/// The operator `Σ_i A_i`, typically a Hamiltonian given as a sum of local terms
/// embedded with [`super::Kronecker`] identity padding.
pub struct OperatorSum<T: Scalar> {
    terms: Vec<Box<dyn LinearOperator<T>>>,
    dim: usize,
}

impl<T: Scalar> OperatorSum<T> {
    pub fn new(terms: Vec<Box<dyn LinearOperator<T>>>) -> Result<Self, SpectralError> {
        let Some(first) = terms.first() else {
            return Err(ErrorKind::InputError(
                "an operator sum needs at least one term".to_string(),
            )
            .into());
        };
        let dim = first.dim();
        for term in &terms {
            check_dimension(dim, term.dim())?;
        }
        Ok(Self { terms, dim })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<T: Scalar> LinearOperator<T> for OperatorSum<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Result<Mat<T>, SpectralError> {
        check_dimension(self.dim, rhs.nrows())?;
        let mut total = self.terms[0].apply(rhs)?;
        for term in &self.terms[1..] {
            let image = term.apply(rhs)?;
            total = &total + &image;
        }
        Ok(total)
    }

    fn is_hermitian(&self) -> bool {
        self.terms.iter().all(|t| t.is_hermitian())
    }

    fn is_positive_semidefinite(&self) -> bool {
        self.terms.iter().all(|t| t.is_positive_semidefinite())
    }

    fn subsystem_dims(&self) -> Option<Vec<usize>> {
        let dims = self.terms[0].subsystem_dims()?;
        self.terms[1..]
            .iter()
            .all(|t| t.subsystem_dims().as_ref() == Some(&dims))
            .then_some(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{matrix::ScaledIdentity, operators::Kronecker};
    use faer::mat;

    #[test]
    fn sum_of_local_terms() {
        // Z ⊗ I + I ⊗ Z on two qubits is diag(2, 0, 0, -2).
        let z: Mat<f64> = mat![[1.0, 0.0], [0.0, -1.0]];
        let local = |first: bool| -> Box<dyn LinearOperator<f64>> {
            let factors: Vec<Box<dyn LinearOperator<f64>>> = if first {
                vec![Box::new(z.clone()), Box::new(ScaledIdentity::identity(2))]
            } else {
                vec![Box::new(ScaledIdentity::identity(2)), Box::new(z.clone())]
            };
            Box::new(Kronecker::new(factors).unwrap())
        };
        let h = OperatorSum::new(vec![local(true), local(false)]).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.subsystem_dims(), Some(vec![2, 2]));
        assert!(!h.is_positive_semidefinite());

        let v: Mat<f64> = mat![[1.0], [1.0], [1.0], [1.0]];
        assert_eq!(h.apply(v.as_ref()).unwrap(), mat![[2.0], [0.0], [0.0], [-2.0]]);
    }

    #[test]
    fn terms_must_share_a_dimension() {
        let terms: Vec<Box<dyn LinearOperator<f64>>> = vec![
            Box::new(ScaledIdentity::identity(2)),
            Box::new(ScaledIdentity::identity(3)),
        ];
        assert!(OperatorSum::new(terms).is_err());
        assert!(OperatorSum::<f64>::new(vec![]).is_err());
    }
}
