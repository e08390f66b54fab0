//! Spectral functions and the clamp-before-apply rule.
//!
//! A [`SpectralFunction`] is a scalar function `f` whose trace `tr f(A) = Σ f(λ_i)` is
//! the quantity being estimated. The common cases are named variants; anything else is
//! a [`SpectralFunction::Custom`] closure together with the [`Domain`] on which it is
//! defined.
//!
//! Quadrature nodes are Ritz values, so they carry rounding noise: a PSD operator can
//! produce a node at `-1e-17`, and a tiny positive eigenvalue can come out as exactly
//! zero. Before `f` is applied every node is therefore
//!
//! 1. clamped into the operator's declared [`SpectralRange`] (`[0, inf)` for PSD
//!    operators),
//! 2. checked against the function's [`Domain`], with a tolerance of `sqrt(eps)` times
//!    the spectral scale of the rule; a node further outside is an
//!    [`ErrorKind::UndefinedFunctionValue`],
//! 3. clamped into the domain, and lifted to `eps` times the spectral scale if the
//!    domain excludes zero, so that `log` of a numerically vanishing node is finite.

use crate::{
    algorithms::quadrature::GaussQuadrature,
    error::{ErrorKind, SpectralError},
    matrix::LinearOperator,
    scalar::Scalar,
};
use std::{fmt, sync::Arc};

/// The set on which a spectral function is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    /// All real numbers.
    Real,
    /// `[0, inf)`.
    NonNegative,
    /// `(0, inf)`.
    Positive,
}

impl Domain {
    fn lower_bound(self) -> f64 {
        match self {
            Domain::Real => f64::NEG_INFINITY,
            Domain::NonNegative | Domain::Positive => 0.0,
        }
    }
}

/// The interval the operator's spectrum is declared to lie in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralRange {
    pub lower: f64,
}

impl SpectralRange {
    /// The whole real line, for a general Hermitian operator.
    pub const HERMITIAN: Self = Self {
        lower: f64::NEG_INFINITY,
    };
    /// `[0, inf)`, for a positive semidefinite operator.
    pub const POSITIVE_SEMIDEFINITE: Self = Self { lower: 0.0 };

    /// The range declared by an operator's flags.
    pub fn of<T: Scalar, O: LinearOperator<T> + ?Sized>(operator: &O) -> Self {
        if operator.is_positive_semidefinite() {
            Self::POSITIVE_SEMIDEFINITE
        } else {
            Self::HERMITIAN
        }
    }
}

/// Relative slack, in units of the spectral scale, within which a node outside the
/// function's domain is treated as rounding noise.
const NODE_SLACK: f64 = 1.4901161193847656e-8;

/// A scalar function applied to the eigenvalues of an operator.
#[derive(Clone)]
pub enum SpectralFunction {
    /// `f(x) = x`.
    Identity,
    /// `f(x) = |x|`, whose trace is the trace norm.
    Abs,
    /// `f(x) = ln x`, whose trace is `ln det A`.
    Log,
    /// `f(x) = sqrt(x)`.
    Sqrt,
    /// `f(x) = x ln x` with `f(0) = 0`; `-tr f(ρ)` is the von Neumann entropy.
    XLogX,
    /// `f(x) = exp(x)`.
    Exp,
    /// A caller supplied function and the domain on which it is defined.
    Custom {
        name: String,
        function: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
        domain: Domain,
    },
}

impl SpectralFunction {
    /// Wraps an arbitrary function.
    pub fn custom(
        name: impl Into<String>,
        domain: Domain,
        function: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        SpectralFunction::Custom {
            name: name.into(),
            function: Arc::new(function),
            domain,
        }
    }

    /// Looks up a named function: `identity`, `abs`, `log`, `sqrt`, `xlogx` or `exp`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "identity" | "id" => Some(SpectralFunction::Identity),
            "abs" => Some(SpectralFunction::Abs),
            "log" | "ln" => Some(SpectralFunction::Log),
            "sqrt" => Some(SpectralFunction::Sqrt),
            "xlogx" => Some(SpectralFunction::XLogX),
            "exp" => Some(SpectralFunction::Exp),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SpectralFunction::Identity => "identity",
            SpectralFunction::Abs => "abs",
            SpectralFunction::Log => "log",
            SpectralFunction::Sqrt => "sqrt",
            SpectralFunction::XLogX => "xlogx",
            SpectralFunction::Exp => "exp",
            SpectralFunction::Custom { name, .. } => name,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            SpectralFunction::Identity | SpectralFunction::Abs | SpectralFunction::Exp => {
                Domain::Real
            }
            SpectralFunction::Sqrt | SpectralFunction::XLogX => Domain::NonNegative,
            SpectralFunction::Log => Domain::Positive,
            SpectralFunction::Custom { domain, .. } => *domain,
        }
    }

    /// Evaluates `f(x)` without any clamping.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            SpectralFunction::Identity => x,
            SpectralFunction::Abs => x.abs(),
            SpectralFunction::Log => x.ln(),
            SpectralFunction::Sqrt => x.sqrt(),
            SpectralFunction::XLogX => {
                if x == 0.0 {
                    0.0
                } else {
                    x * x.ln()
                }
            }
            SpectralFunction::Exp => x.exp(),
            SpectralFunction::Custom { function, .. } => function(x),
        }
    }

    /// Moves a quadrature node into `range` and into the function's domain.
    ///
    /// `scale` is the spectral scale of the rule the node belongs to.
    pub fn clamp_node(
        &self,
        theta: f64,
        range: SpectralRange,
        scale: f64,
    ) -> Result<f64, SpectralError> {
        if !theta.is_finite() {
            return Err(ErrorKind::UndefinedFunctionValue {
                function: self.name().to_string(),
                node: theta,
            }
            .into());
        }
        let mut node = theta.max(range.lower);

        let domain = self.domain();
        let lower = domain.lower_bound();
        if node < lower - NODE_SLACK * scale {
            return Err(ErrorKind::UndefinedFunctionValue {
                function: self.name().to_string(),
                node: theta,
            }
            .into());
        }
        node = node.max(lower);

        if domain == Domain::Positive {
            let floor = f64::EPSILON * scale.max(f64::MIN_POSITIVE);
            node = node.max(floor);
        }
        Ok(node)
    }

    /// Computes `Σ w_i f(clamp(θ_i))` for a quadrature rule.
    ///
    /// Fails with [`ErrorKind::UndefinedFunctionValue`] rather than returning a
    /// non-finite value, including when a node or weight of the rule is itself NaN or
    /// infinite.
    pub fn evaluate(
        &self,
        rule: &GaussQuadrature,
        range: SpectralRange,
    ) -> Result<f64, SpectralError> {
        let scale = rule.spectral_scale();
        let mut total = 0.0;
        for (theta, weight) in rule.iter() {
            let node = self.clamp_node(theta, range, scale)?;
            let value = self.apply(node);
            if !value.is_finite() || !weight.is_finite() {
                return Err(ErrorKind::UndefinedFunctionValue {
                    function: self.name().to_string(),
                    node,
                }
                .into());
            }
            total += weight * value;
        }
        Ok(total)
    }
}

impl fmt::Debug for SpectralFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralFunction::Custom { name, domain, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("domain", domain)
                .finish_non_exhaustive(),
            named => f.write_str(named.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(nodes: &[f64], weights: &[f64]) -> GaussQuadrature {
        // A diagonal T_k has its eigenvalues on the diagonal and weights given by the
        // first eigenvector components, which are all zero except for one node. Build
        // general rules through a 2x2 tridiagonal instead.
        assert_eq!(nodes.len(), weights.len());
        let total: f64 = weights.iter().sum();
        let (l1, l2) = (nodes[0], nodes[1]);
        let (w1, w2) = (weights[0] / total, weights[1] / total);
        // T = Q diag(l1, l2) Q^T with Q's first row (sqrt(w1), sqrt(w2)).
        let (c, s) = (w1.sqrt(), w2.sqrt());
        let alpha0 = c * c * l1 + s * s * l2;
        let alpha1 = s * s * l1 + c * c * l2;
        let beta = (c * s * (l1 - l2)).abs();
        GaussQuadrature::from_tridiagonal(&[alpha0, alpha1], &[beta], total.sqrt()).unwrap()
    }

    #[test]
    fn named_functions_round_trip_names() {
        for name in ["identity", "abs", "log", "sqrt", "xlogx", "exp"] {
            let f = SpectralFunction::from_name(name).unwrap();
            assert_eq!(f.name(), name);
        }
        assert!(SpectralFunction::from_name("tanh").is_none());
    }

    #[test]
    fn xlogx_is_continuous_at_zero() {
        assert_eq!(SpectralFunction::XLogX.apply(0.0), 0.0);
        assert!((SpectralFunction::XLogX.apply(0.5) - 0.5 * 0.5f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn psd_noise_is_clamped_to_zero() {
        let f = SpectralFunction::Sqrt;
        let node = f
            .clamp_node(-1e-17, SpectralRange::POSITIVE_SEMIDEFINITE, 1.0)
            .unwrap();
        assert_eq!(node, 0.0);
        // Without the PSD declaration the node is still within rounding slack.
        let node = f.clamp_node(-1e-17, SpectralRange::HERMITIAN, 1.0).unwrap();
        assert_eq!(node, 0.0);
    }

    #[test]
    fn log_of_a_vanishing_node_is_finite() {
        let f = SpectralFunction::Log;
        let node = f
            .clamp_node(0.0, SpectralRange::POSITIVE_SEMIDEFINITE, 2.0)
            .unwrap();
        assert_eq!(node, 2.0 * f64::EPSILON);
        assert!(f.apply(node).is_finite());
        // Genuine tiny eigenvalues above the floor are left untouched.
        let node = f
            .clamp_node(1e-12, SpectralRange::POSITIVE_SEMIDEFINITE, 1.0)
            .unwrap();
        assert_eq!(node, 1e-12);
    }

    #[test]
    fn nodes_far_outside_the_domain_are_errors() {
        let f = SpectralFunction::Log;
        let err = f.clamp_node(-0.5, SpectralRange::HERMITIAN, 1.0).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UndefinedFunctionValue {
                function: "log".to_string(),
                node: -0.5
            }
        );
        assert!(
            SpectralFunction::Abs
                .clamp_node(-0.5, SpectralRange::HERMITIAN, 1.0)
                .is_ok()
        );
    }

    #[test]
    fn non_finite_rules_are_errors() {
        let nan_node = GaussQuadrature::from_tridiagonal(&[f64::NAN], &[], 1.0).unwrap();
        let nan_weight = GaussQuadrature::from_tridiagonal(&[0.5], &[], f64::NAN).unwrap();
        for f in [
            SpectralFunction::Identity,
            SpectralFunction::Log,
            SpectralFunction::Sqrt,
            SpectralFunction::XLogX,
        ] {
            for rule in [&nan_node, &nan_weight] {
                let err = f
                    .evaluate(rule, SpectralRange::POSITIVE_SEMIDEFINITE)
                    .unwrap_err();
                assert!(
                    matches!(err.kind(), ErrorKind::UndefinedFunctionValue { .. }),
                    "{} accepted a non-finite rule",
                    f.name()
                );
            }
        }
    }

    #[test]
    fn evaluate_matches_direct_sum() {
        let q = rule(&[1.0, 4.0], &[0.25, 0.75]);
        let value = SpectralFunction::Sqrt
            .evaluate(&q, SpectralRange::POSITIVE_SEMIDEFINITE)
            .unwrap();
        assert!((value - (0.25 * 1.0 + 0.75 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn custom_functions_report_non_finite_values() {
        let f = SpectralFunction::custom("gap", Domain::Real, |x| {
            if x < 0.5 { f64::NAN } else { x }
        });
        let q = rule(&[0.0, 1.0], &[0.5, 0.5]);
        assert!(f.evaluate(&q, SpectralRange::HERMITIAN).is_err());
        assert_eq!(format!("{f:?}"), "Custom { name: \"gap\", domain: Real, .. }");
    }
}
