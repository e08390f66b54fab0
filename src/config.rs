//! Options of a trace estimation.

use crate::{
    algorithms::DEFAULT_BETA_TOLERANCE,
    error::{ErrorKind, SpectralError},
    estimator::StoppingRule,
    random::RandomVectorKind,
};
use serde::{Deserialize, Serialize};

/// Every knob of [`crate::approx_spectral_function`], with documented defaults.
///
/// ```
/// use lanczos_spectral::{ApproxSpectralOptions, RandomVectorKind};
///
/// let options = ApproxSpectralOptions::default()
///     .with_tolerance(1e-3)
///     .with_lanczos_order(40)
///     .with_generator_kind(RandomVectorKind::Rademacher)
///     .with_seed(7);
/// assert!(options.validate().is_ok());
/// assert_eq!(options.max_samples, 1024);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproxSpectralOptions {
    /// Relative tolerance on the standard error of the mean.
    pub tolerance: f64,
    /// Absolute floor of the tolerance: the threshold is
    /// `tolerance · max(|mean|, tol_scale)`.
    pub tol_scale: f64,
    /// Samples required before the standard error is trusted.
    pub min_samples: usize,
    /// Sample budget.
    pub max_samples: usize,
    /// Optional budget on the total number of Lanczos steps over all samples.
    pub max_lanczos_steps: Option<usize>,
    /// Krylov order per sample, capped at the operator dimension.
    pub lanczos_order: usize,
    /// Stop a single Lanczos run early once successive quadrature estimates agree to
    /// this relative tolerance.
    pub lanczos_tol: Option<f64>,
    /// Relative breakdown threshold on β.
    pub beta_tol: f64,
    pub generator_kind: RandomVectorKind,
    /// Draw Kronecker product vectors over the operator's subsystems.
    pub product_vectors: bool,
    /// `None` seeds from operating system entropy.
    pub seed: Option<u64>,
    /// Compute a percentile bootstrap confidence interval.
    pub bootstrap: bool,
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
    /// Samples per batch; `None` means one per pool worker.
    pub batch_size: Option<usize>,
}

impl Default for ApproxSpectralOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            tol_scale: 1.0,
            min_samples: 3,
            max_samples: 1024,
            max_lanczos_steps: None,
            lanczos_order: 128,
            lanczos_tol: None,
            beta_tol: DEFAULT_BETA_TOLERANCE,
            generator_kind: RandomVectorKind::Gaussian,
            product_vectors: false,
            seed: None,
            bootstrap: false,
            bootstrap_resamples: 1000,
            confidence_level: 0.95,
            batch_size: None,
        }
    }
}

impl ApproxSpectralOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_tol_scale(mut self, tol_scale: f64) -> Self {
        self.tol_scale = tol_scale;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_max_lanczos_steps(mut self, budget: usize) -> Self {
        self.max_lanczos_steps = Some(budget);
        self
    }

    pub fn with_lanczos_order(mut self, order: usize) -> Self {
        self.lanczos_order = order;
        self
    }

    pub fn with_lanczos_tol(mut self, tol: f64) -> Self {
        self.lanczos_tol = Some(tol);
        self
    }

    pub fn with_beta_tol(mut self, beta_tol: f64) -> Self {
        self.beta_tol = beta_tol;
        self
    }

    pub fn with_generator_kind(mut self, kind: RandomVectorKind) -> Self {
        self.generator_kind = kind;
        self
    }

    pub fn with_product_vectors(mut self, enabled: bool) -> Self {
        self.product_vectors = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.bootstrap = enabled;
        self
    }

    pub fn with_bootstrap_resamples(mut self, resamples: usize) -> Self {
        self.bootstrap_resamples = resamples;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Rejects options no estimation can run with.
    pub fn validate(&self) -> Result<(), SpectralError> {
        let invalid = |msg: String| -> Result<(), SpectralError> {
            Err(ErrorKind::InputError(msg).into())
        };

        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return invalid(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if !(self.tol_scale.is_finite() && self.tol_scale >= 0.0) {
            return invalid(format!("tol_scale must be non-negative, got {}", self.tol_scale));
        }
        if self.max_samples == 0 {
            return invalid("max_samples must be at least 1".to_string());
        }
        if self.max_lanczos_steps == Some(0) {
            return invalid("max_lanczos_steps must be at least 1".to_string());
        }
        if self.lanczos_order == 0 {
            return invalid("lanczos_order must be at least 1".to_string());
        }
        if let Some(tol) = self.lanczos_tol {
            if !(tol.is_finite() && tol > 0.0) {
                return invalid(format!("lanczos_tol must be positive, got {tol}"));
            }
        }
        if !(self.beta_tol.is_finite() && self.beta_tol >= 0.0) {
            return invalid(format!("beta_tol must be non-negative, got {}", self.beta_tol));
        }
        if self.bootstrap && self.bootstrap_resamples == 0 {
            return invalid("bootstrap_resamples must be at least 1".to_string());
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return invalid(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            ));
        }
        if self.batch_size == Some(0) {
            return invalid("batch_size must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn stopping_rule(&self) -> StoppingRule {
        StoppingRule {
            tolerance: self.tolerance,
            tol_scale: self.tol_scale,
            min_samples: self.min_samples,
            max_samples: self.max_samples,
            max_lanczos_steps: self.max_lanczos_steps,
        }
    }
}
