//! Aggregation of per-vector trace samples and the stopping rule.
//!
//! Each random vector yields one unbiased sample `d · ⟨v|f(A)|v⟩ / ‖v‖²` of `tr f(A)`.
//! [`TraceEstimator`] folds samples into a [`RunningStats`] (Welford's single-pass
//! update, so the samples themselves need not be stored), asks the [`StoppingRule`]
//! whether to go on, and finally produces a [`SpectralEstimate`].
//!
//! Folding is done by the driving thread only. Worker tasks return immutable
//! [`TraceSample`]s and never touch the statistic.

use crate::random::RandomVectorGenerator;
use log::warn;
use serde::Serialize;

/// Running count, mean and sum of squared deviations of a stream of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample (Welford's update).
    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    /// Combines two disjoint sets of samples (Chan et al. pairwise update).
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance, `0` for fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    /// Standard error of the mean, `sqrt(variance / count)`.
    ///
    /// Infinite for fewer than two samples: a single sample says nothing about the
    /// spread of the estimator.
    pub fn standard_error(&self) -> f64 {
        if self.count > 1 {
            (self.variance() / self.count as f64).sqrt()
        } else {
            f64::INFINITY
        }
    }
}

/// The outcome of one stopping-rule evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    /// Draw another batch.
    Continue,
    /// The tolerance is met.
    Converged,
    /// A sample or Lanczos-step budget is used up before the tolerance was met.
    Exhausted,
}

/// When to stop drawing random vectors.
///
/// The mean has converged once at least `min_samples` samples are in and
/// `standard_error <= tolerance · max(|mean|, tol_scale)`. The `tol_scale` floor turns
/// the relative test into an absolute one when the trace is close to zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoppingRule {
    pub tolerance: f64,
    pub tol_scale: f64,
    pub min_samples: usize,
    pub max_samples: usize,
    pub max_lanczos_steps: Option<usize>,
}

impl StoppingRule {
    /// Decides from the statistic so far.
    ///
    /// `exact` is set once a sample is known to equal the trace itself (a multiple of
    /// the identity), in which case no further sampling can improve the estimate.
    pub fn decide(&self, stats: &RunningStats, lanczos_steps: usize, exact: bool) -> Decision {
        if stats.count() == 0 {
            return Decision::Continue;
        }
        if exact {
            return Decision::Converged;
        }
        let threshold = self.tolerance * stats.mean().abs().max(self.tol_scale);
        if stats.count() >= self.min_samples && stats.standard_error() <= threshold {
            return Decision::Converged;
        }
        let steps_exhausted = self
            .max_lanczos_steps
            .is_some_and(|budget| lanczos_steps >= budget);
        if stats.count() >= self.max_samples || steps_exhausted {
            return Decision::Exhausted;
        }
        Decision::Continue
    }
}

/// The result of one sampling task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceSample {
    /// `d · ⟨v|f(A)|v⟩ / ‖v‖²` for one random `v`.
    pub estimate: f64,
    /// Lanczos steps the sample used.
    pub lanczos_steps: usize,
    /// The sample is the exact trace.
    pub exact: bool,
}

/// An empirical confidence interval for the trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Nominal coverage, e.g. `0.95`.
    pub level: f64,
    /// Standard deviation of the bootstrap means.
    pub standard_error: f64,
}

/// The final answer of a trace estimation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpectralEstimate {
    /// Estimate of `tr f(A)`: the mean of all samples.
    pub estimate: f64,
    /// Standard error of the mean (`0` when a sample was exact, infinite for a single
    /// inexact sample).
    pub standard_error: f64,
    pub sample_variance: f64,
    pub num_samples: usize,
    /// Total Lanczos steps over all samples.
    pub lanczos_steps: usize,
    /// `false` means a budget ran out before the tolerance was met. The estimate is
    /// still the best one available.
    pub converged: bool,
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Raw per-vector samples; only kept when a bootstrap was requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<f64>,
}

/// The single aggregation point of a trace estimation.
#[derive(Clone, Debug)]
pub struct TraceEstimator {
    rule: StoppingRule,
    stats: RunningStats,
    lanczos_steps: usize,
    exact: bool,
    keep_samples: bool,
    samples: Vec<f64>,
}

impl TraceEstimator {
    /// `keep_samples` retains the raw samples for a later bootstrap.
    pub fn new(rule: StoppingRule, keep_samples: bool) -> Self {
        Self {
            rule,
            stats: RunningStats::new(),
            lanczos_steps: 0,
            exact: false,
            keep_samples,
            samples: Vec::new(),
        }
    }

    pub fn fold(&mut self, sample: TraceSample) {
        self.stats.push(sample.estimate);
        self.lanczos_steps += sample.lanczos_steps;
        self.exact |= sample.exact;
        if self.keep_samples {
            self.samples.push(sample.estimate);
        }
    }

    pub fn decision(&self) -> Decision {
        self.rule.decide(&self.stats, self.lanczos_steps, self.exact)
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn lanczos_steps(&self) -> usize {
        self.lanczos_steps
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn finish(self, confidence_interval: Option<ConfidenceInterval>) -> SpectralEstimate {
        let converged = self.decision() == Decision::Converged;
        let (standard_error, sample_variance) = if self.exact {
            (0.0, 0.0)
        } else {
            (self.stats.standard_error(), self.stats.variance())
        };
        SpectralEstimate {
            estimate: self.stats.mean(),
            standard_error,
            sample_variance,
            num_samples: self.stats.count(),
            lanczos_steps: self.lanczos_steps,
            converged,
            confidence_interval,
            samples: self.samples,
        }
    }
}

/// Linear interpolation between order statistics (type 7 quantile).
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Percentile bootstrap interval for the mean of `samples`.
///
/// Draws `resamples` resamples of the same size with replacement, and reports the
/// `(1 - level) / 2` and `(1 + level) / 2` quantiles of their means. Returns `None`
/// when there are fewer than two samples to resample from.
pub fn bootstrap_interval(
    samples: &[f64],
    resamples: usize,
    level: f64,
    generator: &mut RandomVectorGenerator,
) -> Option<ConfidenceInterval> {
    let n = samples.len();
    if n < 2 || resamples == 0 {
        warn!("Bootstrap needs at least two samples and one resample, got {n} and {resamples}");
        return None;
    }

    let mut spread = RunningStats::new();
    let mut means: Vec<f64> = (0..resamples)
        .map(|_| {
            let total: f64 = (0..n).map(|_| samples[generator.index(n)]).sum();
            let mean = total / n as f64;
            spread.push(mean);
            mean
        })
        .collect();
    means.sort_by(f64::total_cmp);

    let tail = (1.0 - level) / 2.0;
    Some(ConfidenceInterval {
        lower: quantile(&means, tail),
        upper: quantile(&means, 1.0 - tail),
        level,
        standard_error: spread.variance().sqrt(),
    })
}
