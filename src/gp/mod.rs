//! Gaussian Process regression with marginal-likelihood hyperparameter fitting.
//!
//! The surrogate model behind the engine. Inputs are expected in unit-cube
//! coordinates (the engine maps every ingredient range to `[0, 1]`); targets
//! are optionally standardized, and predictions are always reported in the
//! original response units.
//!
//! # Fitting
//!
//! The kernel is a constant-scaled RBF ([`RbfKernel`]). Its amplitude and
//! length scale are chosen by maximizing the log marginal likelihood
//!
//! `log p(y | X, θ) = -½ yᵀK⁻¹y - ½ log|K| - n/2 log 2π`
//!
//! in log space with projected gradient ascent and a backtracking line
//! search, keeping both parameters inside the configured bounds. The first
//! start uses the configured initial values; `n_restarts` further starts are
//! drawn log-uniformly from a seeded RNG, so fits are reproducible.
//!
//! # Degradation
//!
//! Fitting never fails:
//!
//! - With fewer than two targets, or targets without variance, the model is a
//!   constant mean with a default uncertainty ([`ModelQuality::Fallback`]).
//! - A non-positive-definite covariance is retried with growing diagonal
//!   jitter; if nothing factorizes the model falls back as above.
//! - If a start runs out of iterations, or the deadline passes, the best
//!   parameters evaluated so far are kept ([`ModelQuality::BestEffort`]).
//!
//! # Examples
//!
//! ```
//! use taste_bo::KernelParams;
//! use taste_bo::gp::GaussianProcess;
//!
//! let x = vec![vec![0.1], vec![0.5], vec![0.9]];
//! let y = vec![2.0, 8.0, 3.0];
//! let gp = GaussianProcess::fit(&x, &y, &KernelParams::default(), 100, 42);
//!
//! let (mean, std) = gp.predict(&[vec![0.5], vec![0.0]]);
//! assert!(mean[0] > mean[1]);
//! assert!(std[1] > std[0]);
//! ```

mod kernel;

use std::time::Instant;

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use kernel::RbfKernel;
pub(crate) use kernel::sq_dist;

use crate::config::KernelParams;
use crate::stats;

/// Uncertainty reported by the constant fallback model, in response units.
pub const FALLBACK_STD: f64 = 1.0;

/// Targets with a standard deviation below this are treated as constant.
const MIN_TARGET_STD: f64 = 1e-12;

/// Diagonal jitter added on successive Cholesky retries.
const JITTER_LADDER: [f64; 4] = [0.0, 1e-8, 1e-6, 1e-4];

/// Line-search constants.
const INITIAL_STEP: f64 = 0.5;
const MAX_STEP: f64 = 8.0;
const MAX_HALVINGS: usize = 30;
const ARMIJO_C: f64 = 1e-4;
const THETA_TOL: f64 = 1e-7;
const LML_TOL: f64 = 1e-10;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// How trustworthy a fitted model is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelQuality {
    /// At least one optimizer start converged.
    Fitted,
    /// No start converged within the budget; best parameters seen are used.
    BestEffort,
    /// Constant-mean model with default uncertainty.
    Fallback,
}

/// Diagnostics of a hyperparameter fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitOutcome {
    /// Best log marginal likelihood found, if any evaluation succeeded.
    pub log_marginal_likelihood: Option<f64>,
    /// Optimizer starts that ran.
    pub starts: usize,
    /// Accepted gradient steps across all starts.
    pub iterations: usize,
    /// Whether the iteration budget or deadline cut the fit short.
    pub budget_exhausted: bool,
}

/// A fitted GP ready for predictions.
pub struct GaussianProcess {
    posterior: Posterior,
    quality: ModelQuality,
    outcome: FitOutcome,
}

enum Posterior {
    Constant {
        mean: f64,
        std: f64,
    },
    Exact {
        /// Cholesky factor of `K + σ²I`.
        cholesky: Cholesky<f64, Dyn>,
        /// `(K + σ²I)⁻¹ y` on standardized targets.
        alpha: DVector<f64>,
        x_train: Vec<Vec<f64>>,
        kernel: RbfKernel,
        y_mean: f64,
        y_scale: f64,
    },
}

/// Training data with precomputed distances, shared by every likelihood
/// evaluation of one fit.
struct Problem {
    y: DVector<f64>,
    sq_dists: DMatrix<f64>,
    noise: f64,
    log_lo: [f64; 2],
    log_hi: [f64; 2],
}

struct Evaluation {
    lml: f64,
    grad: [f64; 2],
}

impl GaussianProcess {
    /// Fits a GP to `x` (rows of unit-cube coordinates) and `y`.
    ///
    /// `max_iterations` bounds the gradient steps of each optimizer start;
    /// `seed` fixes the restart positions.
    #[must_use]
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &KernelParams,
        max_iterations: usize,
        seed: u64,
    ) -> Self {
        Self::fit_until(x, y, params, max_iterations, None, seed)
    }

    /// Like [`fit`](Self::fit) but stops optimizing once `deadline` passes.
    ///
    /// The initial start is always evaluated, so a model is produced even with
    /// an expired deadline.
    #[must_use]
    pub fn fit_until(
        x: &[Vec<f64>],
        y: &[f64],
        params: &KernelParams,
        max_iterations: usize,
        deadline: Option<Instant>,
        seed: u64,
    ) -> Self {
        debug_assert_eq!(x.len(), y.len(), "x and y must have the same length");
        let n = x.len().min(y.len());
        let (x, y) = (&x[..n], &y[..n]);

        let y_mean = stats::mean(y);
        let y_std = stats::sample_std(y);
        if n < 2 || y_std < MIN_TARGET_STD {
            trace_debug!(n, "degenerate training data, using constant model");
            return Self::constant(y_mean, FitOutcome::default());
        }

        let (center, scale) = if params.normalize_y {
            (y_mean, y_std)
        } else {
            (0.0, 1.0)
        };
        let y_vec = DVector::from_iterator(n, y.iter().map(|v| (v - center) / scale));

        let problem = Problem {
            y: y_vec,
            sq_dists: kernel::pairwise_sq_dists(x),
            noise: params.noise_variance,
            log_lo: [params.constant_bounds.0.ln(), params.length_scale_bounds.0.ln()],
            log_hi: [params.constant_bounds.1.ln(), params.length_scale_bounds.1.ln()],
        };

        let mut rng = fastrand::Rng::with_seed(seed);
        let mut starts = vec![problem.project([
            params.initial_constant.ln(),
            params.initial_length_scale.ln(),
        ])];
        for _ in 0..params.n_restarts {
            starts.push([
                log_uniform(&mut rng, problem.log_lo[0], problem.log_hi[0]),
                log_uniform(&mut rng, problem.log_lo[1], problem.log_hi[1]),
            ]);
        }

        let mut outcome = FitOutcome::default();
        let mut best: Option<([f64; 2], f64)> = None;
        let mut any_converged = false;

        for (i, start) in starts.into_iter().enumerate() {
            if i > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                outcome.budget_exhausted = true;
                break;
            }
            outcome.starts += 1;
            let run = problem.ascend(start, max_iterations, deadline);
            outcome.iterations += run.iterations;
            outcome.budget_exhausted |= !run.converged;
            any_converged |= run.converged;
            if let Some((theta, lml)) = run.best
                && best.is_none_or(|(_, b)| lml > b)
            {
                best = Some((theta, lml));
            }
        }

        let Some((theta, lml)) = best else {
            trace_warn!("no kernel parameters produced a positive-definite covariance");
            return Self::constant(y_mean, outcome);
        };
        outcome.log_marginal_likelihood = Some(lml);

        let kernel = RbfKernel::from_log(theta);
        let signal = kernel.matrix(&problem.sq_dists);
        let Some(cholesky) = factorize(&signal, problem.noise) else {
            trace_warn!("final covariance factorization failed, using constant model");
            return Self::constant(y_mean, outcome);
        };
        let alpha = cholesky.solve(&problem.y);

        let quality = if any_converged {
            ModelQuality::Fitted
        } else {
            trace_warn!(
                iterations = outcome.iterations,
                "kernel fit did not converge within budget, keeping best parameters"
            );
            ModelQuality::BestEffort
        };
        trace_debug!(
            amplitude = kernel.amplitude,
            length_scale = kernel.length_scale,
            lml,
            starts = outcome.starts,
            "gp fitted"
        );

        Self {
            posterior: Posterior::Exact {
                cholesky,
                alpha,
                x_train: x.to_vec(),
                kernel,
                y_mean: center,
                y_scale: scale,
            },
            quality,
            outcome,
        }
    }

    fn constant(mean: f64, outcome: FitOutcome) -> Self {
        Self {
            posterior: Posterior::Constant {
                mean,
                std: FALLBACK_STD,
            },
            quality: ModelQuality::Fallback,
            outcome,
        }
    }

    /// Posterior mean and standard deviation at one point.
    #[must_use]
    pub fn predict_one(&self, x: &[f64]) -> (f64, f64) {
        match &self.posterior {
            Posterior::Constant { mean, std } => (*mean, *std),
            Posterior::Exact {
                cholesky,
                alpha,
                x_train,
                kernel,
                y_mean,
                y_scale,
            } => {
                let k_star = kernel.vector(x, x_train);
                let mean = k_star.dot(alpha);
                let v = cholesky.solve(&k_star);
                let var = (kernel.amplitude - k_star.dot(&v)).max(0.0);
                (y_mean + y_scale * mean, y_scale * var.sqrt())
            }
        }
    }

    /// Posterior means and standard deviations at every query point.
    #[must_use]
    pub fn predict(&self, x_query: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
        x_query.iter().map(|x| self.predict_one(x)).unzip()
    }

    /// How the model was obtained.
    #[must_use]
    pub fn quality(&self) -> ModelQuality {
        self.quality
    }

    /// Fit diagnostics.
    #[must_use]
    pub fn outcome(&self) -> FitOutcome {
        self.outcome
    }

    /// The fitted kernel, or `None` for the constant fallback.
    #[must_use]
    pub fn kernel(&self) -> Option<RbfKernel> {
        match &self.posterior {
            Posterior::Constant { .. } => None,
            Posterior::Exact { kernel, .. } => Some(*kernel),
        }
    }
}

impl Default for FitOutcome {
    fn default() -> Self {
        Self {
            log_marginal_likelihood: None,
            starts: 0,
            iterations: 0,
            budget_exhausted: false,
        }
    }
}

struct Ascent {
    best: Option<([f64; 2], f64)>,
    iterations: usize,
    converged: bool,
}

impl Problem {
    fn project(&self, theta: [f64; 2]) -> [f64; 2] {
        [
            theta[0].clamp(self.log_lo[0], self.log_hi[0]),
            theta[1].clamp(self.log_lo[1], self.log_hi[1]),
        ]
    }

    /// Log marginal likelihood and its gradient in `(ln c, ln ℓ)`.
    fn evaluate(&self, theta: [f64; 2]) -> Option<Evaluation> {
        let kernel = RbfKernel::from_log(theta);
        let signal = kernel.matrix(&self.sq_dists);
        let cholesky = factorize(&signal, self.noise)?;
        let alpha = cholesky.solve(&self.y);

        #[allow(clippy::cast_precision_loss)]
        let n = self.y.len() as f64;
        let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let lml = -0.5 * self.y.dot(&alpha) - log_det_half - 0.5 * n * LN_2PI;
        if !lml.is_finite() {
            return None;
        }

        // ∂lml/∂θ = ½ tr((ααᵀ - K⁻¹) ∂K/∂θ)
        let w = &alpha * alpha.transpose() - cholesky.inverse();
        let grads = kernel.log_gradients(&signal, &self.sq_dists);
        let grad = [
            0.5 * w.component_mul(&grads[0]).sum(),
            0.5 * w.component_mul(&grads[1]).sum(),
        ];
        Some(Evaluation { lml, grad })
    }

    /// Projected gradient ascent with backtracking from `start`.
    fn ascend(&self, start: [f64; 2], max_iterations: usize, deadline: Option<Instant>) -> Ascent {
        let mut theta = self.project(start);
        let Some(mut current) = self.evaluate(theta) else {
            return Ascent {
                best: None,
                iterations: 0,
                converged: false,
            };
        };

        let mut step = INITIAL_STEP;
        let mut iterations = 0;
        let mut converged = false;

        'ascent: while iterations < max_iterations {
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break 'ascent;
                }
                let candidate = self.project([
                    theta[0] + step * current.grad[0],
                    theta[1] + step * current.grad[1],
                ]);
                let moved = [candidate[0] - theta[0], candidate[1] - theta[1]];
                let predicted = current.grad[0] * moved[0] + current.grad[1] * moved[1];
                if moved[0].abs().max(moved[1].abs()) < THETA_TOL {
                    break;
                }
                if let Some(eval) = self.evaluate(candidate)
                    && eval.lml >= current.lml + ARMIJO_C * predicted
                {
                    accepted = Some((candidate, eval, moved));
                    break;
                }
                step *= 0.5;
            }

            let Some((next, eval, moved)) = accepted else {
                converged = true;
                break;
            };
            iterations += 1;
            let gain = eval.lml - current.lml;
            theta = next;
            current = eval;
            step = (step * 2.0).min(MAX_STEP);

            if moved[0].abs().max(moved[1].abs()) < THETA_TOL || gain.abs() < LML_TOL {
                converged = true;
                break;
            }
        }

        Ascent {
            best: Some((theta, current.lml)),
            iterations,
            converged,
        }
    }
}

/// Cholesky factorization of `signal + (noise + jitter)I`, escalating the
/// jitter until it succeeds.
fn factorize(signal: &DMatrix<f64>, noise: f64) -> Option<Cholesky<f64, Dyn>> {
    let n = signal.nrows();
    JITTER_LADDER.iter().find_map(|&jitter| {
        let k = signal + DMatrix::<f64>::identity(n, n) * (noise + jitter);
        Cholesky::new(k)
    })
}

fn log_uniform(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    lo + rng.f64() * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KernelParams {
        KernelParams::default()
    }

    #[test]
    fn test_interpolates_training_points() {
        let x = vec![vec![0.1], vec![0.5], vec![0.9]];
        let y = vec![2.0, 8.0, 3.0];
        let gp = GaussianProcess::fit(&x, &y, &params(), 100, 7);

        assert_ne!(gp.quality(), ModelQuality::Fallback);
        let (mean, std) = gp.predict(&x);
        for (m, target) in mean.iter().zip(&y) {
            assert!((m - target).abs() < 0.05, "mean {m} far from {target}");
        }
        assert!(std.iter().all(|s| *s < 0.1));
    }

    #[test]
    fn test_uncertainty_grows_away_from_data() {
        let x = vec![vec![0.4], vec![0.5], vec![0.6]];
        let y = vec![1.0, 2.0, 1.5];
        let gp = GaussianProcess::fit(&x, &y, &params(), 100, 7);
        let (_, near) = gp.predict_one(&[0.5]);
        let (_, far) = gp.predict_one(&[0.0]);
        assert!(far > near);
    }

    #[test]
    fn test_predictions_in_original_units() {
        let x = vec![vec![0.0], vec![0.5], vec![1.0]];
        let y = vec![100.0, 120.0, 110.0];
        let gp = GaussianProcess::fit(&x, &y, &params(), 100, 1);
        let (m, _) = gp.predict_one(&[0.5]);
        assert!((m - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_constant_targets_fall_back() {
        let x = vec![vec![0.1], vec![0.5], vec![0.9]];
        let y = vec![5.0, 5.0, 5.0];
        let gp = GaussianProcess::fit(&x, &y, &params(), 100, 1);
        assert_eq!(gp.quality(), ModelQuality::Fallback);
        assert!(gp.kernel().is_none());
        let (m, s) = gp.predict_one(&[0.3]);
        assert!((m - 5.0).abs() < 1e-12);
        assert!(s > 0.0);
    }

    #[test]
    fn test_single_point_falls_back() {
        let gp = GaussianProcess::fit(&[vec![0.2, 0.2]], &[3.0], &params(), 100, 1);
        assert_eq!(gp.quality(), ModelQuality::Fallback);
        assert_eq!(gp.predict_one(&[0.9, 0.9]), (3.0, FALLBACK_STD));
    }

    #[test]
    fn test_duplicate_inputs_still_factorize() {
        let x = vec![vec![0.5], vec![0.5], vec![0.2]];
        let y = vec![1.0, 1.2, 0.3];
        let kernel = KernelParams {
            noise_variance: 0.0,
            ..params()
        };
        let gp = GaussianProcess::fit(&x, &y, &kernel, 100, 3);
        let (m, s) = gp.predict_one(&[0.5]);
        assert!(m.is_finite() && s.is_finite());
    }

    #[test]
    fn test_hyperparameters_stay_in_bounds() {
        let x: Vec<Vec<f64>> = (0..8_u32).map(|i| vec![f64::from(i) / 7.0]).collect();
        let y: Vec<f64> = x.iter().map(|p| (p[0] * 12.0).sin()).collect();
        let kernel = params();
        let gp = GaussianProcess::fit(&x, &y, &kernel, 200, 11);
        let fitted = gp.kernel().unwrap();
        let (lo, hi) = kernel.length_scale_bounds;
        assert!(fitted.length_scale >= lo - 1e-12 && fitted.length_scale <= hi + 1e-12);
        let (lo, hi) = kernel.constant_bounds;
        assert!(fitted.amplitude >= lo - 1e-12 && fitted.amplitude <= hi + 1e-12);
    }

    #[test]
    fn test_restarts_never_lower_the_likelihood() {
        let x = vec![vec![0.0], vec![0.3], vec![0.35], vec![0.8], vec![1.0]];
        let y = vec![0.0, 1.0, 0.9, -0.5, 0.2];
        let single = KernelParams {
            n_restarts: 0,
            ..params()
        };
        let many = KernelParams {
            n_restarts: 6,
            ..params()
        };
        let a = GaussianProcess::fit(&x, &y, &single, 100, 5).outcome();
        let b = GaussianProcess::fit(&x, &y, &many, 100, 5).outcome();
        assert_eq!(b.starts, 7);
        assert!(b.log_marginal_likelihood.unwrap() >= a.log_marginal_likelihood.unwrap() - 1e-9);
    }

    #[test]
    fn test_tiny_iteration_budget_is_best_effort() {
        let x: Vec<Vec<f64>> = (0..6_u32).map(|i| vec![f64::from(i) / 5.0]).collect();
        let y = vec![0.0, 3.0, -1.0, 2.5, -2.0, 1.0];
        let gp = GaussianProcess::fit(&x, &y, &params(), 1, 9);
        assert!(gp.outcome().iterations <= gp.outcome().starts);
        assert_ne!(gp.quality(), ModelQuality::Fallback);
        let (m, s) = gp.predict_one(&[0.5]);
        assert!(m.is_finite() && s.is_finite());
    }

    #[test]
    fn test_expired_deadline_still_produces_model() {
        let x = vec![vec![0.1], vec![0.5], vec![0.9]];
        let y = vec![2.0, 8.0, 3.0];
        let gp = GaussianProcess::fit_until(&x, &y, &params(), 100, Some(Instant::now()), 1);
        assert!(gp.outcome().budget_exhausted);
        assert_eq!(gp.outcome().starts, 1);
        assert!(gp.predict_one(&[0.5]).0.is_finite());
    }

    #[test]
    fn test_same_seed_same_fit() {
        let x = vec![vec![0.1, 0.2], vec![0.5, 0.9], vec![0.9, 0.4], vec![0.3, 0.3]];
        let y = vec![2.0, 8.0, 3.0, 4.0];
        let a = GaussianProcess::fit(&x, &y, &params(), 100, 42);
        let b = GaussianProcess::fit(&x, &y, &params(), 100, 42);
        assert_eq!(a.kernel(), b.kernel());
        assert_eq!(a.predict_one(&[0.6, 0.6]), b.predict_one(&[0.6, 0.6]));
    }
}
