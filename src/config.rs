//! Per-session BO configuration.
//!
//! A [`BoConfig`] is created once when the protocol is set up and read on
//! every cycle. Build it with [`BoConfig::builder`], or deserialize it from a
//! protocol JSON fragment with the `serde` feature. A fragment must name the
//! acquisition, schedule, convergence and `min_samples_for_bo` fields; only
//! `kernel`, `stopping_mode`, `search` and `budget` may be omitted. Either way
//! the engine re-validates the config on entry so that a bad configuration
//! fails fast instead of silently defaulting.
//!
//! # Defaults
//!
//! | Option | Default |
//! |--------|---------|
//! | `acquisition` | Expected Improvement |
//! | `adaptive_acquisition` | `true` |
//! | `exploration_budget` | 0.25 |
//! | `xi_exploration` / `xi_exploitation` | 0.1 / 0.01 |
//! | `kappa_exploration` / `kappa_exploitation` | 3.0 / 1.0 |
//! | `min_samples_for_bo` | 3 |
//! | 1-D cycles (min / max) | 8 / 30 |
//! | 2-D cycles (min / max) | 12 / 50 |

use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acquisition::AcquisitionKind;
use crate::convergence::ConvergenceVerdict;
use crate::error::{Result, invalid_config};
use crate::types::Dimensionality;

/// Hyperparameter bounds and fitting options for the GP kernel.
///
/// Length scales are expressed in unit-cube coordinates: every ingredient
/// range is mapped to `[0, 1]` before fitting.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct KernelParams {
    /// Lower and upper bound of the RBF length scale.
    pub length_scale_bounds: (f64, f64),
    /// Lower and upper bound of the constant (amplitude) term.
    pub constant_bounds: (f64, f64),
    /// Length scale of the first optimizer start.
    pub initial_length_scale: f64,
    /// Amplitude of the first optimizer start.
    pub initial_constant: f64,
    /// Observation noise added to the kernel diagonal.
    pub noise_variance: f64,
    /// Standardize targets before fitting.
    pub normalize_y: bool,
    /// Additional seeded optimizer starts after the initial one.
    pub n_restarts: usize,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            length_scale_bounds: (0.05, 5.0),
            constant_bounds: (0.1, 10.0),
            initial_length_scale: 0.3,
            initial_constant: 1.0,
            noise_variance: 1e-6,
            normalize_y: true,
            n_restarts: 3,
        }
    }
}

/// Convergence thresholds for one search-space dimensionality.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvergenceThresholds {
    /// Best EI in the stability window must fall below this.
    pub ei_threshold: f64,
    /// Best optimistic UCB gain (`UCB - y_best`) in the window must fall below this.
    pub ucb_threshold: f64,
    /// Number of recent suggestions the stability metric looks at.
    pub stability_window: usize,
    /// The metric must stay below this value to count as stable.
    pub stability_threshold: f64,
    /// Consecutive stable evaluations required before suggesting a stop.
    pub consecutive_required: usize,
    /// No convergence is signalled before this cycle.
    pub min_cycles: u32,
    /// A stop is forced from this cycle on.
    pub max_cycles: u32,
}

impl ConvergenceThresholds {
    /// Defaults for single-ingredient searches.
    #[must_use]
    pub fn one_dimensional() -> Self {
        Self {
            ei_threshold: 0.001,
            ucb_threshold: 0.01,
            stability_window: 3,
            stability_threshold: 0.05,
            consecutive_required: 2,
            min_cycles: 8,
            max_cycles: 30,
        }
    }

    /// Defaults for two-ingredient searches.
    #[must_use]
    pub fn two_dimensional() -> Self {
        Self {
            ei_threshold: 0.002,
            ucb_threshold: 0.02,
            stability_window: 4,
            stability_threshold: 0.05,
            consecutive_required: 2,
            min_cycles: 12,
            max_cycles: 50,
        }
    }

    /// Number of trailing suggestions, the current one included, that a
    /// convergence assessment reads: one stability window for each of the
    /// `consecutive_required` evaluations.
    ///
    /// # Examples
    ///
    /// ```
    /// use taste_bo::ConvergenceThresholds;
    ///
    /// assert_eq!(ConvergenceThresholds::one_dimensional().history_depth(), 4);
    /// assert_eq!(ConvergenceThresholds::two_dimensional().history_depth(), 5);
    /// ```
    #[must_use]
    pub fn history_depth(&self) -> usize {
        (self.stability_window.max(2) + self.consecutive_required).saturating_sub(1)
    }

    /// The acquisition threshold matching `kind`.
    #[must_use]
    pub fn acquisition_threshold(&self, kind: AcquisitionKind) -> f64 {
        match kind {
            AcquisitionKind::ExpectedImprovement => self.ei_threshold,
            AcquisitionKind::UpperConfidenceBound => self.ucb_threshold,
        }
    }

    fn validate(&self, field: &'static str) -> Result<()> {
        if !(self.ei_threshold.is_finite() && self.ei_threshold >= 0.0) {
            return Err(invalid_config(field, "ei_threshold must be finite and >= 0"));
        }
        if !(self.ucb_threshold.is_finite() && self.ucb_threshold >= 0.0) {
            return Err(invalid_config(field, "ucb_threshold must be finite and >= 0"));
        }
        if self.stability_window < 2 {
            return Err(invalid_config(field, "stability_window must be at least 2"));
        }
        if !(self.stability_threshold.is_finite() && self.stability_threshold > 0.0) {
            return Err(invalid_config(field, "stability_threshold must be positive"));
        }
        if self.consecutive_required == 0 {
            return Err(invalid_config(field, "consecutive_required must be at least 1"));
        }
        if self.max_cycles == 0 {
            return Err(invalid_config(field, "max_cycles must be at least 1"));
        }
        if self.min_cycles > self.max_cycles {
            return Err(invalid_config(
                field,
                format!(
                    "min_cycles ({}) exceeds max_cycles ({})",
                    self.min_cycles, self.max_cycles
                ),
            ));
        }
        Ok(())
    }
}

/// How the caller acts on a convergence verdict.
///
/// The engine never stops a session itself; this only maps a verdict to the
/// caller's next action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StoppingMode {
    /// Only the moderator ends the session; verdicts are informational.
    Manual,
    /// Show a stop suggestion the moderator can accept or dismiss.
    #[default]
    SuggestAuto,
    /// End the session as soon as a stop is suggested.
    AutoStop,
}

/// What the caller should do after a cycle, per [`StoppingMode::action`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopAction {
    /// Keep running cycles.
    Continue,
    /// Offer the moderator to end the session.
    PromptModerator,
    /// End the session.
    Stop,
}

impl StoppingMode {
    /// Maps a verdict to the caller's next action.
    ///
    /// # Examples
    ///
    /// ```
    /// use taste_bo::{ConvergenceVerdict, StopAction, StoppingMode};
    ///
    /// let mode = StoppingMode::SuggestAuto;
    /// assert_eq!(mode.action(ConvergenceVerdict::SuggestStop), StopAction::PromptModerator);
    /// assert_eq!(mode.action(ConvergenceVerdict::NotConverged), StopAction::Continue);
    /// ```
    #[must_use]
    pub fn action(self, verdict: ConvergenceVerdict) -> StopAction {
        match (self, verdict) {
            (_, ConvergenceVerdict::NotConverged | ConvergenceVerdict::CyclesBelowMin)
            | (Self::Manual, ConvergenceVerdict::SuggestStop) => StopAction::Continue,
            (Self::SuggestAuto, ConvergenceVerdict::SuggestStop) => StopAction::PromptModerator,
            (Self::AutoStop, ConvergenceVerdict::SuggestStop) => StopAction::Stop,
        }
    }
}

/// Soft limits on the CPU-bound parts of a call.
///
/// Exhausting either limit never raises: the GP keeps the best
/// hyperparameters seen so far and the candidate search returns the best
/// point scanned so far.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SoftBudget {
    /// Gradient steps per optimizer start.
    pub max_fit_iterations: usize,
    /// Wall-clock limit for a whole call, replayed cycles included. `None`
    /// keeps the call fully deterministic.
    pub deadline: Option<Duration>,
}

impl Default for SoftBudget {
    fn default() -> Self {
        Self {
            max_fit_iterations: 100,
            deadline: None,
        }
    }
}

/// Candidate grid and determinism settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SearchSettings {
    /// Grid points for single-ingredient searches.
    pub grid_points_1d: usize,
    /// Grid points per axis for two-ingredient searches.
    pub grid_points_2d: usize,
    /// Step halvings of the local refinement after the grid scan.
    pub refinement_steps: usize,
    /// Seed for the GP optimizer restarts.
    pub seed: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            grid_points_1d: 200,
            grid_points_2d: 25,
            refinement_steps: 8,
            seed: 42,
        }
    }
}

/// Bayesian optimization settings for one session.
///
/// # Examples
///
/// ```
/// use taste_bo::{AcquisitionKind, BoConfig};
///
/// let config = BoConfig::builder()
///     .acquisition(AcquisitionKind::UpperConfidenceBound)
///     .kappa(4.0, 1.5)
///     .exploration_budget(0.3)
///     .min_samples_for_bo(4)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.min_samples_for_bo, 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoConfig {
    /// Acquisition function.
    pub acquisition: AcquisitionKind,
    /// Kernel bounds and fitting options.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kernel: KernelParams,
    /// Switch between exploration and exploitation values by cycle.
    pub adaptive_acquisition: bool,
    /// Fraction of `max_cycles` spent in the exploration phase.
    pub exploration_budget: f64,
    /// EI `xi` during exploration.
    pub xi_exploration: f64,
    /// EI `xi` during exploitation.
    pub xi_exploitation: f64,
    /// UCB `kappa` during exploration.
    pub kappa_exploration: f64,
    /// UCB `kappa` during exploitation.
    pub kappa_exploitation: f64,
    /// Thresholds for single-ingredient searches.
    pub convergence_1d: ConvergenceThresholds,
    /// Thresholds for two-ingredient searches.
    pub convergence_2d: ConvergenceThresholds,
    /// Rated observations required before BO activates.
    pub min_samples_for_bo: usize,
    /// How the caller reacts to a stop suggestion.
    #[cfg_attr(feature = "serde", serde(default))]
    pub stopping_mode: StoppingMode,
    /// Candidate grid and seed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub search: SearchSettings,
    /// Soft latency limits.
    #[cfg_attr(feature = "serde", serde(default))]
    pub budget: SoftBudget,
}

impl Default for BoConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionKind::ExpectedImprovement,
            kernel: KernelParams::default(),
            adaptive_acquisition: true,
            exploration_budget: 0.25,
            xi_exploration: 0.1,
            xi_exploitation: 0.01,
            kappa_exploration: 3.0,
            kappa_exploitation: 1.0,
            convergence_1d: ConvergenceThresholds::one_dimensional(),
            convergence_2d: ConvergenceThresholds::two_dimensional(),
            min_samples_for_bo: 3,
            stopping_mode: StoppingMode::default(),
            search: SearchSettings::default(),
            budget: SoftBudget::default(),
        }
    }
}

impl BoConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> BoConfigBuilder {
        BoConfigBuilder::new()
    }

    /// Thresholds for the given dimensionality.
    #[must_use]
    pub fn thresholds(&self, dims: Dimensionality) -> &ConvergenceThresholds {
        match dims {
            Dimensionality::One => &self.convergence_1d,
            Dimensionality::Two => &self.convergence_2d,
        }
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) naming
    /// the first offending field.
    pub fn validate(&self) -> Result<()> {
        let k = &self.kernel;
        check_range("kernel.length_scale_bounds", k.length_scale_bounds)?;
        check_range("kernel.constant_bounds", k.constant_bounds)?;
        if !within(k.initial_length_scale, k.length_scale_bounds) {
            return Err(invalid_config(
                "kernel.initial_length_scale",
                "must lie within length_scale_bounds",
            ));
        }
        if !within(k.initial_constant, k.constant_bounds) {
            return Err(invalid_config(
                "kernel.initial_constant",
                "must lie within constant_bounds",
            ));
        }
        if !(k.noise_variance.is_finite() && k.noise_variance >= 0.0) {
            return Err(invalid_config(
                "kernel.noise_variance",
                "must be finite and >= 0",
            ));
        }
        if !(self.exploration_budget > 0.0 && self.exploration_budget <= 1.0) {
            return Err(invalid_config(
                "exploration_budget",
                format!("{} must be in (0, 1]", self.exploration_budget),
            ));
        }
        for (field, value) in [
            ("xi_exploration", self.xi_exploration),
            ("xi_exploitation", self.xi_exploitation),
            ("kappa_exploration", self.kappa_exploration),
            ("kappa_exploitation", self.kappa_exploitation),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid_config(field, format!("{value} must be finite and >= 0")));
            }
        }
        self.convergence_1d.validate("convergence_1d")?;
        self.convergence_2d.validate("convergence_2d")?;
        if self.min_samples_for_bo == 0 {
            return Err(invalid_config("min_samples_for_bo", "must be at least 1"));
        }
        if self.search.grid_points_1d < 2 {
            return Err(invalid_config("search.grid_points_1d", "must be at least 2"));
        }
        if self.search.grid_points_2d < 2 {
            return Err(invalid_config("search.grid_points_2d", "must be at least 2"));
        }
        if self.budget.max_fit_iterations == 0 {
            return Err(invalid_config("budget.max_fit_iterations", "must be at least 1"));
        }
        Ok(())
    }
}

fn check_range(field: &'static str, (lo, hi): (f64, f64)) -> Result<()> {
    if lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi {
        Ok(())
    } else {
        Err(invalid_config(
            field,
            format!("({lo}, {hi}) must be positive, finite and ordered"),
        ))
    }
}

fn within(value: f64, (lo, hi): (f64, f64)) -> bool {
    value >= lo && value <= hi
}

/// Builder for [`BoConfig`].
///
/// Validation is deferred to [`build`](Self::build).
#[derive(Clone, Debug, Default)]
pub struct BoConfigBuilder {
    config: BoConfig,
}

impl BoConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acquisition function.
    #[must_use]
    pub fn acquisition(mut self, kind: AcquisitionKind) -> Self {
        self.config.acquisition = kind;
        self
    }

    /// Sets the kernel parameters.
    #[must_use]
    pub fn kernel(mut self, kernel: KernelParams) -> Self {
        self.config.kernel = kernel;
        self
    }

    /// Enables or disables the adaptive explore/exploit schedule.
    #[must_use]
    pub fn adaptive_acquisition(mut self, enabled: bool) -> Self {
        self.config.adaptive_acquisition = enabled;
        self
    }

    /// Sets the fraction of `max_cycles` spent exploring.
    #[must_use]
    pub fn exploration_budget(mut self, fraction: f64) -> Self {
        self.config.exploration_budget = fraction;
        self
    }

    /// Sets the EI `xi` for the exploration and exploitation phases.
    #[must_use]
    pub fn xi(mut self, exploration: f64, exploitation: f64) -> Self {
        self.config.xi_exploration = exploration;
        self.config.xi_exploitation = exploitation;
        self
    }

    /// Sets the UCB `kappa` for the exploration and exploitation phases.
    #[must_use]
    pub fn kappa(mut self, exploration: f64, exploitation: f64) -> Self {
        self.config.kappa_exploration = exploration;
        self.config.kappa_exploitation = exploitation;
        self
    }

    /// Sets the single-ingredient convergence thresholds.
    #[must_use]
    pub fn convergence_1d(mut self, thresholds: ConvergenceThresholds) -> Self {
        self.config.convergence_1d = thresholds;
        self
    }

    /// Sets the two-ingredient convergence thresholds.
    #[must_use]
    pub fn convergence_2d(mut self, thresholds: ConvergenceThresholds) -> Self {
        self.config.convergence_2d = thresholds;
        self
    }

    /// Sets the number of rated observations required before BO activates.
    #[must_use]
    pub fn min_samples_for_bo(mut self, n: usize) -> Self {
        self.config.min_samples_for_bo = n;
        self
    }

    /// Sets the stopping mode.
    #[must_use]
    pub fn stopping_mode(mut self, mode: StoppingMode) -> Self {
        self.config.stopping_mode = mode;
        self
    }

    /// Sets the candidate grid resolution for 1-D and 2-D (per axis) searches.
    #[must_use]
    pub fn grid_points(mut self, one_d: usize, two_d_per_axis: usize) -> Self {
        self.config.search.grid_points_1d = one_d;
        self.config.search.grid_points_2d = two_d_per_axis;
        self
    }

    /// Sets the number of local refinement steps.
    #[must_use]
    pub fn refinement_steps(mut self, steps: usize) -> Self {
        self.config.search.refinement_steps = steps;
        self
    }

    /// Sets the seed for optimizer restarts.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.search.seed = seed;
        self
    }

    /// Sets the soft latency budget.
    #[must_use]
    pub fn budget(mut self, budget: SoftBudget) -> Self {
        self.config.budget = budget;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if any
    /// field is out of range.
    pub fn build(self) -> Result<BoConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
