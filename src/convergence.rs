//! Convergence classification over the history of suggestions.
//!
//! The detector follows a small state machine:
//!
//! ```text
//! BelowMinCycles ──▶ Monitoring ──▶ StableConverged
//!                        │
//!                        └────────▶ ForcedStopAtMax
//! ```
//!
//! - Before `min_cycles` it reports [`ConvergenceVerdict::CyclesBelowMin`].
//! - From `max_cycles` on it always suggests stopping.
//! - In between it computes a **stability metric**, the sample standard
//!   deviation of the predicted values over the last `stability_window`
//!   suggestions. Stopping is suggested once that metric has stayed below
//!   `stability_threshold` for `consecutive_required` consecutive
//!   suggestions *and* the best convergence score in the latest window is
//!   below the EI/UCB threshold.
//!
//! The detector is a pure function of the history it is given, so repeated
//! calls with the same history report the same verdict, and a session that
//! continues past a soft stop drops back to `Monitoring` as soon as new
//! unstable suggestions arrive. It only classifies; ending a session is the
//! caller's decision (see [`StoppingMode`](crate::StoppingMode)).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acquisition::{self, AcquisitionKind};
use crate::config::BoConfig;
use crate::stats;
use crate::types::{Dimensionality, Suggestion};

/// What one past cycle's suggestion looked like.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SuggestionRecord {
    /// Cycle the suggestion was made for.
    pub cycle: u32,
    /// Suggested concentrations in canonical order.
    pub concentrations: Vec<f64>,
    /// Posterior mean at the suggestion.
    pub predicted_value: f64,
    /// Posterior standard deviation at the suggestion.
    pub uncertainty: f64,
    /// Acquisition value at the suggestion.
    pub acquisition_value: f64,
    /// Acquisition function used.
    pub acquisition: AcquisitionKind,
    /// Best observed response when the suggestion was made.
    pub best_observed: f64,
}

impl SuggestionRecord {
    /// Value compared against the EI/UCB convergence threshold.
    #[must_use]
    pub fn convergence_score(&self) -> f64 {
        acquisition::convergence_score(self.acquisition, self.acquisition_value, self.best_observed)
    }
}

impl From<&Suggestion> for SuggestionRecord {
    fn from(s: &Suggestion) -> Self {
        Self {
            cycle: s.cycle,
            concentrations: s.concentrations.iter().map(|c| c.value).collect(),
            predicted_value: s.predicted_value,
            uncertainty: s.uncertainty,
            acquisition_value: s.acquisition_value,
            acquisition: s.acquisition_function,
            best_observed: s.best_observed,
        }
    }
}

/// Verdict handed to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConvergenceVerdict {
    /// Keep sampling.
    NotConverged,
    /// Stopping is recommended (stable, or `max_cycles` reached).
    SuggestStop,
    /// Too early to judge.
    CyclesBelowMin,
}

/// State of the detector's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConvergenceState {
    /// `current_cycle < min_cycles`.
    BelowMinCycles,
    /// Watching stability and acquisition values.
    Monitoring,
    /// Stable long enough with low acquisition values.
    StableConverged,
    /// `current_cycle >= max_cycles`.
    ForcedStopAtMax,
}

impl ConvergenceState {
    /// Whether this is a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::StableConverged | Self::ForcedStopAtMax)
    }
}

/// Full convergence assessment for one cycle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvergenceReport {
    /// The verdict.
    pub verdict: ConvergenceVerdict,
    /// The detector state behind the verdict.
    pub state: ConvergenceState,
    /// Stability metric of the latest full window, if the history fills one.
    pub stability: Option<f64>,
    /// Best convergence score in the latest window, if the history fills one.
    pub best_window_score: Option<f64>,
    /// Trailing suggestions whose window was stable, at most
    /// `consecutive_required`.
    pub consecutive_stable: usize,
}

/// Classifies convergence for `current_cycle`.
///
/// # Examples
///
/// ```
/// use taste_bo::{BoConfig, ConvergenceVerdict, Dimensionality, convergence};
///
/// let config = BoConfig::default();
/// let max = config.convergence_1d.max_cycles;
/// assert_eq!(
///     convergence::check(&[], &config, max, Dimensionality::One),
///     ConvergenceVerdict::SuggestStop
/// );
/// assert_eq!(
///     convergence::check(&[], &config, 1, Dimensionality::One),
///     ConvergenceVerdict::CyclesBelowMin
/// );
/// ```
#[must_use]
pub fn check(
    history: &[SuggestionRecord],
    config: &BoConfig,
    current_cycle: u32,
    dims: Dimensionality,
) -> ConvergenceVerdict {
    assess(history, config, current_cycle, dims).verdict
}

/// Like [`check`] but returns the metrics behind the verdict.
///
/// Records after `current_cycle` are ignored; of the rest, the latest
/// [`history_depth`](crate::ConvergenceThresholds::history_depth) are taken
/// in cycle order.
#[must_use]
pub fn assess(
    history: &[SuggestionRecord],
    config: &BoConfig,
    current_cycle: u32,
    dims: Dimensionality,
) -> ConvergenceReport {
    let thresholds = config.thresholds(dims);

    let mut relevant: Vec<&SuggestionRecord> =
        history.iter().filter(|r| r.cycle <= current_cycle).collect();
    relevant.sort_by_key(|r| r.cycle);
    relevant.drain(..relevant.len().saturating_sub(thresholds.history_depth()));
    let predicted: Vec<f64> = relevant.iter().map(|r| r.predicted_value).collect();

    let window = thresholds.stability_window.max(2);
    let stability_at = |end: usize| stats::sample_std(&predicted[end + 1 - window..=end]);

    let (stability, best_window_score) = if relevant.len() >= window {
        let last = relevant.len() - 1;
        let best = relevant[last + 1 - window..]
            .iter()
            .map(|r| r.convergence_score())
            .fold(f64::NEG_INFINITY, f64::max);
        (Some(stability_at(last)), Some(best))
    } else {
        (None, None)
    };

    let consecutive_stable = if relevant.len() >= window {
        (window - 1..relevant.len())
            .rev()
            .take_while(|&end| stability_at(end) < thresholds.stability_threshold)
            .count()
    } else {
        0
    };

    let state = if current_cycle >= thresholds.max_cycles {
        ConvergenceState::ForcedStopAtMax
    } else if current_cycle < thresholds.min_cycles {
        ConvergenceState::BelowMinCycles
    } else {
        let acquisition_low = best_window_score
            .is_some_and(|s| s < thresholds.acquisition_threshold(config.acquisition));
        if consecutive_stable >= thresholds.consecutive_required && acquisition_low {
            ConvergenceState::StableConverged
        } else {
            ConvergenceState::Monitoring
        }
    };

    let verdict = match state {
        ConvergenceState::BelowMinCycles => ConvergenceVerdict::CyclesBelowMin,
        ConvergenceState::Monitoring => ConvergenceVerdict::NotConverged,
        ConvergenceState::StableConverged | ConvergenceState::ForcedStopAtMax => {
            ConvergenceVerdict::SuggestStop
        }
    };

    trace_debug!(
        current_cycle,
        ?state,
        consecutive_stable,
        "convergence assessed"
    );

    ConvergenceReport {
        verdict,
        state,
        stability,
        best_window_score,
        consecutive_stable,
    }
}
