//! Adaptive explore/exploit schedule.
//!
//! The first `floor(max_cycles · exploration_budget)` cycles of a session use
//! the exploration value of `xi` / `kappa`; later cycles use the exploitation
//! value. With `adaptive_acquisition` off every cycle uses the exploitation
//! value.

use crate::acquisition::{Acquisition, AcquisitionKind};
use crate::config::BoConfig;
use crate::types::SearchPhase;

/// Tolerance absorbing binary rounding in `max_cycles · exploration_budget`
/// (e.g. `100 · 0.29 = 28.999…`).
const CUTOFF_EPSILON: f64 = 1e-9;

/// Acquisition resolved for one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleParams {
    /// Function plus the parameter value active this cycle.
    pub acquisition: Acquisition,
    /// Which phase the cycle falls in.
    pub phase: SearchPhase,
}

/// Last cycle of the exploration phase.
///
/// This is `floor(total_budget_cycles · exploration_budget)` taken over the
/// decimal product, not a literal float `floor`: a product a hair below an
/// integer through binary rounding counts as that integer, so `100 · 0.29`
/// gives 29 where `(100.0 * 0.29).floor()` gives 28.
///
/// # Examples
///
/// ```
/// use taste_bo::schedule::exploration_cutoff;
///
/// assert_eq!(exploration_cutoff(20, 0.25), 5);
/// assert_eq!(exploration_cutoff(30, 0.1), 3);
/// assert_eq!(exploration_cutoff(100, 0.29), 29);
/// assert_eq!((100.0_f64 * 0.29).floor(), 28.0);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn exploration_cutoff(total_budget_cycles: u32, exploration_budget: f64) -> u32 {
    let raw = f64::from(total_budget_cycles) * exploration_budget;
    (raw + CUTOFF_EPSILON).floor().max(0.0) as u32
}

/// Resolves the acquisition function and parameter for `cycle_number`.
///
/// `total_budget_cycles` is the `max_cycles` of the session's dimensionality.
#[must_use]
pub fn current_params(cycle_number: u32, total_budget_cycles: u32, config: &BoConfig) -> ScheduleParams {
    let phase = if config.adaptive_acquisition
        && cycle_number <= exploration_cutoff(total_budget_cycles, config.exploration_budget)
    {
        SearchPhase::Exploration
    } else {
        SearchPhase::Exploitation
    };

    let value = match (config.acquisition, phase) {
        (AcquisitionKind::ExpectedImprovement, SearchPhase::Exploration) => config.xi_exploration,
        (AcquisitionKind::ExpectedImprovement, SearchPhase::Exploitation) => config.xi_exploitation,
        (AcquisitionKind::UpperConfidenceBound, SearchPhase::Exploration) => {
            config.kappa_exploration
        }
        (AcquisitionKind::UpperConfidenceBound, SearchPhase::Exploitation) => {
            config.kappa_exploitation
        }
    };

    ScheduleParams {
        acquisition: config.acquisition.with_parameter(value),
        phase,
    }
}
