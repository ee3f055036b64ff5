//! The BO session orchestrator.
//!
//! [`propose_next_sample`] is the entry point the session layer calls once
//! per BO cycle. Each call is self-contained: it validates the inputs, fits a
//! fresh GP on the rated observations, resolves the schedule for the cycle,
//! maximizes the acquisition over the candidate grid, classifies convergence
//! and returns a [`Suggestion`]. Nothing is stored between calls.
//!
//! Convergence needs the suggestions of earlier cycles. Callers that persist
//! them pass them to [`propose_with_history`]; otherwise they are replayed
//! from the observation history: the suggestion for a past cycle is
//! recomputed from the observations that preceded it. Only the trailing
//! cycles the detector looks at are replayed (see
//! [`ConvergenceThresholds::history_depth`]), and [`SessionEngine`] caches
//! those replays per session.
//!
//! `budget.deadline` bounds the whole call. The current cycle is computed
//! first; past cycles are then replayed newest first until the deadline
//! passes, and older records are left out of the convergence history.
//!
//! [`ConvergenceThresholds::history_depth`]: crate::ConvergenceThresholds::history_depth
//!
//! [`SessionEngine`]: crate::SessionEngine
//!
//! # Examples
//!
//! ```
//! use taste_bo::{BoConfig, IngredientBound, Observation, propose_next_sample};
//!
//! let bounds = vec![IngredientBound::new("sugar", 0.0, 100.0)];
//! let observations = vec![
//!     Observation::rated(1, [("sugar", 10.0)], 2.0),
//!     Observation::rated(2, [("sugar", 50.0)], 8.0),
//!     Observation::rated(3, [("sugar", 90.0)], 3.0),
//! ];
//! let config = BoConfig::default();
//!
//! let suggestion = propose_next_sample(&observations, &bounds, &config, 4).unwrap();
//! let sugar = suggestion.concentration("sugar").unwrap();
//! assert!((0.0..=100.0).contains(&sugar));
//! ```

#[cfg(feature = "async")]
mod async_impl;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::candidates::{self, SearchResult};
use crate::config::BoConfig;
use crate::convergence::{self, ConvergenceVerdict, SuggestionRecord};
use crate::error::{Error, Result};
use crate::gp::GaussianProcess;
use crate::schedule::{self, ScheduleParams};
use crate::types::{Dimensionality, IngredientBound, Observation, SuggestedConcentration, Suggestion};

#[cfg(feature = "async")]
pub use async_impl::propose_next_sample_async;

/// One observation mapped into the canonical unit-cube frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TrainingPoint {
    pub(crate) cycle: u32,
    pub(crate) unit: Vec<f64>,
    pub(crate) response: Option<f64>,
}

/// Validated inputs of one call.
pub(crate) struct Prepared {
    pub(crate) dims: Dimensionality,
    /// All observations before the requested cycle, in cycle order.
    pub(crate) points: Vec<TrainingPoint>,
}

/// Everything computed for a single cycle.
pub(crate) struct CycleOutcome {
    pub(crate) model: GaussianProcess,
    pub(crate) schedule: ScheduleParams,
    pub(crate) search: SearchResult,
    pub(crate) y_best: f64,
}

/// Proposes the concentrations for `current_cycle`.
///
/// Earlier suggestions needed by the convergence check are replayed from
/// `observations`, newest first and within `budget.deadline`.
///
/// # Errors
///
/// - [`Error::InsufficientData`] when fewer than `min_samples_for_bo` rated
///   observations precede `current_cycle`; the caller should use its
///   fallback sampling mode.
/// - [`Error::IngredientMismatch`], [`Error::InvalidBounds`] and the other
///   precondition variants for inconsistent inputs.
/// - [`Error::InvalidConfig`] / [`Error::InvalidCycle`] for configuration
///   bugs.
pub fn propose_next_sample(
    observations: &[Observation],
    bounds: &[IngredientBound],
    config: &BoConfig,
    current_cycle: u32,
) -> Result<Suggestion> {
    let prepared = prepare(observations, bounds, config, current_cycle)?;
    let deadline = deadline(config);
    let outcome = run_cycle(&prepared, bounds, config, current_cycle, deadline);
    let cycles = convergence_cycles(&prepared, config, current_cycle);
    let history = replay_within(&prepared, bounds, config, &cycles, deadline, |_| None);
    Ok(finish(&prepared, bounds, current_cycle, &outcome, config, history))
}

/// Like [`propose_next_sample`] but uses suggestion records the caller
/// persisted instead of replaying them.
///
/// # Errors
///
/// Same as [`propose_next_sample`].
pub fn propose_with_history(
    observations: &[Observation],
    bounds: &[IngredientBound],
    config: &BoConfig,
    current_cycle: u32,
    history: &[SuggestionRecord],
) -> Result<Suggestion> {
    let prepared = prepare(observations, bounds, config, current_cycle)?;
    let outcome = run_cycle(&prepared, bounds, config, current_cycle, deadline(config));
    Ok(finish(
        &prepared,
        bounds,
        current_cycle,
        &outcome,
        config,
        history.to_vec(),
    ))
}

/// Recomputes the suggestion records of every past cycle that had enough
/// data for BO, in cycle order.
///
/// `budget.deadline` bounds the whole replay; once it passes, the oldest
/// records are missing from the result.
///
/// # Errors
///
/// Returns the same validation errors as [`propose_next_sample`], except
/// that too little data yields an empty history instead of an error.
pub fn replay_history(
    observations: &[Observation],
    bounds: &[IngredientBound],
    config: &BoConfig,
) -> Result<Vec<SuggestionRecord>> {
    let next_cycle = observations
        .iter()
        .map(|o| o.cycle_number)
        .max()
        .map_or(1, |c| c.saturating_add(1));
    let prepared = match prepare(observations, bounds, config, next_cycle) {
        Ok(p) => p,
        Err(Error::InsufficientData { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let cycles = replay_cycles(&prepared, config, next_cycle);
    Ok(replay_within(
        &prepared,
        bounds,
        config,
        &cycles,
        deadline(config),
        |_| None,
    ))
}

/// A fitted surrogate for inspecting the posterior in concentration units.
pub struct Surrogate {
    model: GaussianProcess,
    bounds: Vec<IngredientBound>,
    best_observed: f64,
}

impl Surrogate {
    /// Posterior mean and standard deviation at `concentrations`, given in
    /// canonical ingredient order.
    ///
    /// # Panics
    ///
    /// Panics if `concentrations` does not have one value per ingredient.
    #[must_use]
    pub fn predict(&self, concentrations: &[f64]) -> (f64, f64) {
        assert_eq!(
            concentrations.len(),
            self.bounds.len(),
            "one concentration per ingredient expected"
        );
        let unit: Vec<f64> = self
            .bounds
            .iter()
            .zip(concentrations)
            .map(|(b, &c)| b.to_unit(c))
            .collect();
        self.model.predict_one(&unit)
    }

    /// Posterior at a named concentration map; `None` if an ingredient is missing.
    #[must_use]
    pub fn predict_named(&self, concentrations: &HashMap<String, f64>) -> Option<(f64, f64)> {
        let ordered: Option<Vec<f64>> = self
            .bounds
            .iter()
            .map(|b| concentrations.get(&b.name).copied())
            .collect();
        ordered.map(|c| self.predict(&c))
    }

    /// Best rated response the surrogate was fitted on.
    #[must_use]
    pub fn best_observed(&self) -> f64 {
        self.best_observed
    }

    /// The underlying GP.
    #[must_use]
    pub fn model(&self) -> &GaussianProcess {
        &self.model
    }
}

/// Fits the GP on every rated observation, for dashboards and diagnostics.
///
/// # Errors
///
/// Same validation errors as [`propose_next_sample`].
pub fn fit_surrogate(
    observations: &[Observation],
    bounds: &[IngredientBound],
    config: &BoConfig,
) -> Result<Surrogate> {
    let next_cycle = observations
        .iter()
        .map(|o| o.cycle_number)
        .max()
        .map_or(1, |c| c.saturating_add(1));
    let prepared = prepare(observations, bounds, config, next_cycle)?;
    let (x, y) = training_set(&prepared.points, next_cycle);
    let model = fit_model(&x, &y, config, next_cycle, deadline(config));
    Ok(Surrogate {
        model,
        bounds: bounds.to_vec(),
        best_observed: y.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Validates all inputs and maps observations into the unit cube.
pub(crate) fn prepare(
    observations: &[Observation],
    bounds: &[IngredientBound],
    config: &BoConfig,
    current_cycle: u32,
) -> Result<Prepared> {
    let dims = validate_bounds(bounds)?;
    config.validate()?;
    if current_cycle == 0 {
        return Err(Error::InvalidCycle(current_cycle));
    }

    let mut seen = HashSet::with_capacity(observations.len());
    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let cycle = obs.cycle_number;
        if cycle == 0 {
            return Err(Error::InvalidObservation {
                cycle,
                reason: "cycle numbers start at 1".into(),
            });
        }
        if !seen.insert(cycle) {
            return Err(Error::DuplicateCycle(cycle));
        }
        let unit = canonical_point(obs, bounds)?;
        if let Some(r) = obs.response
            && !r.is_finite()
        {
            return Err(Error::InvalidObservation {
                cycle,
                reason: format!("response {r} is not finite"),
            });
        }
        if cycle >= current_cycle {
            trace_debug!(cycle, current_cycle, "ignoring observation at or after requested cycle");
            continue;
        }
        points.push(TrainingPoint {
            cycle,
            unit,
            response: obs.response,
        });
    }
    points.sort_by_key(|p| p.cycle);

    let available = points.iter().filter(|p| p.response.is_some()).count();
    if available < config.min_samples_for_bo {
        return Err(Error::InsufficientData {
            required: config.min_samples_for_bo,
            available,
        });
    }

    Ok(Prepared { dims, points })
}

fn validate_bounds(bounds: &[IngredientBound]) -> Result<Dimensionality> {
    if bounds.is_empty() {
        return Err(Error::NoIngredients);
    }
    let mut names = HashSet::with_capacity(bounds.len());
    for b in bounds {
        b.validate()?;
        if !names.insert(b.name.as_str()) {
            return Err(Error::DuplicateIngredient(b.name.clone()));
        }
    }
    Dimensionality::from_ingredient_count(bounds.len())
}

/// Orders an observation's concentrations by the bounds, matching by name.
fn canonical_point(obs: &Observation, bounds: &[IngredientBound]) -> Result<Vec<f64>> {
    let matches = obs.concentrations.len() == bounds.len()
        && bounds.iter().all(|b| obs.concentrations.contains_key(&b.name));
    if !matches {
        let mut found: Vec<String> = obs.concentrations.keys().cloned().collect();
        found.sort();
        return Err(Error::IngredientMismatch {
            cycle: obs.cycle_number,
            expected: bounds.iter().map(|b| b.name.clone()).collect(),
            found,
        });
    }

    bounds
        .iter()
        .map(|b| {
            let value = obs.concentrations[&b.name];
            if !value.is_finite() {
                return Err(Error::InvalidObservation {
                    cycle: obs.cycle_number,
                    reason: format!("concentration of '{}' is not finite", b.name),
                });
            }
            if value < b.min_concentration || value > b.max_concentration {
                trace_debug!(
                    cycle = obs.cycle_number,
                    ingredient = %b.name,
                    value,
                    "observed concentration outside bounds"
                );
            }
            Ok(b.to_unit(value))
        })
        .collect()
}

/// Rated points observed before `cycle`.
fn training_set(points: &[TrainingPoint], cycle: u32) -> (Vec<Vec<f64>>, Vec<f64>) {
    points
        .iter()
        .filter(|p| p.cycle < cycle)
        .filter_map(|p| p.response.map(|r| (p.unit.clone(), r)))
        .unzip()
}

/// Deadline of a call starting now.
pub(crate) fn deadline(config: &BoConfig) -> Option<Instant> {
    config.budget.deadline.map(|d| Instant::now() + d)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn fit_model(
    x: &[Vec<f64>],
    y: &[f64],
    config: &BoConfig,
    cycle: u32,
    deadline: Option<Instant>,
) -> GaussianProcess {
    GaussianProcess::fit_until(
        x,
        y,
        &config.kernel,
        config.budget.max_fit_iterations,
        deadline,
        config.search.seed.wrapping_add(u64::from(cycle)),
    )
}

/// Runs fit, schedule and acquisition search for one cycle.
pub(crate) fn run_cycle(
    prepared: &Prepared,
    bounds: &[IngredientBound],
    config: &BoConfig,
    cycle: u32,
    deadline: Option<Instant>,
) -> CycleOutcome {
    let (x, y) = training_set(&prepared.points, cycle);
    let y_best = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let model = fit_model(&x, &y, config, cycle, deadline);
    let total = config.thresholds(prepared.dims).max_cycles;
    let schedule = schedule::current_params(cycle, total, config);
    let search = candidates::suggest(
        &model,
        bounds,
        schedule.acquisition,
        y_best,
        &x,
        &config.search,
        deadline,
    );

    CycleOutcome {
        model,
        schedule,
        search,
        y_best,
    }
}

fn record(outcome: &CycleOutcome, cycle: u32) -> SuggestionRecord {
    SuggestionRecord {
        cycle,
        concentrations: outcome.search.best.concentrations.clone(),
        predicted_value: outcome.search.best.mean,
        uncertainty: outcome.search.best.std,
        acquisition_value: outcome.search.best.acquisition_value,
        acquisition: outcome.schedule.acquisition.kind(),
        best_observed: outcome.y_best,
    }
}

/// Cycles before `current_cycle` whose suggestion would have come from BO.
pub(crate) fn replay_cycles(prepared: &Prepared, config: &BoConfig, current_cycle: u32) -> Vec<u32> {
    let mut rated_before = 0;
    let mut cycles = Vec::new();
    for p in &prepared.points {
        if p.cycle >= current_cycle {
            break;
        }
        if rated_before >= config.min_samples_for_bo {
            cycles.push(p.cycle);
        }
        if p.response.is_some() {
            rated_before += 1;
        }
    }
    cycles
}

/// The trailing [`replay_cycles`] the convergence detector reads for
/// `current_cycle`.
pub(crate) fn convergence_cycles(
    prepared: &Prepared,
    config: &BoConfig,
    current_cycle: u32,
) -> Vec<u32> {
    let mut cycles = replay_cycles(prepared, config, current_cycle);
    let keep = config
        .thresholds(prepared.dims)
        .history_depth()
        .saturating_sub(1);
    cycles.drain(..cycles.len().saturating_sub(keep));
    cycles
}

/// Replays `cycles` newest first, taking records from `cached` where it has
/// them. Once `deadline` passes, the first uncached cycle and everything
/// older are dropped, so the result is always a contiguous tail.
pub(crate) fn replay_within<F>(
    prepared: &Prepared,
    bounds: &[IngredientBound],
    config: &BoConfig,
    cycles: &[u32],
    deadline: Option<Instant>,
    mut cached: F,
) -> Vec<SuggestionRecord>
where
    F: FnMut(u32) -> Option<SuggestionRecord>,
{
    let mut history = Vec::with_capacity(cycles.len());
    for &cycle in cycles.iter().rev() {
        let entry = match cached(cycle) {
            Some(hit) => hit,
            None if expired(deadline) => {
                trace_warn!(
                    cycle,
                    dropped = cycles.len() - history.len(),
                    "deadline reached, convergence history truncated"
                );
                break;
            }
            None => record(&run_cycle(prepared, bounds, config, cycle, deadline), cycle),
        };
        history.push(entry);
    }
    history.reverse();
    history
}

/// Classifies convergence and assembles the suggestion for `current_cycle`.
pub(crate) fn finish(
    prepared: &Prepared,
    bounds: &[IngredientBound],
    current_cycle: u32,
    outcome: &CycleOutcome,
    config: &BoConfig,
    mut history: Vec<SuggestionRecord>,
) -> Suggestion {
    history.retain(|r| r.cycle < current_cycle);
    history.push(record(outcome, current_cycle));

    let convergence = convergence::assess(&history, config, current_cycle, prepared.dims);
    let best = &outcome.search.best;
    let kernel = outcome.model.kernel();

    trace_info!(
        cycle = current_cycle,
        phase = ?outcome.schedule.phase,
        acquisition = %outcome.schedule.acquisition.kind(),
        predicted = best.mean,
        uncertainty = best.std,
        verdict = ?convergence.verdict,
        "bo suggestion computed"
    );

    Suggestion {
        cycle: current_cycle,
        concentrations: bounds
            .iter()
            .zip(&best.concentrations)
            .map(|(b, &value)| SuggestedConcentration {
                ingredient: b.name.clone(),
                value,
            })
            .collect(),
        predicted_value: best.mean,
        uncertainty: best.std,
        acquisition_value: best.acquisition_value,
        best_observed: outcome.y_best,
        acquisition_function: outcome.schedule.acquisition.kind(),
        acquisition_parameter: outcome.schedule.acquisition.parameter(),
        phase: outcome.schedule.phase,
        converged: convergence.verdict == ConvergenceVerdict::SuggestStop,
        convergence,
        model_quality: outcome.model.quality(),
        kernel_amplitude: kernel.map_or(f64::NAN, |k| k.amplitude),
        kernel_length_scale: kernel.map_or(f64::NAN, |k| k.length_scale),
    }
}
