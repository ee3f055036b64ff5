//! Core data types exchanged with the caller.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acquisition::AcquisitionKind;
use crate::convergence::{ConvergenceReport, ConvergenceVerdict};
use crate::error::{Error, Result};
use crate::gp::ModelQuality;

/// One completed (or pending) experiment cycle.
///
/// `response` is `None` while the subject has not rated the sample yet;
/// such observations are validated but excluded from the training set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Positive cycle number, unique within a session.
    pub cycle_number: u32,
    /// Concentration per ingredient name.
    pub concentrations: HashMap<String, f64>,
    /// Preference score; higher is better.
    pub response: Option<f64>,
}

impl Observation {
    /// Creates a rated observation.
    ///
    /// # Examples
    ///
    /// ```
    /// use taste_bo::Observation;
    ///
    /// let obs = Observation::rated(1, [("sugar", 12.5), ("salt", 3.0)], 6.0);
    /// assert_eq!(obs.concentrations["sugar"], 12.5);
    /// assert_eq!(obs.response, Some(6.0));
    /// ```
    pub fn rated<I, S>(cycle_number: u32, concentrations: I, response: f64) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            cycle_number,
            concentrations: collect_concentrations(concentrations),
            response: Some(response),
        }
    }

    /// Creates an observation that has been tasted but not rated yet.
    pub fn unrated<I, S>(cycle_number: u32, concentrations: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            cycle_number,
            concentrations: collect_concentrations(concentrations),
            response: None,
        }
    }

    /// Returns `true` if the observation carries a response.
    #[must_use]
    pub fn is_rated(&self) -> bool {
        self.response.is_some()
    }
}

fn collect_concentrations<I, S>(concentrations: I) -> HashMap<String, f64>
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    concentrations
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}

/// Concentration range of one ingredient.
///
/// The order of bounds passed to the engine defines the canonical dimension
/// order for training data and candidates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IngredientBound {
    /// Ingredient name, unique within a session.
    pub name: String,
    /// Lowest concentration the protocol allows.
    pub min_concentration: f64,
    /// Highest concentration the protocol allows.
    pub max_concentration: f64,
}

impl IngredientBound {
    /// Creates a new bound. Validity is checked by the engine, not here.
    pub fn new(name: impl Into<String>, min_concentration: f64, max_concentration: f64) -> Self {
        Self {
            name: name.into(),
            min_concentration,
            max_concentration,
        }
    }

    /// Checks that the range is finite and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `min >= max` or either end is not
    /// finite.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = (self.min_concentration, self.max_concentration);
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(Error::InvalidBounds {
                name: self.name.clone(),
                min,
                max,
            });
        }
        Ok(())
    }

    /// Width of the range.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max_concentration - self.min_concentration
    }

    /// Clamps a concentration into the range.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_concentration, self.max_concentration)
    }

    /// Maps a concentration to `[0, 1]` (values outside the range map
    /// outside the unit interval).
    #[must_use]
    pub fn to_unit(&self, value: f64) -> f64 {
        (value - self.min_concentration) / self.span()
    }

    /// Maps a unit-interval coordinate back to a concentration.
    #[must_use]
    pub fn from_unit(&self, unit: f64) -> f64 {
        self.min_concentration + unit * self.span()
    }
}

/// Size of the search space, selecting which convergence thresholds apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Dimensionality {
    /// A single ingredient.
    One,
    /// Two ingredients.
    Two,
}

impl Dimensionality {
    /// Derives the dimensionality from the number of active ingredients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoIngredients`] for zero ingredients and
    /// [`Error::UnsupportedDimensionality`] for three or more.
    pub fn from_ingredient_count(count: usize) -> Result<Self> {
        match count {
            0 => Err(Error::NoIngredients),
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            n => Err(Error::UnsupportedDimensionality(n)),
        }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dims(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Which half of the adaptive schedule a cycle falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchPhase {
    /// Early cycles: favour uncertain regions.
    Exploration,
    /// Later cycles (or non-adaptive sessions): favour the predicted optimum.
    Exploitation,
}

/// One ingredient's proposed concentration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SuggestedConcentration {
    /// Ingredient name.
    pub ingredient: String,
    /// Concentration at full internal precision.
    pub value: f64,
}

impl SuggestedConcentration {
    /// The value rounded to one decimal place for display.
    #[must_use]
    pub fn display_value(&self) -> f64 {
        (self.value * 10.0).round() / 10.0
    }
}

/// The engine's proposal for the next cycle.
///
/// Nothing here is persisted by the engine; the caller decides whether to
/// show, override or store it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Suggestion {
    /// Cycle the suggestion was computed for.
    pub cycle: u32,
    /// Proposed concentrations in canonical ingredient order, clamped to bounds.
    pub concentrations: Vec<SuggestedConcentration>,
    /// GP posterior mean at the proposed point, in response units.
    pub predicted_value: f64,
    /// GP posterior standard deviation at the proposed point.
    pub uncertainty: f64,
    /// Acquisition value at the proposed point.
    pub acquisition_value: f64,
    /// Best rated response in the training set.
    pub best_observed: f64,
    /// Acquisition function active this cycle.
    pub acquisition_function: AcquisitionKind,
    /// The `xi` (EI) or `kappa` (UCB) value active this cycle.
    pub acquisition_parameter: f64,
    /// Schedule phase of this cycle.
    pub phase: SearchPhase,
    /// Advisory convergence flag; `true` when the detector suggests stopping.
    pub converged: bool,
    /// Full convergence assessment.
    pub convergence: ConvergenceReport,
    /// How trustworthy the surrogate fit was.
    pub model_quality: ModelQuality,
    /// Fitted kernel amplitude (constant term).
    pub kernel_amplitude: f64,
    /// Fitted RBF length scale, in unit-cube coordinates.
    pub kernel_length_scale: f64,
}

impl Suggestion {
    /// Concentration for `ingredient`, if present.
    #[must_use]
    pub fn concentration(&self, ingredient: &str) -> Option<f64> {
        self.concentrations
            .iter()
            .find(|c| c.ingredient == ingredient)
            .map(|c| c.value)
    }

    /// Concentrations keyed by ingredient name, the same shape as
    /// [`Observation::concentrations`].
    #[must_use]
    pub fn concentration_map(&self) -> HashMap<String, f64> {
        self.concentrations
            .iter()
            .map(|c| (c.ingredient.clone(), c.value))
            .collect()
    }

    /// Concentrations rounded to one decimal place, in canonical order.
    #[must_use]
    pub fn display_concentrations(&self) -> Vec<(String, f64)> {
        self.concentrations
            .iter()
            .map(|c| (c.ingredient.clone(), c.display_value()))
            .collect()
    }

    /// The `xi` used, if the acquisition was Expected Improvement.
    #[must_use]
    pub fn xi_used(&self) -> Option<f64> {
        (self.acquisition_function == AcquisitionKind::ExpectedImprovement)
            .then_some(self.acquisition_parameter)
    }

    /// The `kappa` used, if the acquisition was Upper Confidence Bound.
    #[must_use]
    pub fn kappa_used(&self) -> Option<f64> {
        (self.acquisition_function == AcquisitionKind::UpperConfidenceBound)
            .then_some(self.acquisition_parameter)
    }

    /// The convergence verdict.
    #[must_use]
    pub fn verdict(&self) -> ConvergenceVerdict {
        self.convergence.verdict
    }
}
