/// Errors returned by the engine.
///
/// Variants fall into two groups. *Precondition* errors
/// ([`is_precondition`](Error::is_precondition)) are expected during normal
/// operation and tell the caller to fall back to its non-BO sampling mode.
/// Everything else is a configuration bug on the caller's side and should be
/// surfaced loudly.
///
/// Numerical trouble inside the GP fit or the candidate search never shows
/// up here: those paths degrade to best-effort results instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when fewer rated observations exist than `min_samples_for_bo`.
    #[error("insufficient data: {available} rated observations, BO needs at least {required}")]
    InsufficientData {
        /// The configured `min_samples_for_bo`.
        required: usize,
        /// The number of rated observations supplied.
        available: usize,
    },

    /// Returned when an observation's ingredient names differ from the
    /// session's ingredient bounds.
    #[error(
        "ingredient mismatch in cycle {cycle}: expected {expected:?}, found {found:?}"
    )]
    IngredientMismatch {
        /// Cycle number of the offending observation.
        cycle: u32,
        /// Ingredient names from the bounds, in canonical order.
        expected: Vec<String>,
        /// Ingredient names present in the observation, sorted.
        found: Vec<String>,
    },

    /// Returned when an ingredient's minimum is not strictly below its maximum
    /// or either bound is not finite.
    #[error("invalid bounds for '{name}': min ({min}) must be less than max ({max})")]
    InvalidBounds {
        /// The ingredient name.
        name: String,
        /// The configured minimum concentration.
        min: f64,
        /// The configured maximum concentration.
        max: f64,
    },

    /// Returned when two ingredient bounds share a name.
    #[error("duplicate ingredient '{0}' in bounds")]
    DuplicateIngredient(String),

    /// Returned when no ingredient bounds are supplied.
    #[error("at least one ingredient bound is required")]
    NoIngredients,

    /// Returned when BO is requested for more ingredients than it supports.
    #[error("BO supports 1 or 2 ingredients, got {0}")]
    UnsupportedDimensionality(usize),

    /// Returned when two observations share a cycle number.
    #[error("duplicate cycle number {0} in observation history")]
    DuplicateCycle(u32),

    /// Returned when an observation carries a non-finite value or a zero
    /// cycle number.
    #[error("invalid observation in cycle {cycle}: {reason}")]
    InvalidObservation {
        /// Cycle number of the offending observation.
        cycle: u32,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when an acquisition function name is not recognised.
    #[error("unsupported acquisition function '{0}' (expected \"ei\" or \"ucb\")")]
    UnknownAcquisition(String),

    /// Returned when a configuration field is out of its valid range.
    #[error("invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when the requested cycle number is zero.
    #[error("invalid cycle number {0}: cycles start at 1")]
    InvalidCycle(u32),

    /// Returned when a spawned blocking task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),
}

impl Error {
    /// Whether this error is an expected precondition miss.
    ///
    /// Callers should react to these by switching to the protocol's fallback
    /// sampling mode rather than reporting a failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use taste_bo::Error;
    ///
    /// let err = Error::InsufficientData { required: 3, available: 1 };
    /// assert!(err.is_precondition());
    /// assert!(!Error::UnknownAcquisition("pi".into()).is_precondition());
    /// ```
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::IngredientMismatch { .. }
                | Self::InvalidBounds { .. }
                | Self::DuplicateIngredient(_)
                | Self::NoIngredients
                | Self::UnsupportedDimensionality(_)
                | Self::DuplicateCycle(_)
                | Self::InvalidObservation { .. }
        )
    }
}

pub type Result<T> = core::result::Result<T, Error>;

pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        field,
        reason: reason.into(),
    }
}
