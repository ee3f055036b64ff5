#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Adaptive Bayesian optimization for taste-preference experiments.
//!
//! A panel session tastes one sample per cycle and rates it. Once a few
//! samples are rated, this crate fits a Gaussian-process surrogate of the
//! preference surface over one or two ingredient concentrations, picks the
//! next sample with Expected Improvement or Upper Confidence Bound, shifts
//! from exploration to exploitation as the session progresses, and tells
//! the caller when the search has converged.
//!
//! Every call is stateless: the caller owns the observations and passes them
//! in full each cycle.
//!
//! # Getting Started
//!
//! ```
//! use taste_bo::prelude::*;
//!
//! let bounds = vec![
//!     IngredientBound::new("sugar", 0.0, 60.0),
//!     IngredientBound::new("citric_acid", 0.0, 5.0),
//! ];
//! let observations = vec![
//!     Observation::rated(1, [("sugar", 10.0), ("citric_acid", 1.0)], 3.0),
//!     Observation::rated(2, [("sugar", 30.0), ("citric_acid", 2.5)], 7.0),
//!     Observation::rated(3, [("sugar", 50.0), ("citric_acid", 4.0)], 4.0),
//!     Observation::rated(4, [("sugar", 25.0), ("citric_acid", 1.5)], 6.5),
//! ];
//! let config = BoConfig::default();
//!
//! let suggestion = propose_next_sample(&observations, &bounds, &config, 5)?;
//! for (name, value) in suggestion.display_concentrations() {
//!     println!("{name}: {value}");
//! }
//! if config.stopping_mode.action(suggestion.verdict()) == StopAction::PromptModerator {
//!     println!("the search looks converged");
//! }
//! # Ok::<(), taste_bo::Error>(())
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Observation`] | One tasted sample, with its rating once given. |
//! | [`IngredientBound`] | Concentration range of an ingredient; their order is the canonical dimension order. |
//! | [`BoConfig`] | Acquisition choice, schedule, kernel and convergence settings. |
//! | [`Suggestion`] | Next concentrations plus the model's prediction, uncertainty and convergence report. |
//! | [`SessionEngine`] | Caches replayed cycles per session so repeated calls stay cheap. |
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gp`] | Gaussian-process regressor with a constant-scaled RBF kernel. |
//! | [`acquisition`] | Expected Improvement and Upper Confidence Bound. |
//! | [`schedule`] | Exploration/exploitation schedule. |
//! | [`candidates`] | Candidate grid and acquisition maximization. |
//! | [`convergence`] | Convergence state machine. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) for fits, fallbacks and suggestions | on |
//! | `serde` | `Serialize`/`Deserialize` on public types; load [`BoConfig`] from JSON/TOML | off |
//! | `async` | `propose_next_sample_async`, running the engine on tokio's blocking pool | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod candidates;
mod config;
pub mod convergence;
mod engine;
mod error;
pub mod gp;
pub mod schedule;
mod session;
mod stats;
mod types;

pub use acquisition::{Acquisition, AcquisitionKind};
pub use config::{
    BoConfig, BoConfigBuilder, ConvergenceThresholds, KernelParams, SearchSettings, SoftBudget,
    StopAction, StoppingMode,
};
pub use convergence::{ConvergenceReport, ConvergenceState, ConvergenceVerdict, SuggestionRecord};
#[cfg(feature = "async")]
pub use engine::propose_next_sample_async;
pub use engine::{
    Surrogate, fit_surrogate, propose_next_sample, propose_with_history, replay_history,
};
pub use error::{Error, Result};
pub use gp::ModelQuality;
pub use session::SessionEngine;
pub use types::{
    Dimensionality, IngredientBound, Observation, SearchPhase, SuggestedConcentration, Suggestion,
};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use taste_bo::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "async")]
    pub use crate::engine::propose_next_sample_async;
    pub use crate::engine::{propose_next_sample, propose_with_history};
    pub use crate::error::{Error, Result};
    pub use crate::{
        AcquisitionKind, BoConfig, ConvergenceVerdict, IngredientBound, Observation, SessionEngine,
        StopAction, StoppingMode, Suggestion,
    };
}
