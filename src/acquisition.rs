//! Acquisition functions scored from a GP posterior.
//!
//! Responses are preference scores where higher is better, so both
//! functions reward a high posterior mean:
//!
//! - **Expected Improvement**: `EI = (μ - y_best - ξ) Φ(z) + σ φ(z)` with
//!   `z = (μ - y_best - ξ) / σ`, and `EI = 0` where `σ = 0`. A larger `ξ`
//!   pushes the search toward uncertain regions.
//! - **Upper Confidence Bound**: `UCB = μ + κσ`. A larger `κ` explores more.
//!
//! The function name from the protocol is resolved once into an
//! [`Acquisition`] carrying its parameter; the scoring loops only match on
//! that enum.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::stats::{norm_cdf, norm_pdf};

/// Posterior standard deviations below this are treated as zero.
const MIN_STD: f64 = 1e-12;

/// Which acquisition function a session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AcquisitionKind {
    /// Expected Improvement, tuned by `xi`.
    #[cfg_attr(feature = "serde", serde(rename = "ei", alias = "EI"))]
    ExpectedImprovement,
    /// Upper Confidence Bound, tuned by `kappa`.
    #[cfg_attr(feature = "serde", serde(rename = "ucb", alias = "UCB"))]
    UpperConfidenceBound,
}

impl AcquisitionKind {
    /// Short protocol name (`"ei"` or `"ucb"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpectedImprovement => "ei",
            Self::UpperConfidenceBound => "ucb",
        }
    }

    /// Attaches a parameter value (`xi` or `kappa`) to this kind.
    #[must_use]
    pub fn with_parameter(self, value: f64) -> Acquisition {
        match self {
            Self::ExpectedImprovement => Acquisition::ExpectedImprovement { xi: value },
            Self::UpperConfidenceBound => Acquisition::UpperConfidenceBound { kappa: value },
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionKind {
    type Err = Error;

    /// Parses `"ei"` or `"ucb"`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ei" | "expected_improvement" => Ok(Self::ExpectedImprovement),
            "ucb" | "upper_confidence_bound" => Ok(Self::UpperConfidenceBound),
            _ => Err(Error::UnknownAcquisition(s.to_owned())),
        }
    }
}

/// An acquisition function with its parameter resolved for one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Acquisition {
    /// Expected Improvement with exploration margin `xi`.
    ExpectedImprovement {
        /// Required improvement margin.
        xi: f64,
    },
    /// Upper Confidence Bound with exploration weight `kappa`.
    UpperConfidenceBound {
        /// Weight of the posterior standard deviation.
        kappa: f64,
    },
}

impl Acquisition {
    /// The function kind.
    #[must_use]
    pub fn kind(self) -> AcquisitionKind {
        match self {
            Self::ExpectedImprovement { .. } => AcquisitionKind::ExpectedImprovement,
            Self::UpperConfidenceBound { .. } => AcquisitionKind::UpperConfidenceBound,
        }
    }

    /// The `xi` or `kappa` value.
    #[must_use]
    pub fn parameter(self) -> f64 {
        match self {
            Self::ExpectedImprovement { xi } => xi,
            Self::UpperConfidenceBound { kappa } => kappa,
        }
    }

    /// Scores one point from its posterior mean and standard deviation.
    ///
    /// # Examples
    ///
    /// ```
    /// use taste_bo::Acquisition;
    ///
    /// let ucb = Acquisition::UpperConfidenceBound { kappa: 2.0 };
    /// assert_eq!(ucb.score(5.0, 0.5, 7.0), 6.0);
    ///
    /// let ei = Acquisition::ExpectedImprovement { xi: 0.01 };
    /// assert_eq!(ei.score(5.0, 0.0, 7.0), 0.0);
    /// ```
    #[must_use]
    pub fn score(self, mean: f64, std: f64, y_best: f64) -> f64 {
        match self {
            Self::ExpectedImprovement { xi } => expected_improvement(mean, std, y_best, xi),
            Self::UpperConfidenceBound { kappa } => mean + kappa * std,
        }
    }

    /// Scores every point of a candidate set.
    #[must_use]
    pub fn score_all(self, means: &[f64], stds: &[f64], y_best: f64) -> Vec<f64> {
        means
            .iter()
            .zip(stds)
            .map(|(&m, &s)| self.score(m, s, y_best))
            .collect()
    }

    /// The quantity compared against the convergence threshold.
    ///
    /// For EI this is the acquisition value itself. Raw UCB values live on
    /// the response scale, so for UCB it is the optimistic gain over the best
    /// observation, `UCB - y_best`.
    #[must_use]
    pub fn convergence_score(self, acquisition_value: f64, y_best: f64) -> f64 {
        convergence_score(self.kind(), acquisition_value, y_best)
    }
}

pub(crate) fn convergence_score(kind: AcquisitionKind, acquisition_value: f64, y_best: f64) -> f64 {
    match kind {
        AcquisitionKind::ExpectedImprovement => acquisition_value,
        AcquisitionKind::UpperConfidenceBound => acquisition_value - y_best,
    }
}

/// Expected Improvement for maximization.
fn expected_improvement(mean: f64, std: f64, y_best: f64, xi: f64) -> f64 {
    if std < MIN_STD {
        return 0.0;
    }
    let improvement = mean - y_best - xi;
    let z = improvement / std;
    (improvement * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}
