//! Candidate generation and acquisition maximization.
//!
//! The search runs in unit-cube coordinates:
//!
//! 1. **Grid scan**: a dense grid (`grid_points_1d` points for one
//!    ingredient, `grid_points_2d` per axis for two, first ingredient in the
//!    outer loop) followed by the observed points themselves. The first
//!    maximum in that order wins, so results are reproducible.
//! 2. **Local refinement**: a compass search around the winner, starting at
//!    half a grid spacing and halving the step `refinement_steps` times.
//!    Only strictly better points are accepted.
//! 3. **Clamping**: coordinates are mapped back to concentrations and
//!    clamped to each ingredient's range.
//!
//! If every candidate scores the same (e.g. a constant fallback model), the
//! acquisition carries no information and the search falls back to uniform
//! exploration: the grid point farthest from all observations.

use std::time::Instant;

use crate::acquisition::Acquisition;
use crate::config::SearchSettings;
use crate::gp::GaussianProcess;
use crate::gp::sq_dist;
use crate::types::IngredientBound;

/// Candidates between deadline checks during the grid scan.
const DEADLINE_STRIDE: usize = 64;

/// Acquisition spread below which the grid counts as uninformative.
const DEGENERATE_SPREAD: f64 = 1e-12;

/// The selected point with its posterior and acquisition values.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Concentrations in canonical order, clamped to bounds.
    pub concentrations: Vec<f64>,
    /// Posterior mean at the point.
    pub mean: f64,
    /// Posterior standard deviation at the point.
    pub std: f64,
    /// Acquisition value at the point.
    pub acquisition_value: f64,
}

/// Result of one acquisition search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    /// The selected candidate.
    pub best: Candidate,
    /// Number of points scored (grid, observed and refinement).
    pub evaluated: usize,
    /// Largest posterior standard deviation seen during the grid scan.
    pub max_std: f64,
    /// Largest posterior mean seen during the grid scan.
    pub max_mean: f64,
    /// Whether the uniform-exploration fallback picked the point.
    pub degenerate: bool,
    /// Whether the deadline cut the search short.
    pub budget_exhausted: bool,
}

struct Scored {
    unit: Vec<f64>,
    mean: f64,
    std: f64,
    acq: f64,
}

/// Builds the unit-cube grid for `dims` dimensions.
///
/// # Examples
///
/// ```
/// use taste_bo::candidates::unit_grid;
///
/// let grid = unit_grid(2, 3);
/// assert_eq!(grid.len(), 9);
/// assert_eq!(grid[1], vec![0.0, 0.5]);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unit_grid(dims: usize, points_per_axis: usize) -> Vec<Vec<f64>> {
    let n = points_per_axis.max(2);
    let axis: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    match dims {
        0 => Vec::new(),
        1 => axis.iter().map(|&v| vec![v]).collect(),
        _ => {
            let mut grid = vec![Vec::new()];
            for _ in 0..dims {
                grid = grid
                    .into_iter()
                    .flat_map(|prefix| {
                        axis.iter().map(move |&v| {
                            let mut p = prefix.clone();
                            p.push(v);
                            p
                        })
                    })
                    .collect();
            }
            grid
        }
    }
}

/// Finds the point maximizing `acquisition` over the bounded space.
///
/// `observed` holds the training points in unit-cube coordinates; they are
/// scored after the grid so already-sampled regions are never invisible to
/// the search.
#[must_use]
pub fn suggest(
    model: &GaussianProcess,
    bounds: &[IngredientBound],
    acquisition: Acquisition,
    y_best: f64,
    observed: &[Vec<f64>],
    settings: &SearchSettings,
    deadline: Option<Instant>,
) -> SearchResult {
    let dims = bounds.len();
    let per_axis = if dims == 1 {
        settings.grid_points_1d
    } else {
        settings.grid_points_2d
    };
    let grid = unit_grid(dims, per_axis);

    let score = |unit: Vec<f64>| -> Scored {
        let (mean, std) = model.predict_one(&unit);
        let acq = acquisition.score(mean, std, y_best);
        Scored {
            unit,
            mean,
            std,
            acq,
        }
    };

    let scan = grid
        .iter()
        .cloned()
        .chain(observed.iter().map(|p| p.iter().map(|v| v.clamp(0.0, 1.0)).collect::<Vec<f64>>()));

    let mut best: Option<Scored> = None;
    let mut min_acq = f64::INFINITY;
    let mut max_std = f64::NEG_INFINITY;
    let mut max_mean = f64::NEG_INFINITY;
    let mut evaluated = 0;
    let mut budget_exhausted = false;

    for unit in scan {
        if evaluated > 0
            && evaluated % DEADLINE_STRIDE == 0
            && deadline.is_some_and(|d| Instant::now() >= d)
        {
            budget_exhausted = true;
            break;
        }
        let s = score(unit);
        evaluated += 1;
        min_acq = min_acq.min(s.acq);
        max_std = max_std.max(s.std);
        max_mean = max_mean.max(s.mean);
        if best.as_ref().is_none_or(|b| s.acq > b.acq) {
            best = Some(s);
        }
    }

    // `grid` always has at least two points, so the scan scored something.
    let mut best = best.unwrap_or_else(|| score(vec![0.5; dims]));

    let degenerate = best.acq - min_acq <= DEGENERATE_SPREAD;
    if degenerate {
        trace_warn!(evaluated, "acquisition is flat over the grid, exploring uniformly");
        best = score(farthest_from(&grid, observed));
        evaluated += 1;
    } else if !budget_exhausted {
        #[allow(clippy::cast_precision_loss)]
        let spacing = 1.0 / (per_axis.max(2) - 1) as f64;
        let (refined, steps, exhausted) =
            refine(best, spacing * 0.5, settings.refinement_steps, &score, deadline);
        best = refined;
        evaluated += steps;
        budget_exhausted = exhausted;
    }

    if budget_exhausted {
        trace_warn!(evaluated, "candidate search hit its deadline, using best point so far");
    }

    let concentrations = bounds
        .iter()
        .zip(&best.unit)
        .map(|(b, &u)| b.clamp(b.from_unit(u)))
        .collect();

    SearchResult {
        best: Candidate {
            concentrations,
            mean: best.mean,
            std: best.std,
            acquisition_value: best.acq,
        },
        evaluated,
        max_std,
        max_mean,
        degenerate,
        budget_exhausted,
    }
}

/// Compass search around `start`. Returns the refined point, the number of
/// extra evaluations and whether the deadline interrupted it.
fn refine<F>(
    start: Scored,
    initial_step: f64,
    halvings: usize,
    score: &F,
    deadline: Option<Instant>,
) -> (Scored, usize, bool)
where
    F: Fn(Vec<f64>) -> Scored,
{
    let mut best = start;
    let mut step = initial_step;
    let mut evaluated = 0;

    for _ in 0..halvings {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return (best, evaluated, true);
        }
        for dim in 0..best.unit.len() {
            for direction in [1.0, -1.0] {
                let mut unit = best.unit.clone();
                unit[dim] = (unit[dim] + direction * step).clamp(0.0, 1.0);
                if unit[dim] == best.unit[dim] {
                    continue;
                }
                let s = score(unit);
                evaluated += 1;
                if s.acq > best.acq {
                    best = s;
                }
            }
        }
        step *= 0.5;
    }
    (best, evaluated, false)
}

/// The grid point with the largest distance to its nearest observation
/// (first occurrence on ties).
fn farthest_from(grid: &[Vec<f64>], observed: &[Vec<f64>]) -> Vec<f64> {
    let mut best = (f64::NEG_INFINITY, 0);
    for (i, point) in grid.iter().enumerate() {
        let nearest = observed
            .iter()
            .map(|o| sq_dist(point, o))
            .fold(f64::INFINITY, f64::min);
        if nearest > best.0 {
            best = (nearest, i);
        }
    }
    grid.get(best.1).cloned().unwrap_or_default()
}
