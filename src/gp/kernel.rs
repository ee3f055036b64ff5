//! Constant-scaled RBF covariance.

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Constant-scaled squared-exponential (RBF) kernel.
///
/// `k(a, b) = c · exp(-‖a - b‖² / (2ℓ²))`
///
/// `c` is the amplitude and `ℓ` the isotropic length scale, both positive.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RbfKernel {
    /// Constant amplitude `c`.
    pub amplitude: f64,
    /// Length scale `ℓ`.
    pub length_scale: f64,
}

impl RbfKernel {
    /// Creates a kernel from its amplitude and length scale.
    #[must_use]
    pub fn new(amplitude: f64, length_scale: f64) -> Self {
        Self {
            amplitude,
            length_scale,
        }
    }

    /// Builds a kernel from log-space parameters `(ln c, ln ℓ)`.
    pub(crate) fn from_log(theta: [f64; 2]) -> Self {
        Self::new(theta[0].exp(), theta[1].exp())
    }

    /// Covariance between two points.
    #[must_use]
    pub fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        self.from_sq_dist(sq_dist(a, b))
    }

    fn from_sq_dist(&self, d2: f64) -> f64 {
        self.amplitude * (-0.5 * d2 / (self.length_scale * self.length_scale)).exp()
    }

    /// Signal covariance matrix `K` (no noise) from precomputed squared distances.
    pub(crate) fn matrix(&self, sq_dists: &DMatrix<f64>) -> DMatrix<f64> {
        sq_dists.map(|d2| self.from_sq_dist(d2))
    }

    /// Covariance vector `k(x*, X)`.
    pub(crate) fn vector(&self, x_star: &[f64], x_train: &[Vec<f64>]) -> DVector<f64> {
        DVector::from_fn(x_train.len(), |i, _| self.eval(x_star, &x_train[i]))
    }

    /// Gradients of `K` with respect to `ln c` and `ln ℓ`.
    ///
    /// `∂K/∂ln c = K` and `∂K/∂ln ℓ = K ∘ D / ℓ²`, where `D` holds the
    /// squared distances.
    pub(crate) fn log_gradients(
        &self,
        signal: &DMatrix<f64>,
        sq_dists: &DMatrix<f64>,
    ) -> [DMatrix<f64>; 2] {
        let inv_l2 = 1.0 / (self.length_scale * self.length_scale);
        let d_length = signal.zip_map(sq_dists, |k, d2| k * d2 * inv_l2);
        [signal.clone(), d_length]
    }
}

/// Squared Euclidean distance.
pub(crate) fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Pairwise squared distances between training points.
pub(crate) fn pairwise_sq_dists(x: &[Vec<f64>]) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| sq_dist(&x[i], &x[j]))
}
