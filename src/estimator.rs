//! Tone parameter estimation against a graded reference image.
//!
//! [`ParameterEstimator`] recovers the (brightness, contrast, gamma) triple
//! that best maps an original image onto its manually graded counterpart.
//! Matched pixel values are filtered to exclude clipped extremes, capped by
//! seeded subsampling, and fitted by damped least squares inside the
//! parameter box, starting from the identity transform.

use nanorand::{Pcg64, Rng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::{ensure_same_size, ImageData};
use crate::tone::{tone_value, ToneParameters};

/// Box bounds for (brightness, contrast, gamma) during fitting.
pub const PARAM_BOUNDS: [(f64, f64); 3] = [(-50.0, 50.0), (0.5, 2.0), (0.5, 2.5)];

/// Pixel pairs are usable only when both sides lie strictly inside this range.
const USABLE_MIN: u8 = 5;
const USABLE_MAX: u8 = 250;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e10;
const GRAD_TOL: f64 = 1e-9;
const STEP_TOL: f64 = 1e-10;
const OBJECTIVE_TOL: f64 = 1e-10;

/// Outcome of a parameter fit.
///
/// The best iterate is always returned, converged or not; callers that care
/// can inspect the diagnostics instead of relying on an error path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitReport {
    /// Best-fit parameters found.
    pub params: ToneParameters,
    /// Mean squared error at the returned parameters.
    pub objective: f64,
    /// Number of optimizer iterations performed.
    pub iterations: usize,
    /// Whether a convergence tolerance was met before the iteration cap.
    pub converged: bool,
    /// Number of pixel pairs the fit ran on, after filtering and subsampling.
    pub samples: usize,
}

/// Bounded least-squares estimator for tone parameters.
///
/// Stateless apart from configuration; safe to share across threads.
#[derive(Debug, Clone)]
pub struct ParameterEstimator {
    max_samples: usize,
    max_iterations: usize,
    seed: u64,
}

impl Default for ParameterEstimator {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            max_iterations: 100,
            seed: 0,
        }
    }
}

impl ParameterEstimator {
    /// Create an estimator with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RNG seed used for pixel subsampling.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cap the number of pixel pairs used for fitting. A cap of 0 disables
    /// subsampling.
    #[must_use]
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set the optimizer iteration cap.
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fit tone parameters mapping `original` onto `ideal`.
    ///
    /// Both images must share dimensions; resampling to common dimensions is
    /// the caller's responsibility and is done once at dataset preparation
    /// time. Returns [`Error::NoUsablePixels`] when every pixel pair falls in
    /// the clipped extremes.
    pub fn estimate(&self, original: &ImageData, ideal: &ImageData) -> Result<FitReport> {
        ensure_same_size(original, ideal)?;

        let xs = original.to_rgb8_vec();
        let ys = ideal.to_rgb8_vec();
        let mut pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys.iter())
            .filter(|&(&x, &y)| {
                x > USABLE_MIN && x < USABLE_MAX && y > USABLE_MIN && y < USABLE_MAX
            })
            .map(|(&x, &y)| (f64::from(x), f64::from(y)))
            .collect();

        if pairs.is_empty() {
            return Err(Error::NoUsablePixels);
        }
        self.subsample(&mut pairs);

        Ok(self.fit(&pairs))
    }

    /// Uniform subsample without replacement, in place.
    fn subsample(&self, pairs: &mut Vec<(f64, f64)>) {
        if self.max_samples == 0 || pairs.len() <= self.max_samples {
            return;
        }
        let mut rng = Pcg64::new_seed(u128::from(self.seed));
        for i in 0..self.max_samples {
            let j = i + rng.generate_range(0..pairs.len() - i);
            pairs.swap(i, j);
        }
        pairs.truncate(self.max_samples);
    }

    /// Levenberg-Marquardt fit from the identity point, clamped to the box.
    fn fit(&self, pairs: &[(f64, f64)]) -> FitReport {
        let mut params = ToneParameters::identity().to_array();
        clamp_to_bounds(&mut params);

        let mut objective = mse(pairs, &params);
        let mut best = params;
        let mut best_objective = objective;
        let mut lambda = LAMBDA_INIT;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 1..=self.max_iterations {
            iterations = iter;
            let (gradient, hessian) = normal_equations(pairs, &params);

            let grad_norm = gradient.iter().fold(0.0f64, |m, g| m.max(g.abs()));
            if grad_norm < GRAD_TOL {
                converged = true;
                break;
            }

            // Retry with stronger damping until the objective improves
            let mut accepted = false;
            while lambda < LAMBDA_MAX {
                let mut damped = hessian;
                for i in 0..3 {
                    damped[i][i] += lambda * hessian[i][i].max(1.0);
                }

                let Some(step) = solve3(&damped, &[-gradient[0], -gradient[1], -gradient[2]])
                else {
                    lambda *= 10.0;
                    continue;
                };

                let mut candidate = [
                    params[0] + step[0],
                    params[1] + step[1],
                    params[2] + step[2],
                ];
                clamp_to_bounds(&mut candidate);

                let candidate_objective = mse(pairs, &candidate);
                if candidate_objective < objective {
                    let improvement = objective - candidate_objective;
                    let step_norm = (0..3)
                        .map(|i| (candidate[i] - params[i]).abs())
                        .fold(0.0f64, f64::max);

                    params = candidate;
                    objective = candidate_objective;
                    lambda = (lambda * 0.3).max(1e-12);
                    accepted = true;

                    if objective < best_objective {
                        best = params;
                        best_objective = objective;
                    }
                    if improvement < OBJECTIVE_TOL * objective.max(1.0) || step_norm < STEP_TOL {
                        converged = true;
                    }
                    break;
                }
                lambda *= 10.0;
            }

            // Damping exhausted without improvement: keep the best iterate
            if !accepted || converged {
                break;
            }
        }

        FitReport {
            params: ToneParameters::from_array(best),
            objective: best_objective,
            iterations,
            converged,
            samples: pairs.len(),
        }
    }
}

/// Mean squared error of the forward model over the pairs.
fn mse(pairs: &[(f64, f64)], params: &[f64; 3]) -> f64 {
    let p = ToneParameters::from_array(*params);
    pairs
        .iter()
        .map(|&(x, y)| {
            let r = tone_value(x, &p) - y;
            r * r
        })
        .sum::<f64>()
        / pairs.len() as f64
}

/// Mean-basis gradient and Gauss-Newton hessian of the squared error.
///
/// Pixels whose normalized value is clamped contribute zero gradient.
fn normal_equations(pairs: &[(f64, f64)], params: &[f64; 3]) -> ([f64; 3], [[f64; 3]; 3]) {
    let p = ToneParameters::from_array(*params);
    let mut g = [0.0f64; 3];
    let mut h = [[0.0f64; 3]; 3];

    for &(x, y) in pairs {
        let u = (x * p.contrast + p.brightness) / 255.0;
        if u <= 1e-12 || u >= 1.0 {
            continue;
        }
        let f = u.powf(p.gamma) * 255.0;
        let r = f - y;
        let ug1 = u.powf(p.gamma - 1.0);
        // d f / d (brightness, contrast, gamma)
        let d = [p.gamma * ug1, p.gamma * ug1 * x, f * u.ln()];
        for i in 0..3 {
            g[i] += r * d[i];
            for j in i..3 {
                h[i][j] += d[i] * d[j];
            }
        }
    }

    let n = pairs.len() as f64;
    for i in 0..3 {
        g[i] /= n;
        for j in i..3 {
            h[i][j] /= n;
        }
    }
    for i in 0..3 {
        for j in 0..i {
            h[i][j] = h[j][i];
        }
    }
    (g, h)
}

fn clamp_to_bounds(params: &mut [f64; 3]) {
    for (p, (lo, hi)) in params.iter_mut().zip(PARAM_BOUNDS) {
        *p = p.clamp(lo, hi);
    }
}

/// Solve a 3x3 linear system by Gaussian elimination with partial pivoting.
fn solve3(a: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let mut m = [[0.0f64; 4]; 3];
    for i in 0..3 {
        m[i][..3].copy_from_slice(&a[i]);
        m[i][3] = b[i];
    }

    for col in 0..3 {
        let mut pivot = col;
        for row in col + 1..3 {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < 1e-30 {
            return None;
        }
        m.swap(col, pivot);

        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; 3];
    for i in (0..3).rev() {
        let mut sum = m[i][3];
        for k in i + 1..3 {
            sum -= m[i][k] * x[k];
        }
        x[i] = sum / m[i][i];
    }
    Some(x)
}
