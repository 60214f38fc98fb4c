//! Numeric inversion shared by all non-trivial distortion models.
//!
//! None of the models has a closed-form inverse in general. Starting from the
//! distorted point itself, the estimate is repeatedly pushed back by the
//! residual between its forward image and the target. For the small distortion
//! magnitudes of real lenses the forward Jacobian is close to the identity and
//! the iteration contracts quickly; for extreme coefficients it may not, in
//! which case the best estimate seen is returned.

use log::debug;
use nalgebra::Vector2;

/// Convergence threshold on the squared residual norm.
pub const INVERSE_TOLERANCE: f64 = 1e-12;

/// Upper bound on forward evaluations per inversion.
pub const INVERSE_MAX_ITERATIONS: usize = 100;

/// Result of [`solve_inverse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseSolution {
    /// Ideal point estimate.
    pub point: Vector2<f64>,
    /// Number of corrections applied.
    pub iterations: usize,
    /// Squared norm of `forward(point) - target`.
    pub squared_residual: f64,
    /// `true` if the residual fell below [`INVERSE_TOLERANCE`].
    pub converged: bool,
}

/// Finds `x` with `forward(x) == target` by fixed-point refinement.
///
/// Never fails: on non-convergence or non-finite residuals the estimate with
/// the smallest residual is returned with `converged` set to `false`.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::inverse::solve_inverse;
/// use nalgebra::Vector2;
///
/// let target = Vector2::new(0.3, -0.2);
/// let solution = solve_inverse(&target, |p| p * (1.0 + 0.01 * p.norm_squared()));
/// assert!(solution.converged);
/// assert!((solution.point * (1.0 + 0.01 * solution.point.norm_squared()) - target).norm() < 1e-6);
/// ```
pub fn solve_inverse<F>(target: &Vector2<f64>, forward: F) -> InverseSolution
where
    F: Fn(&Vector2<f64>) -> Vector2<f64>,
{
    let mut point = *target;
    let mut best_point = point;
    let mut best_residual = f64::INFINITY;
    let mut iterations = 0;

    while iterations < INVERSE_MAX_ITERATIONS {
        let residual = forward(&point) - target;
        let squared_residual = residual.norm_squared();

        if !squared_residual.is_finite() {
            break;
        }

        if squared_residual < best_residual {
            best_point = point;
            best_residual = squared_residual;
        }

        if squared_residual < INVERSE_TOLERANCE {
            return InverseSolution {
                point,
                iterations,
                squared_residual,
                converged: true,
            };
        }

        point -= residual;
        iterations += 1;
    }

    debug!(
        "Inverse distortion of ({}, {}) did not converge after {} iterations, residual {}",
        target.x, target.y, iterations, best_residual
    );

    InverseSolution {
        point: best_point,
        iterations,
        squared_residual: best_residual,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_converges_immediately() {
        let target = Vector2::new(0.7, -0.4);
        let solution = solve_inverse(&target, |p| *p);
        assert!(solution.converged);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.point, target);
    }

    #[test]
    fn test_barrel_distortion() {
        let k1 = -0.05;
        let forward = |p: &Vector2<f64>| p * (1.0 + k1 * p.norm_squared());
        let ideal = Vector2::new(0.8, 0.6);
        let solution = solve_inverse(&forward(&ideal), forward);

        assert!(solution.converged);
        assert!(solution.iterations > 0);
        assert!(solution.squared_residual < INVERSE_TOLERANCE);
        assert_abs_diff_eq!(solution.point.x, ideal.x, epsilon = 1e-5);
        assert_abs_diff_eq!(solution.point.y, ideal.y, epsilon = 1e-5);
    }

    #[test]
    fn test_divergence_returns_best_estimate() {
        // Slope 3 makes every correction overshoot further.
        let forward = |p: &Vector2<f64>| p * 3.0;
        let target = Vector2::new(0.3, 0.0);
        let solution = solve_inverse(&target, forward);

        assert!(!solution.converged);
        assert_eq!(solution.point, target);
        assert!(solution.point.x.is_finite());
    }

    #[test]
    fn test_non_finite_target_stops() {
        let target = Vector2::new(f64::NAN, 0.0);
        let solution = solve_inverse(&target, |p| *p);
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 0);
    }
}
