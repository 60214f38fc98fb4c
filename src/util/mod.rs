//! Diagnostics for distortion models: sample grids and round-trip error
//! statistics.

use crate::distortion::DistortionModel;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Zero sample points")]
    ZeroPoints,
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
}

/// Summary of the distances between sample points and their
/// `undistort(distort(p))` images.
#[derive(Clone, Serialize, Deserialize)]
pub struct RoundTripError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for RoundTripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Round Trip Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

/// Generates a regular grid of `per_axis * per_axis` points covering
/// `[min, max] x [min, max]`, both bounds included.
///
/// # Arguments
///
/// * `min` - Lower bound of both coordinates
/// * `max` - Upper bound of both coordinates
/// * `per_axis` - Number of samples along each axis
///
/// # Returns
///
/// The grid points in row-major order. A single sample per axis yields the
/// centre of the range.
pub fn sample_grid(min: f64, max: f64, per_axis: usize) -> Vec<Vector2<f64>> {
    let mut points = Vec::with_capacity(per_axis.saturating_mul(per_axis));
    if per_axis == 0 {
        return points;
    }

    let coordinate = |i: usize| {
        if per_axis == 1 {
            0.5 * (min + max)
        } else {
            min + (max - min) * i as f64 / (per_axis - 1) as f64
        }
    };

    for i in 0..per_axis {
        for j in 0..per_axis {
            points.push(Vector2::new(coordinate(j), coordinate(i)));
        }
    }
    points
}

/// Distorts and undistorts every point and summarizes the distance to the
/// original. Points whose round trip is not finite are skipped.
///
/// # Errors
///
/// * [`UtilError::ZeroPoints`] if `points` is empty.
/// * [`UtilError::NumericalError`] if no point produced a finite result.
pub fn compute_round_trip_error<T>(
    model: &T,
    points: &[Vector2<f64>],
) -> Result<RoundTripError, UtilError>
where
    T: ?Sized + DistortionModel,
{
    if points.is_empty() {
        return Err(UtilError::ZeroPoints);
    }

    let mut errors: Vec<f64> = points
        .iter()
        .map(|p| (model.undistort(&model.distort(p)) - p).norm())
        .filter(|e| e.is_finite())
        .collect();

    if errors.is_empty() {
        return Err(UtilError::NumericalError(format!(
            "no finite round trip for {} model",
            model.name()
        )));
    }

    let n = errors.len() as f64;
    let mean = errors.iter().sum::<f64>() / n;

    let variance: f64 = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let rmse = (errors.iter().map(|x| x.powi(2)).sum::<f64>() / n).sqrt();

    errors.sort_by(f64::total_cmp);
    let min = errors[0];
    let max = errors[errors.len() - 1];
    let median = if errors.len() % 2 == 0 {
        let mid = errors.len() / 2;
        (errors[mid - 1] + errors[mid]) / 2.0
    } else {
        errors[errors.len() / 2]
    };

    Ok(RoundTripError {
        rmse,
        min,
        max,
        mean,
        stddev,
        median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::{Distortion, RadialDistortion};
    use nalgebra::DVector;

    #[test]
    fn test_sample_grid() {
        let points = sample_grid(-1.0, 1.0, 5);
        assert_eq!(points.len(), 25);
        assert_eq!(points[0], Vector2::new(-1.0, -1.0));
        assert_eq!(points[4], Vector2::new(1.0, -1.0));
        assert_eq!(points[24], Vector2::new(1.0, 1.0));
        assert_eq!(points[12], Vector2::new(0.0, 0.0));

        for point in &points {
            assert!(point.x >= -1.0 && point.x <= 1.0);
            assert!(point.y >= -1.0 && point.y <= 1.0);
        }

        assert_eq!(sample_grid(0.0, 2.0, 1), vec![Vector2::new(1.0, 1.0)]);
        assert!(sample_grid(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_round_trip_error_identity() {
        let points = sample_grid(-1.0, 1.0, 4);
        let stats = compute_round_trip_error(&Distortion::Identity, &points).unwrap();
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.rmse, 0.0);
        assert_eq!(stats.median, 0.0);
    }

    #[test]
    fn test_round_trip_error_radial() {
        let model =
            RadialDistortion::from_parameters(&DVector::from_vec(vec![-0.0005, 0.0001])).unwrap();
        let points = sample_grid(-1.0, 1.0, 9);
        let stats = compute_round_trip_error(&model, &points).unwrap();

        assert!(stats.max < 1e-5, "{stats:?}");
        assert!(stats.min <= stats.median && stats.median <= stats.max);
        assert!(stats.mean <= stats.rmse + 1e-18);
    }

    #[test]
    fn test_round_trip_error_empty() {
        let model = Distortion::Identity;
        assert!(matches!(
            compute_round_trip_error(&model, &[]),
            Err(UtilError::ZeroPoints)
        ));
    }

    #[test]
    fn test_round_trip_error_dyn_model() {
        let model: Box<dyn DistortionModel> = Box::new(Distortion::Identity);
        let stats = compute_round_trip_error(model.as_ref(), &sample_grid(0.0, 1.0, 2)).unwrap();
        assert_eq!(stats.mean, 0.0);
    }
}
