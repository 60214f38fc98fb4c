//! No-op distortion for cameras without a configured lens model.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::distortion::{validation, DistortionError, DistortionModel, InverseSolution};
use crate::properties::PropertyStore;

/// Distortion model that leaves every point unchanged. It has no parameters
/// and stores nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityDistortion;

impl DistortionModel for IdentityDistortion {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn count_parameters(&self) -> usize {
        0
    }

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError> {
        validation::check_parameter_index(self.name(), index, 0)?;
        Ok(0.0)
    }

    fn set_parameter(&mut self, index: usize, _value: f64) -> Result<(), DistortionError> {
        validation::check_parameter_index(self.name(), index, 0)
    }

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        *point
    }

    fn undistort_solution(&self, point: &Vector2<f64>) -> InverseSolution {
        InverseSolution {
            point: *point,
            iterations: 0,
            squared_residual: 0.0,
            converged: true,
        }
    }

    fn write_properties(&self, _store: &mut dyn PropertyStore, _id: Option<u32>) {}

    fn clean_properties(&self, _store: &mut dyn PropertyStore, _id: Option<u32>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transforms() {
        let model = IdentityDistortion;
        for &(x, y) in &[(0.0, 0.0), (1.0, -1.0), (-250.5, 3e-9), (1e12, -1e12)] {
            let p = Vector2::new(x, y);
            assert_eq!(model.distort(&p), p);
            assert_eq!(model.undistort(&p), p);
        }
    }

    #[test]
    fn test_identity_has_no_parameters() {
        let mut model = IdentityDistortion;
        assert_eq!(model.count_parameters(), 0);
        assert_eq!(model.parameters().len(), 0);
        assert!(matches!(
            model.get_parameter(0),
            Err(DistortionError::ParameterIndexOutOfRange { index: 0, count: 0, .. })
        ));
        assert!(model.set_parameter(0, 0.5).is_err());
        assert!(model.validate_params().is_ok());
    }
}
