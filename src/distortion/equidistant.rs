//! Implements the equidistant (fisheye) distortion model.
//!
//! The image radius is a polynomial in the angle of incidence rather than in
//! the ideal radius:
//!
//! ```text
//! r       = sqrt(x^2 + y^2)
//! theta   = atan(r)
//! theta_d = theta * (1 + e1*theta^2 + e2*theta^4 + e3*theta^6 + e4*theta^8)
//! x'      = x * theta_d / r
//! y'      = y * theta_d / r
//! ```
//!
//! With all coefficients zero the model is the ideal equidistant projection,
//! which is not the identity.

use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::{keys, validation, DistortionError, DistortionModel, EQUIDISTANT_KEYS};
use crate::properties::PropertyStore;

/// Below this ideal radius the scale `theta_d / r` is taken as its limit 1.
const MIN_RADIUS: f64 = 1e-9;

/// Equidistant fisheye distortion with four angular coefficients `e1..e4`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquidistantDistortion {
    ed: [f64; 4],
}

impl EquidistantDistortion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        validation::check_parameter_count("equidistant", 4, parameters)?;
        let mut model = EquidistantDistortion::new();
        model.ed.copy_from_slice(parameters.as_slice());
        model.validate_params()?;
        Ok(model)
    }

    pub fn from_properties(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Self, DistortionError> {
        let mut model = EquidistantDistortion::new();
        keys::read_values(store, id, &EQUIDISTANT_KEYS, &mut model.ed)?;
        model.validate_params()?;
        Ok(model)
    }
}

impl DistortionModel for EquidistantDistortion {
    fn name(&self) -> &'static str {
        "equidistant"
    }

    fn count_parameters(&self) -> usize {
        self.ed.len()
    }

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError> {
        validation::check_parameter_index(self.name(), index, self.ed.len())?;
        Ok(self.ed[index])
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), DistortionError> {
        validation::check_parameter_index(self.name(), index, self.ed.len())?;
        self.ed[index] = value;
        Ok(())
    }

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let r = point.norm();
        if r < MIN_RADIUS {
            return *point;
        }

        let theta = r.atan();
        let theta2 = theta * theta;
        let e = &self.ed;
        let theta_d =
            theta * (1.0 + theta2 * (e[0] + theta2 * (e[1] + theta2 * (e[2] + theta2 * e[3]))));

        point * (theta_d / r)
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::write_values(store, id, &EQUIDISTANT_KEYS, &self.ed);
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &EQUIDISTANT_KEYS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Properties;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_equidistant_zero_coefficients() {
        let model = EquidistantDistortion::new();
        let p = Vector2::new(1.0, 0.0);
        let d = model.distort(&p);
        assert_relative_eq!(d.x, std::f64::consts::FRAC_PI_4, epsilon = 1e-15);
        assert_eq!(d.y, 0.0);

        assert_eq!(model.distort(&Vector2::zeros()), Vector2::zeros());
        let tiny = Vector2::new(1e-12, -1e-12);
        assert_eq!(model.distort(&tiny), tiny);
    }

    #[test]
    fn test_equidistant_distort() {
        let model =
            EquidistantDistortion::from_parameters(&DVector::from_vec(vec![0.1, -0.02, 0.003, 0.0]))
                .unwrap();
        let p = Vector2::new(0.3, 0.4);
        let theta = 0.5f64.atan();
        let theta_d = theta
            * (1.0 + 0.1 * theta.powi(2) - 0.02 * theta.powi(4) + 0.003 * theta.powi(6));

        let d = model.distort(&p);
        assert_relative_eq!(d.x, 0.3 * theta_d / 0.5, epsilon = 1e-14);
        assert_relative_eq!(d.y, 0.4 * theta_d / 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_equidistant_round_trip() {
        let model = EquidistantDistortion::from_parameters(&DVector::from_vec(vec![
            -0.0008, 0.0003, -0.0001, 0.00002,
        ]))
        .unwrap();
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Vector2::new(-1.0 + 0.2 * i as f64, -1.0 + 0.2 * j as f64);
                let solution = model.undistort_solution(&model.distort(&p));
                assert!(solution.converged, "no convergence at {p:?}");
                assert_abs_diff_eq!(solution.point.x, p.x, epsilon = 1e-5);
                assert_abs_diff_eq!(solution.point.y, p.y, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_equidistant_parameters() {
        let mut model = EquidistantDistortion::new();
        assert_eq!(model.count_parameters(), 4);
        model.set_parameter(3, 0.5).unwrap();
        assert_eq!(model.parameters(), DVector::from_vec(vec![0.0, 0.0, 0.0, 0.5]));
        assert!(model.get_parameter(4).is_err());
        assert!(model.set_parameter(4, 0.0).is_err());
    }

    #[test]
    fn test_equidistant_properties() {
        let model =
            EquidistantDistortion::from_parameters(&DVector::from_vec(vec![0.1, 0.2, 0.3, 0.4]))
                .unwrap();
        let mut prop = Properties::parse_text("k1=0.5").unwrap();
        model.write_properties(&mut prop, Some(3));

        assert_eq!(prop.get_f64("e43").unwrap(), Some(0.4));
        assert_eq!(
            EquidistantDistortion::from_properties(&prop, Some(3)).unwrap(),
            model
        );

        model.clean_properties(&mut prop, Some(3));
        assert_eq!(prop.len(), 1);
        assert!(prop.contains("k1"));
    }
}
