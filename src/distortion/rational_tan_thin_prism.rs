//! Implements the rational radial-tangential distortion model with thin prism
//! terms.
//!
//! ```text
//! r^2 = x^2 + y^2
//! s   = (1 + k1*r^2 + k2*r^4 + k3*r^6) / (1 + k4*r^2 + k5*r^4 + k6*r^6)
//! x'  = x*s + 2*p1*x*y         + p2*(r^2 + 2*x^2) + s1*r^2 + s2*r^4
//! y'  = y*s + p1*(r^2 + 2*y^2) + 2*p2*x*y         + s3*r^2 + s4*r^4
//! ```
//!
//! This is the most general member of the radial family and the one the
//! factory prefers whenever any thin prism coefficient is stored.

use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::{
    keys, rational_tan, terms, validation, DistortionError, DistortionModel, RADIAL_KEYS,
    RATIONAL_KEYS, TANGENTIAL_KEYS, THIN_PRISM_KEYS,
};
use crate::properties::PropertyStore;

/// Rational radial, tangential and thin prism lens distortion.
///
/// The parameter order is
/// `p1, p2, k1, k2, k3, k4, k5, k6, s1, s2, s3, s4`.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{
///     Distortion, DistortionModel, RationalTangentialThinPrismDistortion,
/// };
/// use lens_distortion::properties::Properties;
///
/// let mut model = RationalTangentialThinPrismDistortion::new();
/// model.set_parameter(8, 0.002).unwrap(); // s1
///
/// let mut prop = Properties::new();
/// model.write_properties(&mut prop, Some(0));
///
/// let restored = Distortion::create(&prop, Some(0)).unwrap().unwrap();
/// assert_eq!(restored.count_parameters(), 12);
/// assert_eq!(restored.get_parameter(8).unwrap(), 0.002);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RationalTangentialThinPrismDistortion {
    kd: [f64; 12],
}

impl RationalTangentialThinPrismDistortion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model from exactly 12 parameters.
    ///
    /// # Errors
    ///
    /// [`DistortionError::InvalidParams`] if the vector does not hold 12
    /// finite values.
    pub fn from_parameters(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        validation::check_parameter_count("rational_tangential_thin_prism", 12, parameters)?;
        let mut model = RationalTangentialThinPrismDistortion::new();
        model.kd.copy_from_slice(parameters.as_slice());
        model.validate_params()?;
        Ok(model)
    }

    /// Reads all 12 coefficients from `store`; absent keys read as zero.
    pub fn from_properties(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Self, DistortionError> {
        let mut model = RationalTangentialThinPrismDistortion::new();
        keys::read_values(store, id, &rational_tan::PARAMETER_KEYS, &mut model.kd[..8])?;
        keys::read_values(store, id, &THIN_PRISM_KEYS, &mut model.kd[8..])?;
        model.validate_params()?;
        Ok(model)
    }
}

impl DistortionModel for RationalTangentialThinPrismDistortion {
    fn name(&self) -> &'static str {
        "rational_tangential_thin_prism"
    }

    fn count_parameters(&self) -> usize {
        self.kd.len()
    }

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError> {
        validation::check_parameter_index(self.name(), index, self.kd.len())?;
        Ok(self.kd[index])
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), DistortionError> {
        validation::check_parameter_index(self.name(), index, self.kd.len())?;
        self.kd[index] = value;
        Ok(())
    }

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let kd = &self.kd;
        let r2 = point.norm_squared();
        let r4 = r2 * r2;
        let s = terms::rational_scale(r2, &[kd[2], kd[3], kd[4]], &[kd[5], kd[6], kd[7]]);
        let prism = Vector2::new(kd[8] * r2 + kd[9] * r4, kd[10] * r2 + kd[11] * r4);
        point * s + terms::tangential_offset(point, r2, kd[0], kd[1]) + prism
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::write_values(store, id, &rational_tan::PARAMETER_KEYS, &self.kd[..8]);
        keys::write_values(store, id, &THIN_PRISM_KEYS, &self.kd[8..]);
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &TANGENTIAL_KEYS);
        keys::remove_keys(store, id, &RADIAL_KEYS);
        keys::remove_keys(store, id, &RATIONAL_KEYS);
        keys::remove_keys(store, id, &THIN_PRISM_KEYS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::RationalTangentialDistortion;
    use crate::properties::Properties;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn sample_model() -> RationalTangentialThinPrismDistortion {
        RationalTangentialThinPrismDistortion::from_parameters(&DVector::from_vec(vec![
            0.0002, -0.0001, -0.0009, 0.0004, -0.0001, 0.0003, -0.0001, 0.00005, 0.0002, -0.0001,
            -0.0003, 0.0001,
        ]))
        .unwrap()
    }

    #[test]
    fn test_thin_prism_adds_to_rational() {
        let model = sample_model();
        let mut rational = RationalTangentialDistortion::new();
        for i in 0..8 {
            rational
                .set_parameter(i, model.get_parameter(i).unwrap())
                .unwrap();
        }

        let p = Vector2::new(0.7, -0.4);
        let r2: f64 = 0.65;
        let base = rational.distort(&p);
        let d = model.distort(&p);
        assert_relative_eq!(d.x - base.x, 0.0002 * r2 - 0.0001 * r2 * r2, epsilon = 1e-15);
        assert_relative_eq!(d.y - base.y, -0.0003 * r2 + 0.0001 * r2 * r2, epsilon = 1e-15);
    }

    #[test]
    fn test_thin_prism_parameters() {
        let mut model = sample_model();
        assert_eq!(model.count_parameters(), 12);
        assert!(model.get_parameter(12).is_err());

        let mut copy = model.clone();
        copy.set_parameter(11, 1.0).unwrap();
        assert_eq!(model.get_parameter(11).unwrap(), 0.0001);

        model.set_parameter(0, -0.5).unwrap();
        assert_eq!(model.get_parameter(0).unwrap(), -0.5);
        assert_eq!(model.get_parameter(1).unwrap(), -0.0001);
    }

    #[test]
    fn test_thin_prism_round_trip() {
        let model = sample_model();
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Vector2::new(-1.0 + 0.2 * i as f64, -1.0 + 0.2 * j as f64);
                let solution = model.undistort_solution(&model.distort(&p));
                assert!(solution.converged);
                assert_abs_diff_eq!(solution.point.x, p.x, epsilon = 1e-5);
                assert_abs_diff_eq!(solution.point.y, p.y, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_thin_prism_properties() {
        let model = sample_model();
        let mut prop = Properties::parse_text("fx=460\ne1=0.01").unwrap();

        model.write_properties(&mut prop, None);
        assert_eq!(prop.len(), 14);
        assert_eq!(prop.get_f64("s3").unwrap(), Some(-0.0003));
        assert_eq!(prop.get_f64("k6").unwrap(), Some(0.00005));

        let restored = RationalTangentialThinPrismDistortion::from_properties(&prop, None).unwrap();
        assert_eq!(restored, model);

        restored.clean_properties(&mut prop, None);
        assert_eq!(prop.len(), 2);
    }
}
