//! Implements the rational radial-tangential distortion model.
//!
//! ```text
//! r^2 = x^2 + y^2
//! s   = (1 + k1*r^2 + k2*r^4 + k3*r^6) / (1 + k4*r^2 + k5*r^4 + k6*r^6)
//! x'  = x*s + 2*p1*x*y         + p2*(r^2 + 2*x^2)
//! y'  = y*s + p1*(r^2 + 2*y^2) + 2*p2*x*y
//! ```
//!
//! The denominator is kept at least [`terms::MIN_DENOMINATOR`] away from zero,
//! so the forward transform stays finite even where the rational polynomial
//! has a pole. Results near a pole are not meaningful.

use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::{
    keys, terms, validation, DistortionError, DistortionModel, RADIAL_KEYS, RATIONAL_KEYS,
    TANGENTIAL_KEYS,
};
use crate::properties::PropertyStore;

pub(crate) const PARAMETER_KEYS: [&str; 8] = ["p1", "p2", "k1", "k2", "k3", "k4", "k5", "k6"];

/// Rational radial distortion with tangential terms.
///
/// The parameter order is `p1, p2, k1, k2, k3, k4, k5, k6`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RationalTangentialDistortion {
    kd: [f64; 8],
}

impl RationalTangentialDistortion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model from exactly 8 parameters.
    pub fn from_parameters(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        validation::check_parameter_count("rational_tangential", 8, parameters)?;
        let mut model = RationalTangentialDistortion::new();
        model.kd.copy_from_slice(parameters.as_slice());
        model.validate_params()?;
        Ok(model)
    }

    pub fn from_properties(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Self, DistortionError> {
        let mut model = RationalTangentialDistortion::new();
        keys::read_values(store, id, &PARAMETER_KEYS, &mut model.kd)?;
        model.validate_params()?;
        Ok(model)
    }
}

impl DistortionModel for RationalTangentialDistortion {
    fn name(&self) -> &'static str {
        "rational_tangential"
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
        let s = terms::rational_scale(r2, &[kd[2], kd[3], kd[4]], &[kd[5], kd[6], kd[7]]);
        point * s + terms::tangential_offset(point, r2, kd[0], kd[1])
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::write_values(store, id, &PARAMETER_KEYS, &self.kd);
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &TANGENTIAL_KEYS);
        keys::remove_keys(store, id, &RADIAL_KEYS);
        keys::remove_keys(store, id, &RATIONAL_KEYS);
    }
}
