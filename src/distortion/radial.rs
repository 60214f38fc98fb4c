//! Implements the purely radial distortion model.
//!
//! ```text
//! r^2 = x^2 + y^2
//! s   = 1 + k1*r^2 + k2*r^4 + k3*r^6
//! x'  = x*s
//! y'  = y*s
//! ```
//!
//! The number of active coefficients `n` is 1, 2 or 3 and fixed at
//! construction. Inactive coefficients are zero.

use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::{
    keys, terms, validation, DistortionError, DistortionModel, RADIAL_KEYS,
};
use crate::properties::PropertyStore;

/// Radial lens distortion with one to three coefficients.
///
/// The parameter order is `k1, k2, k3`, truncated to the active count.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{DistortionModel, RadialDistortion};
/// use nalgebra::Vector2;
///
/// let mut model = RadialDistortion::new(1).unwrap();
/// model.set_parameter(0, -0.2).unwrap();
///
/// let distorted = model.distort(&Vector2::new(0.5, 0.0));
/// assert!((distorted.x - 0.5 * (1.0 - 0.2 * 0.25)).abs() < 1e-12);
/// assert!(model.get_parameter(1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RadialCoefficients")]
pub struct RadialDistortion {
    kn: usize,
    kd: [f64; 3],
}

/// Unchecked serialized form of [`RadialDistortion`].
#[derive(Deserialize)]
struct RadialCoefficients {
    kn: usize,
    kd: [f64; 3],
}

impl TryFrom<RadialCoefficients> for RadialDistortion {
    type Error = DistortionError;

    /// Inactive coefficients beyond `kn` are dropped.
    fn try_from(raw: RadialCoefficients) -> Result<Self, Self::Error> {
        let mut model = RadialDistortion::new(raw.kn)?;
        model.kd[..raw.kn].copy_from_slice(&raw.kd[..raw.kn]);
        model.validate_params()?;
        Ok(model)
    }
}

impl RadialDistortion {
    /// Creates a model with `n` zero coefficients.
    ///
    /// # Errors
    ///
    /// [`DistortionError::InvalidRadialCount`] unless `n` is 1, 2 or 3.
    pub fn new(n: usize) -> Result<Self, DistortionError> {
        validation::check_radial_count(n)?;
        Ok(RadialDistortion {
            kn: n,
            kd: [0.0; 3],
        })
    }

    /// Creates a model from the coefficients `[k1, ..., kn]`; the vector
    /// length determines `n`.
    pub fn from_parameters(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        let mut model = RadialDistortion::new(parameters.len())?;
        model.kd[..parameters.len()].copy_from_slice(parameters.as_slice());
        model.validate_params()?;
        Ok(model)
    }

    /// Reads the model from `store`. `n` is the highest `k` index present
    /// (at least 1); absent coefficients read as zero.
    pub fn from_properties(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Self, DistortionError> {
        let n = keys::highest_present(store, id, &RADIAL_KEYS).unwrap_or(1);
        let mut model = RadialDistortion::new(n)?;
        keys::read_values(store, id, &RADIAL_KEYS[..n], &mut model.kd[..n])?;
        model.validate_params()?;
        Ok(model)
    }
}

impl DistortionModel for RadialDistortion {
    fn name(&self) -> &'static str {
        "radial"
    }

    fn count_parameters(&self) -> usize {
        self.kn
    }

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError> {
        validation::check_parameter_index(self.name(), index, self.count_parameters())?;
        Ok(self.kd[index])
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), DistortionError> {
        validation::check_parameter_index(self.name(), index, self.count_parameters())?;
        self.kd[index] = value;
        Ok(())
    }

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let r2 = point.norm_squared();
        point * terms::radial_polynomial(r2, &self.kd)
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        let n = self.count_parameters();
        keys::write_values(store, id, &RADIAL_KEYS[..n], &self.kd[..n]);
        keys::remove_keys(store, id, &RADIAL_KEYS[n..]);
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &RADIAL_KEYS);
    }

    fn validate_params(&self) -> Result<(), DistortionError> {
        validation::check_radial_count(self.kn)?;
        if let Some(k) = self.kd.iter().find(|k| !k.is_finite()) {
            return Err(DistortionError::InvalidParams(format!(
                "radial coefficient is not finite: {k}"
            )));
        }
        Ok(())
    }
}
