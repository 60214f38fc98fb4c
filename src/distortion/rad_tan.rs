//! Implements the Radial-Tangential (Brown-Conrady) distortion model.
//!
//! ```text
//! r^2 = x^2 + y^2
//! s   = 1 + k1*r^2 + k2*r^4 + k3*r^6
//! x'  = x*s + 2*p1*x*y         + p2*(r^2 + 2*x^2)
//! y'  = y*s + p1*(r^2 + 2*y^2) + 2*p2*x*y
//! ```

use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::distortion::{
    keys, terms, validation, DistortionError, DistortionModel, RADIAL_KEYS, TANGENTIAL_KEYS,
};
use crate::properties::PropertyStore;

/// Radial and tangential lens distortion.
///
/// The tangential pair is always present; the number of radial coefficients
/// `n` is 1, 2 or 3. The parameter order is `p1, p2, k1, k2, k3`, truncated
/// to `2 + n` entries.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{DistortionModel, RadialTangentialDistortion};
/// use nalgebra::{DVector, Vector2};
///
/// // p1, p2, k1, k2
/// let params = DVector::from_vec(vec![0.001, 0.0005, -0.05, 0.01]);
/// let model = RadialTangentialDistortion::from_parameters(&params).unwrap();
/// assert_eq!(model.count_parameters(), 4);
///
/// let ideal = Vector2::new(0.5, 0.3);
/// let distorted = model.distort(&ideal);
/// assert!((model.undistort(&distorted) - ideal).norm() < 1e-5);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RadialTangentialCoefficients")]
pub struct RadialTangentialDistortion {
    kn: usize,
    /// `[p1, p2, k1, k2, k3]`
    kd: [f64; 5],
}

#[derive(Deserialize)]
struct RadialTangentialCoefficients {
    kn: usize,
    kd: [f64; 5],
}

impl TryFrom<RadialTangentialCoefficients> for RadialTangentialDistortion {
    type Error = DistortionError;

    fn try_from(raw: RadialTangentialCoefficients) -> Result<Self, Self::Error> {
        let mut model = RadialTangentialDistortion::new(raw.kn)?;
        let count = model.count_parameters();
        model.kd[..count].copy_from_slice(&raw.kd[..count]);
        model.validate_params()?;
        Ok(model)
    }
}

impl RadialTangentialDistortion {
    /// Creates a model with `n` radial coefficients, all parameters zero.
    pub fn new(n: usize) -> Result<Self, DistortionError> {
        validation::check_radial_count(n)?;
        Ok(RadialTangentialDistortion {
            kn: n,
            kd: [0.0; 5],
        })
    }

    /// Creates a model from `[p1, p2, k1, ..., kn]` (3 to 5 values).
    pub fn from_parameters(parameters: &DVector<f64>) -> Result<Self, DistortionError> {
        let n = parameters.len().saturating_sub(TANGENTIAL_KEYS.len());
        let mut model = RadialTangentialDistortion::new(n)?;
        model.kd[..parameters.len()].copy_from_slice(parameters.as_slice());
        model.validate_params()?;
        Ok(model)
    }

    /// Reads the model from `store`. The radial count is the highest `k`
    /// index present, or 1 if only the tangential pair is stored.
    pub fn from_properties(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Self, DistortionError> {
        let n = keys::highest_present(store, id, &RADIAL_KEYS).unwrap_or(1);
        let mut model = RadialTangentialDistortion::new(n)?;
        keys::read_values(store, id, &TANGENTIAL_KEYS, &mut model.kd[..2])?;
        keys::read_values(store, id, &RADIAL_KEYS[..n], &mut model.kd[2..2 + n])?;
        model.validate_params()?;
        Ok(model)
    }

    fn radial(&self) -> [f64; 3] {
        [self.kd[2], self.kd[3], self.kd[4]]
    }
}

impl fmt::Debug for RadialTangentialDistortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadialTangentialDistortion [p1: {} p2: {} k: {:?}]",
            self.kd[0],
            self.kd[1],
            &self.kd[2..2 + self.kn],
        )
    }
}

impl DistortionModel for RadialTangentialDistortion {
    fn name(&self) -> &'static str {
        "radial_tangential"
    }

    fn count_parameters(&self) -> usize {
        2 + self.kn
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
        let s = terms::radial_polynomial(r2, &self.radial());
        point * s + terms::tangential_offset(point, r2, self.kd[0], self.kd[1])
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        let n = self.kn;
        keys::write_values(store, id, &TANGENTIAL_KEYS, &self.kd[..2]);
        keys::write_values(store, id, &RADIAL_KEYS[..n], &self.kd[2..2 + n]);
        keys::remove_keys(store, id, &RADIAL_KEYS[n..]);
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &TANGENTIAL_KEYS);
        keys::remove_keys(store, id, &RADIAL_KEYS);
    }

    fn validate_params(&self) -> Result<(), DistortionError> {
        validation::check_radial_count(self.kn)?;
        for (i, value) in self.kd.iter().enumerate() {
            if !value.is_finite() {
                return Err(DistortionError::InvalidParams(format!(
                    "radial_tangential parameter {i} is not finite: {value}"
                )));
            }
        }
        Ok(())
    }
}
