//! Lens distortion models.
//!
//! Every model maps ideal (pinhole) normalized image coordinates to distorted
//! coordinates with [`DistortionModel::distort`] and back with
//! [`DistortionModel::undistort`]. The forward direction is closed form; the
//! inverse is solved numerically by [`inverse::solve_inverse`].
//!
//! The closed set of models is collected in the [`Distortion`] enum, which is
//! what [`Distortion::create`] returns when reading a model back from a
//! [`PropertyStore`].

use log::debug;
use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::properties::{camera_key, PropertiesError, PropertyStore};

pub mod equidistant;
pub mod identity;
pub mod inverse;
pub mod radial;
pub mod rational_tan;
pub mod rational_tan_thin_prism;
pub mod rad_tan;
pub mod terms;

pub use equidistant::EquidistantDistortion;
pub use identity::IdentityDistortion;
pub use inverse::{solve_inverse, InverseSolution};
pub use radial::RadialDistortion;
pub use rad_tan::RadialTangentialDistortion;
pub use rational_tan::RationalTangentialDistortion;
pub use rational_tan_thin_prism::RationalTangentialThinPrismDistortion;

/// Radial coefficients of the polynomial numerator.
pub const RADIAL_KEYS: [&str; 3] = ["k1", "k2", "k3"];
/// Tangential (decentering) coefficients.
pub const TANGENTIAL_KEYS: [&str; 2] = ["p1", "p2"];
/// Radial coefficients of the rational denominator.
pub const RATIONAL_KEYS: [&str; 3] = ["k4", "k5", "k6"];
/// Thin prism coefficients.
pub const THIN_PRISM_KEYS: [&str; 4] = ["s1", "s2", "s3", "s4"];
/// Coefficients of the equidistant angle polynomial.
pub const EQUIDISTANT_KEYS: [&str; 4] = ["e1", "e2", "e3", "e4"];

#[derive(thiserror::Error, Debug)]
pub enum DistortionError {
    #[error("Parameter index {index} is out of range for {model} with {count} parameters")]
    ParameterIndexOutOfRange {
        model: &'static str,
        index: usize,
        count: usize,
    },
    #[error("Number of radial coefficients must be 1, 2 or 3, got {0}")]
    InvalidRadialCount(usize),
    #[error("Invalid distortion parameters: {0}")]
    InvalidParams(String),
    #[error("Property error: {0}")]
    Properties(PropertiesError),
}

impl From<PropertiesError> for DistortionError {
    fn from(err: PropertiesError) -> Self {
        DistortionError::Properties(err)
    }
}

/// Trait defining the operations every distortion model supports.
///
/// Parameters are addressed by a zero-based index whose meaning is fixed per
/// model. Accessing an index at or beyond [`count_parameters`] fails with
/// [`DistortionError::ParameterIndexOutOfRange`] for every model, including
/// the identity.
///
/// Transforms are pure functions of the stored parameters and do not
/// allocate. Distinct instances can be used from different threads freely.
///
/// [`count_parameters`]: DistortionModel::count_parameters
pub trait DistortionModel {
    /// Stable snake_case name of the model.
    fn name(&self) -> &'static str;

    fn count_parameters(&self) -> usize;

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError>;

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), DistortionError>;

    /// Maps an ideal normalized point to its distorted position.
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64>;

    /// Runs the numeric inversion of [`distort`](DistortionModel::distort)
    /// and reports how well it converged.
    fn undistort_solution(&self, point: &Vector2<f64>) -> InverseSolution {
        solve_inverse(point, |p| self.distort(p))
    }

    /// Maps a distorted normalized point back to its ideal position.
    ///
    /// For extreme coefficients the iteration may not converge; the best
    /// estimate is returned in that case.
    fn undistort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.undistort_solution(point).point
    }

    /// Writes the parameters into `store`, namespaced by the camera `id`.
    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>);

    /// Removes the keys of this model's group from `store`. Keys of other
    /// models are left untouched.
    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>);

    /// All parameters in index order.
    fn parameters(&self) -> DVector<f64> {
        let values: Vec<f64> = (0..self.count_parameters())
            .filter_map(|i| self.get_parameter(i).ok())
            .collect();
        DVector::from_vec(values)
    }

    /// Checks that every parameter is a finite number.
    fn validate_params(&self) -> Result<(), DistortionError> {
        for (i, value) in self.parameters().iter().enumerate() {
            if !value.is_finite() {
                return Err(DistortionError::InvalidParams(format!(
                    "{} parameter {} is not finite: {}",
                    self.name(),
                    i,
                    value
                )));
            }
        }
        Ok(())
    }
}

/// Helpers shared by the model implementations.
pub mod validation {
    use super::*;

    pub fn check_parameter_index(
        model: &'static str,
        index: usize,
        count: usize,
    ) -> Result<(), DistortionError> {
        if index >= count {
            return Err(DistortionError::ParameterIndexOutOfRange {
                model,
                index,
                count,
            });
        }
        Ok(())
    }

    pub fn check_radial_count(n: usize) -> Result<(), DistortionError> {
        if !(1..=3).contains(&n) {
            return Err(DistortionError::InvalidRadialCount(n));
        }
        Ok(())
    }

    pub fn check_parameter_count(
        model: &'static str,
        expected: usize,
        parameters: &DVector<f64>,
    ) -> Result<(), DistortionError> {
        if parameters.len() != expected {
            return Err(DistortionError::InvalidParams(format!(
                "{} requires {} parameters, got {}",
                model,
                expected,
                parameters.len()
            )));
        }
        Ok(())
    }
}

/// Store access shared by the model implementations.
pub(crate) mod keys {
    use super::*;

    /// Reads `names` into `values`; absent keys read as zero.
    pub fn read_values(
        store: &dyn PropertyStore,
        id: Option<u32>,
        names: &[&str],
        values: &mut [f64],
    ) -> Result<(), DistortionError> {
        for (name, value) in names.iter().zip(values.iter_mut()) {
            *value = store.get_f64(&camera_key(name, id))?.unwrap_or(0.0);
        }
        Ok(())
    }

    pub fn write_values(
        store: &mut dyn PropertyStore,
        id: Option<u32>,
        names: &[&str],
        values: &[f64],
    ) {
        for (name, value) in names.iter().zip(values) {
            store.set_f64(&camera_key(name, id), *value);
        }
    }

    pub fn remove_keys(store: &mut dyn PropertyStore, id: Option<u32>, names: &[&str]) {
        for name in names {
            store.remove(&camera_key(name, id));
        }
    }

    pub fn any_present(store: &dyn PropertyStore, id: Option<u32>, names: &[&str]) -> bool {
        names.iter().any(|name| store.contains(&camera_key(name, id)))
    }

    /// One-based position of the last key of `names` present in `store`.
    pub fn highest_present(
        store: &dyn PropertyStore,
        id: Option<u32>,
        names: &[&str],
    ) -> Option<usize> {
        names
            .iter()
            .rposition(|name| store.contains(&camera_key(name, id)))
            .map(|i| i + 1)
    }
}

/// Any of the supported distortion models.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{Distortion, DistortionModel, RadialDistortion};
/// use lens_distortion::properties::Properties;
/// use nalgebra::Vector2;
///
/// let mut radial = RadialDistortion::new(2).unwrap();
/// radial.set_parameter(0, -0.1).unwrap();
///
/// let mut prop = Properties::new();
/// Distortion::from(radial).write_properties(&mut prop, None);
///
/// let model = Distortion::create(&prop, None).unwrap().unwrap();
/// assert_eq!(model.name(), "radial");
/// assert_eq!(model.count_parameters(), 2);
///
/// let p = Vector2::new(0.2, 0.1);
/// assert!((model.undistort(&model.distort(&p)) - p).norm() < 1e-5);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Distortion {
    #[default]
    Identity,
    Radial(RadialDistortion),
    RadialTangential(RadialTangentialDistortion),
    RationalTangential(RationalTangentialDistortion),
    RationalTangentialThinPrism(RationalTangentialThinPrismDistortion),
    Equidistant(EquidistantDistortion),
}

impl Distortion {
    /// Creates the distortion model whose parameters are present in `store`.
    ///
    /// Models are tried from most to least specific, and the first whose
    /// distinguishing keys are present wins:
    ///
    /// 1. any of `s1..s4`: [`RationalTangentialThinPrismDistortion`]
    /// 2. any of `k4..k6`: [`RationalTangentialDistortion`]
    /// 3. `p1` or `p2`: [`RadialTangentialDistortion`]
    /// 4. any of `k1..k3`: [`RadialDistortion`]
    /// 5. any of `e1..e4`: [`EquidistantDistortion`]
    ///
    /// Returns `Ok(None)` if no distortion is configured. Missing coefficients
    /// of the chosen model read as zero.
    ///
    /// # Errors
    ///
    /// [`DistortionError::Properties`] if a present value is not a number,
    /// [`DistortionError::InvalidParams`] if a value is not finite.
    pub fn create(
        store: &dyn PropertyStore,
        id: Option<u32>,
    ) -> Result<Option<Distortion>, DistortionError> {
        let model = if keys::any_present(store, id, &THIN_PRISM_KEYS) {
            Distortion::RationalTangentialThinPrism(
                RationalTangentialThinPrismDistortion::from_properties(store, id)?,
            )
        } else if keys::any_present(store, id, &RATIONAL_KEYS) {
            Distortion::RationalTangential(RationalTangentialDistortion::from_properties(
                store, id,
            )?)
        } else if keys::any_present(store, id, &TANGENTIAL_KEYS) {
            Distortion::RadialTangential(RadialTangentialDistortion::from_properties(store, id)?)
        } else if keys::any_present(store, id, &RADIAL_KEYS) {
            Distortion::Radial(RadialDistortion::from_properties(store, id)?)
        } else if keys::any_present(store, id, &EQUIDISTANT_KEYS) {
            Distortion::Equidistant(EquidistantDistortion::from_properties(store, id)?)
        } else {
            debug!("No distortion parameters found for camera {id:?}");
            return Ok(None);
        };

        debug!(
            "Created {} distortion for camera {:?} with {} parameters",
            model.name(),
            id,
            model.count_parameters()
        );
        Ok(Some(model))
    }

    /// Removes the keys of every distortion model from `store`.
    pub fn clean_all_properties(store: &mut dyn PropertyStore, id: Option<u32>) {
        keys::remove_keys(store, id, &TANGENTIAL_KEYS);
        keys::remove_keys(store, id, &RADIAL_KEYS);
        keys::remove_keys(store, id, &RATIONAL_KEYS);
        keys::remove_keys(store, id, &THIN_PRISM_KEYS);
        keys::remove_keys(store, id, &EQUIDISTANT_KEYS);
    }

    fn as_model(&self) -> &dyn DistortionModel {
        match self {
            Distortion::Identity => &IdentityDistortion,
            Distortion::Radial(model) => model,
            Distortion::RadialTangential(model) => model,
            Distortion::RationalTangential(model) => model,
            Distortion::RationalTangentialThinPrism(model) => model,
            Distortion::Equidistant(model) => model,
        }
    }
}

impl DistortionModel for Distortion {
    fn name(&self) -> &'static str {
        self.as_model().name()
    }

    fn count_parameters(&self) -> usize {
        self.as_model().count_parameters()
    }

    fn get_parameter(&self, index: usize) -> Result<f64, DistortionError> {
        self.as_model().get_parameter(index)
    }

    fn set_parameter(&mut self, index: usize, value: f64) -> Result<(), DistortionError> {
        match self {
            Distortion::Identity => IdentityDistortion.set_parameter(index, value),
            Distortion::Radial(model) => model.set_parameter(index, value),
            Distortion::RadialTangential(model) => model.set_parameter(index, value),
            Distortion::RationalTangential(model) => model.set_parameter(index, value),
            Distortion::RationalTangentialThinPrism(model) => model.set_parameter(index, value),
            Distortion::Equidistant(model) => model.set_parameter(index, value),
        }
    }

    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.as_model().distort(point)
    }

    fn undistort_solution(&self, point: &Vector2<f64>) -> InverseSolution {
        self.as_model().undistort_solution(point)
    }

    fn write_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        self.as_model().write_properties(store, id)
    }

    fn clean_properties(&self, store: &mut dyn PropertyStore, id: Option<u32>) {
        self.as_model().clean_properties(store, id)
    }
}

impl From<RadialDistortion> for Distortion {
    fn from(model: RadialDistortion) -> Self {
        Distortion::Radial(model)
    }
}

impl From<RadialTangentialDistortion> for Distortion {
    fn from(model: RadialTangentialDistortion) -> Self {
        Distortion::RadialTangential(model)
    }
}

impl From<RationalTangentialDistortion> for Distortion {
    fn from(model: RationalTangentialDistortion) -> Self {
        Distortion::RationalTangential(model)
    }
}

impl From<RationalTangentialThinPrismDistortion> for Distortion {
    fn from(model: RationalTangentialThinPrismDistortion) -> Self {
        Distortion::RationalTangentialThinPrism(model)
    }
}

impl From<EquidistantDistortion> for Distortion {
    fn from(model: EquidistantDistortion) -> Self {
        Distortion::Equidistant(model)
    }
}
