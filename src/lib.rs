//! Lens Distortion Library
//!
//! A Rust library modelling the nonlinear mapping between ideal (pinhole)
//! normalized image coordinates and the distorted coordinates produced by a
//! real lens. The following models are provided:
//! - Identity (no distortion)
//! - Radial distortion with 1 to 3 coefficients
//! - Radial-Tangential (Brown-Conrady) distortion
//! - Rational Radial-Tangential distortion
//! - Rational Radial-Tangential distortion with thin prism terms
//! - Equidistant (fisheye) distortion
//!
//! Every model offers a closed-form forward transform and a numerically solved
//! inverse, and can be stored in and recreated from a key-value property
//! store.

pub mod distortion;
pub mod properties;
pub mod util;

// Re-export commonly used types
pub use distortion::{
    Distortion, DistortionError, DistortionModel, EquidistantDistortion, IdentityDistortion,
    InverseSolution, RadialDistortion, RadialTangentialDistortion, RationalTangentialDistortion,
    RationalTangentialThinPrismDistortion,
};

pub use properties::{camera_key, Properties, PropertiesError, PropertyStore};
