//! Polynomial building blocks of the radial distortion family.

use nalgebra::Vector2;

/// Smallest denominator magnitude used by the rational radial scale.
pub const MIN_DENOMINATOR: f64 = 1e-12;

/// `1 + k1*r2 + k2*r2^2 + k3*r2^3`
#[inline]
pub fn radial_polynomial(r2: f64, k: &[f64; 3]) -> f64 {
    1.0 + r2 * (k[0] + r2 * (k[1] + r2 * k[2]))
}

/// Ratio of two radial polynomials. The denominator is pushed away from zero
/// to at least [`MIN_DENOMINATOR`] in magnitude, keeping its sign.
#[inline]
pub fn rational_scale(r2: f64, numerator: &[f64; 3], denominator: &[f64; 3]) -> f64 {
    let mut den = radial_polynomial(r2, denominator);
    if den.abs() < MIN_DENOMINATOR {
        den = MIN_DENOMINATOR.copysign(den);
    }
    radial_polynomial(r2, numerator) / den
}

/// Decentering offset `(2*p1*x*y + p2*(r2 + 2*x^2), p1*(r2 + 2*y^2) + 2*p2*x*y)`.
#[inline]
pub fn tangential_offset(point: &Vector2<f64>, r2: f64, p1: f64, p2: f64) -> Vector2<f64> {
    let x = point.x;
    let y = point.y;
    let xy2 = 2.0 * x * y;
    Vector2::new(
        p1 * xy2 + p2 * (r2 + 2.0 * x * x),
        p1 * (r2 + 2.0 * y * y) + p2 * xy2,
    )
}
