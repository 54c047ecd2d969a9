//! Quadrature rules parametrized by polynomial total-order accuracy.
//!
//! The rules live on the reference triangle with corners (-1, -1), (1, -1), (-1, 1), so the
//! weights of each rule sum to the reference area 2.
use crate::quadrature::QuadraturePair2d;
use crate::Real;
use nalgebra::{convert, Point2};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadratureError {
    pub strength: usize,
}

impl fmt::Display for QuadratureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No triangle quadrature rule of strength {} is available", self.strength)
    }
}

impl Error for QuadratureError {}

/// Maps barycentric coordinates and weights on the unit simplex (area 1/2, weights summing
/// to 1) to the reference triangle.
fn from_barycentric<T: Real>(rule: &[([f64; 3], f64)]) -> QuadraturePair2d<T> {
    let reference = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0]];
    let weights = rule.iter().map(|(_, w)| convert(2.0 * w)).collect();
    let points = rule
        .iter()
        .map(|(lambda, _)| {
            let x: f64 = (0..3).map(|i| lambda[i] * reference[i][0]).sum();
            let y: f64 = (0..3).map(|i| lambda[i] * reference[i][1]).sum();
            Point2::new(convert(x), convert(y))
        })
        .collect();
    (weights, points)
}

/// Orbit of a point with two equal barycentric coordinates.
fn s21(a: f64, b: f64, w: f64) -> [([f64; 3], f64); 3] {
    [([a, b, b], w), ([b, a, b], w), ([b, b, a], w)]
}

/// Returns a triangle quadrature rule that integrates polynomials of total degree up to
/// `strength` exactly.
///
/// Strengths up to 5 are available. Lower strengths may be served by a rule of
/// higher strength.
pub fn triangle<T: Real>(strength: usize) -> Result<QuadraturePair2d<T>, QuadratureError> {
    let third = 1.0 / 3.0;
    match strength {
        0 | 1 => Ok(from_barycentric(&[([third, third, third], 1.0)])),
        2 => Ok(from_barycentric(&s21(2.0 / 3.0, 1.0 / 6.0, third))),
        3..=5 => {
            let sqrt15 = 15.0_f64.sqrt();
            let mut rule = vec![([third, third, third], 0.225)];
            rule.extend(s21(
                (9.0 - 2.0 * sqrt15) / 21.0,
                (6.0 + sqrt15) / 21.0,
                (155.0 + sqrt15) / 1200.0,
            ));
            rule.extend(s21(
                (9.0 + 2.0 * sqrt15) / 21.0,
                (6.0 - sqrt15) / 21.0,
                (155.0 - sqrt15) / 1200.0,
            ));
            Ok(from_barycentric(&rule))
        }
        _ => Err(QuadratureError { strength }),
    }
}
