//! Element assemblers for the weak forms used by the time-stepping driver.
use serde::{Deserialize, Serialize};

mod laplace;
mod navier_stokes;
mod vorticity;

pub use laplace::*;
pub use navier_stokes::*;
pub use vorticity::*;

/// How the pressure enters the momentum equation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureCoupling {
    /// `-(p, div v)`, the natural choice with velocity prescribed on the whole boundary.
    ///
    /// The sign is flipped with respect to the `+(p, div v)` form, so that `p` is the
    /// physical pressure. Assembling `+(p, div v)` yields the same velocity and the negated
    /// pressure.
    Divergence,
    /// `(grad p, v)`, used when the pressure is prescribed on in- and outflow boundaries.
    Gradient,
}

impl Default for PressureCoupling {
    fn default() -> Self {
        Self::Divergence
    }
}

/// Form of the viscous term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViscousForm {
    /// `nu (grad u, grad v)`.
    Gradient,
    /// `2 nu (eps(u), eps(v))` with the symmetric gradient `eps(u) = (grad u + grad u^T) / 2`.
    ///
    /// Equal to the gradient form for divergence-free fields with velocity prescribed on the
    /// whole boundary, but with different natural boundary conditions.
    SymmetricGradient,
}

impl Default for ViscousForm {
    fn default() -> Self {
        Self::Gradient
    }
}

/// Relative tolerance below which an element's Jacobian determinant is considered zero.
const DEGENERACY_TOLERANCE: f64 = 1e-12;

fn is_degenerate(jacobian_determinant: f64, diameter: f64) -> bool {
    !jacobian_determinant.is_finite() || jacobian_determinant.abs() <= DEGENERACY_TOLERANCE * diameter * diameter
}
