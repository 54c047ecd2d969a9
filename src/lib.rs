//! Theta-scheme time stepping of the incompressible Navier-Stokes equations on triangle meshes.
//!
//! The crate contains a small finite element layer (meshes, P1/P2 triangle elements, quadrature,
//! assembly into CSR matrices) and a time-stepping [`driver`](crate::driver) that advances a
//! Taylor-Hood velocity/pressure state, optionally on a mesh that moves with a computed mesh
//! velocity (Arbitrary Lagrangian-Eulerian formulation).
use nalgebra::RealField;

pub mod assembly;
pub mod boundary;
pub mod config;
pub mod connectivity;
pub mod driver;
pub mod element;
pub mod experiments;
pub mod io;
pub mod mesh;
pub mod postprocess;
pub mod quadrature;
pub mod space;
pub mod state;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;

pub use fenris_flow_sparse as sparse;

/// Real scalar type used by the generic mesh and element routines.
///
/// Used as a trait alias for the traits frequently needed by generic routines.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}
