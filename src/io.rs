//! Output of simulation results.
pub mod vtk;
