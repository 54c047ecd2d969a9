//! Sparse linear algebra for `fenris-flow`.
//!
//! The crate provides the pieces of the time-stepping pipeline that only deal with assembled
//! systems: applying Dirichlet row constraints to CSR matrices and solving the resulting
//! linear systems, either directly (banded or dense LU) or iteratively (BiCGSTAB).
mod banded;
mod bicgstab;
mod dirichlet;
mod direct;
mod operator;
mod ordering;
mod solver;

pub use banded::*;
pub use bicgstab::*;
pub use dirichlet::*;
pub use direct::*;
pub use operator::*;
pub use ordering::*;
pub use solver::*;

pub use nalgebra_sparse::pattern::SparsityPattern;
pub use nalgebra_sparse::CsrMatrix;
