//! Assembly of finite element systems into CSR matrices with a fixed sparsity pattern.
pub mod global;
pub mod local;
pub mod operators;
