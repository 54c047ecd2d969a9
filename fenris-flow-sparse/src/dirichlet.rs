use core::fmt;
use nalgebra::{DVector, RealField};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// Returned when a constrained row has no diagonal entry in the sparsity pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingDiagonalError {
    pub row: usize,
}

impl fmt::Display for MissingDiagonalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {} has no diagonal entry in the sparsity pattern", self.row)
    }
}

impl Error for MissingDiagonalError {}

/// Constrains the given rows of the system `A x = b` to the prescribed values.
///
/// Every row in `dofs` is replaced by the corresponding row of the identity matrix and the
/// right-hand side entry is set to the prescribed value. Columns are left untouched, so the
/// system loses symmetry but the remaining rows are unaffected.
///
/// Rows are processed in order: if a row appears several times, the last value wins.
/// Constraining an already constrained row to the same value does not change the system.
pub fn apply_dirichlet_rows<T>(
    matrix: &mut CsrMatrix<T>,
    rhs: &mut DVector<T>,
    dofs: &[usize],
    values: &[T],
) -> Result<(), MissingDiagonalError>
where
    T: RealField,
{
    assert_eq!(dofs.len(), values.len(), "Each constrained row needs exactly one value");
    assert_eq!(matrix.nrows(), rhs.len(), "Right-hand side must match the matrix");

    for (&dof, value) in dofs.iter().zip(values) {
        let mut row = matrix.row_mut(dof);
        let (cols, row_values) = row.cols_and_values_mut();
        let mut has_diagonal = false;
        for (&col, a) in cols.iter().zip(row_values.iter_mut()) {
            if col == dof {
                *a = T::one();
                has_diagonal = true;
            } else {
                *a = T::zero();
            }
        }

        if !has_diagonal {
            return Err(MissingDiagonalError { row: dof });
        }
        rhs[dof] = value.clone();
    }

    Ok(())
}
