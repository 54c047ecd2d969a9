use crate::solver::check_dimensions;
use crate::{LinearSolver, SolveError, SolveOutput};
use nalgebra::{DMatrix, DVectorView, DVectorViewMut, RealField};
use nalgebra_sparse::CsrMatrix;

/// Direct solver that densifies the matrix and factorizes it with partial-pivoting LU.
///
/// Only suitable for small systems. Mostly useful as a reference for [`BandedLu`](crate::BandedLu).
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLu;

impl<T: RealField> LinearSolver<T> for DenseLu {
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        rhs: DVectorView<T>,
        mut solution: DVectorViewMut<T>,
    ) -> Result<SolveOutput, SolveError> {
        check_dimensions(matrix, rhs.len(), solution.len())?;

        let n = matrix.nrows();
        let mut dense = DMatrix::zeros(n, n);
        for (i, j, a_ij) in matrix.triplet_iter() {
            dense[(i, j)] += a_ij.clone();
        }

        let x = dense.lu().solve(&rhs).ok_or(SolveError::SingularMatrix)?;
        if x.iter().any(|x_i| !x_i.is_finite()) {
            return Err(SolveError::NonFiniteSolution);
        }
        solution.copy_from(&x);
        Ok(SolveOutput::direct())
    }

    fn name(&self) -> &str {
        "dense LU"
    }
}
