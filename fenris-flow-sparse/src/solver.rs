use core::fmt;
use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// A solver for square linear systems `A x = b` with `A` stored in CSR format.
///
/// The contents of `solution` on entry may be used as an initial guess by iterative solvers.
pub trait LinearSolver<T: Scalar> {
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        rhs: DVectorView<T>,
        solution: DVectorViewMut<T>,
    ) -> Result<SolveOutput, SolveError>;

    /// Short human-readable name, used in log output.
    fn name(&self) -> &str;
}

impl<T, S> LinearSolver<T> for Box<S>
where
    T: Scalar,
    S: ?Sized + LinearSolver<T>,
{
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        rhs: DVectorView<T>,
        solution: DVectorViewMut<T>,
    ) -> Result<SolveOutput, SolveError> {
        <S as LinearSolver<T>>::solve(self, matrix, rhs, solution)
    }

    fn name(&self) -> &str {
        <S as LinearSolver<T>>::name(self)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutput {
    /// Number of updates made to the solution vector, or `None` for direct solvers.
    pub num_iterations: Option<usize>,
}

impl SolveOutput {
    pub fn direct() -> Self {
        Self { num_iterations: None }
    }

    pub fn iterative(num_iterations: usize) -> Self {
        Self {
            num_iterations: Some(num_iterations),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolveError {
    DimensionMismatch {
        nrows: usize,
        ncols: usize,
        rhs_len: usize,
        solution_len: usize,
    },
    SingularMatrix,
    NonFiniteSolution,
    Breakdown { iteration: usize },
    MaxIterationsReached {
        max_iter: usize,
        relative_residual: Option<f64>,
    },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch {
                nrows,
                ncols,
                rhs_len,
                solution_len,
            } => write!(
                f,
                "Incompatible dimensions: matrix is {}x{}, right-hand side has length {}, solution has length {}",
                nrows, ncols, rhs_len, solution_len
            ),
            Self::SingularMatrix => write!(f, "Matrix is singular"),
            Self::NonFiniteSolution => write!(f, "Solution contains non-finite values"),
            Self::Breakdown { iteration } => write!(f, "Solver broke down at iteration {}", iteration),
            Self::MaxIterationsReached {
                max_iter,
                relative_residual,
            } => {
                write!(f, "Max iterations ({}) reached", max_iter)?;
                if let Some(residual) = relative_residual {
                    write!(f, " with relative residual {:e}", residual)?;
                }
                Ok(())
            }
        }
    }
}

impl Error for SolveError {}

pub(crate) fn check_dimensions<T>(matrix: &CsrMatrix<T>, rhs_len: usize, solution_len: usize) -> Result<(), SolveError> {
    let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
    if nrows != ncols || rhs_len != nrows || solution_len != ncols {
        Err(SolveError::DimensionMismatch {
            nrows,
            ncols,
            rhs_len,
            solution_len,
        })
    } else {
        Ok(())
    }
}
