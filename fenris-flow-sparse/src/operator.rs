use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::CsrMatrix;

/// A linear operator `y = A x`.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>);
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T: RealField> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        assert_eq!(y.len(), self.nrows(), "Output dimension must match number of rows");
        assert_eq!(x.len(), self.ncols(), "Input dimension must match number of columns");
        for (i, row) in self.row_iter().enumerate() {
            let mut y_i = T::zero();
            for (&j, a_ij) in row.col_indices().iter().zip(row.values()) {
                y_i += a_ij.clone() * x[j].clone();
            }
            y[i] = y_i;
        }
    }
}

impl<T: RealField> LinearOperator<T> for DMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.gemv(T::one(), self, &x, T::zero());
    }
}

/// Diagonal (Jacobi) preconditioner `y = D^{-1} x`.
///
/// Rows with a zero (or structurally missing) diagonal entry are left unscaled. This is the
/// case for the pressure block of a saddle-point system.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let mut preconditioner = Self {
            inverse_diagonal: DVector::zeros(0),
        };
        preconditioner.update(matrix);
        preconditioner
    }

    /// Recompute the inverse diagonal, reusing the existing allocation.
    pub fn update(&mut self, matrix: &CsrMatrix<T>) {
        self.inverse_diagonal
            .resize_vertically_mut(matrix.nrows(), T::zero());
        for (i, row) in matrix.row_iter().enumerate() {
            let diagonal = row
                .col_indices()
                .iter()
                .zip(row.values())
                .find(|(&j, _)| j == i)
                .map(|(_, a_ii)| a_ii.clone())
                .unwrap_or_else(T::zero);
            self.inverse_diagonal[i] = if diagonal == T::zero() {
                T::one()
            } else {
                T::one() / diagonal
            };
        }
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        assert_eq!(y.len(), self.inverse_diagonal.len());
        assert_eq!(x.len(), self.inverse_diagonal.len());
        for i in 0..x.len() {
            y[i] = self.inverse_diagonal[i].clone() * x[i].clone();
        }
    }
}

/// y = Ax for owned vectors.
pub(crate) fn apply_owned<T, A>(a: &A, x: &DVector<T>, y: &mut DVector<T>)
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    let n = y.len();
    let m = x.len();
    a.apply(y.rows_mut(0, n), x.rows(0, m));
}
