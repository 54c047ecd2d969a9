use crate::operator::apply_owned;
use crate::solver::check_dimensions;
use crate::{JacobiPreconditioner, LinearSolver, SolveError, SolveOutput};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::CsrMatrix;

#[derive(Debug, Clone)]
struct BiCgStabWorkspace<T: Scalar> {
    x: DVector<T>,
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    p_hat: DVector<T>,
    v: DVector<T>,
    s: DVector<T>,
    s_hat: DVector<T>,
    t: DVector<T>,
}

impl<T: RealField> BiCgStabWorkspace<T> {
    fn new() -> Self {
        Self {
            x: DVector::zeros(0),
            r: DVector::zeros(0),
            r_hat: DVector::zeros(0),
            p: DVector::zeros(0),
            p_hat: DVector::zeros(0),
            v: DVector::zeros(0),
            s: DVector::zeros(0),
            s_hat: DVector::zeros(0),
            t: DVector::zeros(0),
        }
    }

    fn prepare_buffers(&mut self, dim: usize) {
        for buffer in [
            &mut self.x,
            &mut self.r,
            &mut self.r_hat,
            &mut self.p,
            &mut self.p_hat,
            &mut self.v,
            &mut self.s,
            &mut self.s_hat,
            &mut self.t,
        ] {
            buffer.resize_vertically_mut(dim, T::zero());
            buffer.fill(T::zero());
        }
    }
}

/// Jacobi-preconditioned BiCGSTAB for general non-symmetric systems.
///
/// Convergence is declared once `||r|| <= tol * ||b||`, where `r` is the recursively updated
/// residual.
#[derive(Debug, Clone)]
pub struct BiCgStab<T: Scalar> {
    tolerance: T,
    max_iter: usize,
    workspace: BiCgStabWorkspace<T>,
    preconditioner: Option<JacobiPreconditioner<T>>,
}

impl<T: RealField> BiCgStab<T> {
    pub fn new(tolerance: T) -> Self {
        Self {
            tolerance,
            max_iter: 1000,
            workspace: BiCgStabWorkspace::new(),
            preconditioner: None,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }

    pub fn tolerance(&self) -> &T {
        &self.tolerance
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }
}

impl Default for BiCgStab<f64> {
    fn default() -> Self {
        Self::new(1e-10)
    }
}

impl<T: RealField> LinearSolver<T> for BiCgStab<T> {
    #[allow(non_snake_case)]
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        rhs: DVectorView<T>,
        mut solution: DVectorViewMut<T>,
    ) -> Result<SolveOutput, SolveError> {
        check_dimensions(matrix, rhs.len(), solution.len())?;

        let preconditioner = match &mut self.preconditioner {
            Some(preconditioner) => {
                preconditioner.update(matrix);
                preconditioner
            }
            none => none.insert(JacobiPreconditioner::from_csr(matrix)),
        };

        let n = rhs.len();
        let ws = &mut self.workspace;
        ws.prepare_buffers(n);
        ws.x.copy_from(&solution);

        let b_norm = rhs.norm();
        if b_norm == T::zero() {
            solution.fill(T::zero());
            return Ok(SolveOutput::iterative(0));
        }
        let abs_tol = self.tolerance.clone() * b_norm.clone();
        let one = T::one();

        // r = b - A x
        apply_owned(matrix, &ws.x, &mut ws.v);
        ws.r.copy_from(&rhs);
        ws.r.axpy(-one.clone(), &ws.v, one.clone());
        ws.r_hat.copy_from(&ws.r);
        ws.v.fill(T::zero());

        if ws.r.norm() <= abs_tol {
            solution.copy_from(&ws.x);
            return Ok(SolveOutput::iterative(0));
        }

        let mut rho = one.clone();
        let mut alpha = one.clone();
        let mut omega = one.clone();

        for iteration in 0..self.max_iter {
            let rho_next = ws.r_hat.dot(&ws.r);
            if rho_next == T::zero() {
                return Err(SolveError::Breakdown { iteration });
            }

            if iteration == 0 {
                ws.p.copy_from(&ws.r);
            } else {
                let beta = (rho_next.clone() / rho.clone()) * (alpha.clone() / omega.clone());
                // p <- r + beta * (p - omega * v)
                ws.p.axpy(-omega.clone(), &ws.v, one.clone());
                ws.p.axpy(one.clone(), &ws.r, beta);
            }

            apply_owned(&*preconditioner, &ws.p, &mut ws.p_hat);
            apply_owned(matrix, &ws.p_hat, &mut ws.v);

            let r_hat_v = ws.r_hat.dot(&ws.v);
            if r_hat_v == T::zero() {
                return Err(SolveError::Breakdown { iteration });
            }
            alpha = rho_next.clone() / r_hat_v;

            // s <- r - alpha * v
            ws.s.copy_from(&ws.r);
            ws.s.axpy(-alpha.clone(), &ws.v, one.clone());
            if ws.s.norm() <= abs_tol {
                ws.x.axpy(alpha.clone(), &ws.p_hat, one.clone());
                solution.copy_from(&ws.x);
                debug!("BiCGSTAB converged after {} iterations", iteration + 1);
                return Ok(SolveOutput::iterative(iteration + 1));
            }

            apply_owned(&*preconditioner, &ws.s, &mut ws.s_hat);
            apply_owned(matrix, &ws.s_hat, &mut ws.t);

            let t_norm_squared = ws.t.dot(&ws.t);
            if t_norm_squared == T::zero() {
                return Err(SolveError::Breakdown { iteration });
            }
            omega = ws.t.dot(&ws.s) / t_norm_squared;

            // x <- x + alpha * p_hat + omega * s_hat
            ws.x.axpy(alpha.clone(), &ws.p_hat, one.clone());
            ws.x.axpy(omega.clone(), &ws.s_hat, one.clone());
            // r <- s - omega * t
            ws.r.copy_from(&ws.s);
            ws.r.axpy(-omega.clone(), &ws.t, one.clone());

            if ws.r.norm() <= abs_tol {
                solution.copy_from(&ws.x);
                debug!("BiCGSTAB converged after {} iterations", iteration + 1);
                return Ok(SolveOutput::iterative(iteration + 1));
            }

            if omega == T::zero() {
                return Err(SolveError::Breakdown { iteration });
            }
            rho = rho_next;
        }

        let relative_residual = (ws.r.norm() / b_norm).to_subset();
        Err(SolveError::MaxIterationsReached {
            max_iter: self.max_iter,
            relative_residual,
        })
    }

    fn name(&self) -> &str {
        "BiCGSTAB"
    }
}
