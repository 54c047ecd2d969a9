use crate::ordering::{invert_permutation, reverse_cuthill_mckee};
use crate::solver::check_dimensions;
use crate::{LinearSolver, SolveError, SolveOutput};
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cmp::min;

/// A contiguous segment of a matrix row, covering columns `start .. start + values.len()`.
#[derive(Debug, Clone)]
struct BandRow<T> {
    start: usize,
    values: Vec<T>,
}

impl<T: RealField + Copy> BandRow<T> {
    fn end(&self) -> usize {
        self.start + self.values.len()
    }

    fn get(&self, col: usize) -> T {
        if col >= self.start && col < self.end() {
            self.values[col - self.start]
        } else {
            T::zero()
        }
    }

    fn extend_to(&mut self, end: usize) {
        if end > self.end() {
            self.values.resize(end - self.start, T::zero());
        }
    }
}

/// Direct solver based on LU factorization with partial pivoting in banded storage.
///
/// The matrix is first reordered with reverse Cuthill-McKee to reduce its bandwidth. Each row
/// is then stored as a dense segment that grows to the right as fill-in occurs. The cost is
/// roughly `n * kl * (kl + ku)` for lower and upper bandwidths `kl` and `ku` of the reordered
/// matrix, which is far below dense LU for matrices arising from finite element meshes.
///
/// The ordering is cached and reused for as long as the sparsity pattern stays the same.
#[derive(Debug, Clone)]
pub struct BandedLu<T: Scalar> {
    ordering: Option<(SparsityPattern, Vec<usize>)>,
    rows: Vec<BandRow<T>>,
    rhs: Vec<T>,
}

impl<T: Scalar> Default for BandedLu<T> {
    fn default() -> Self {
        Self {
            ordering: None,
            rows: Vec::new(),
            rhs: Vec::new(),
        }
    }
}

impl<T: Scalar> BandedLu<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_ordering(&mut self, pattern: &SparsityPattern) -> &[usize] {
        let is_current = matches!(&self.ordering, Some((cached, _)) if cached == pattern);
        if !is_current {
            let perm = reverse_cuthill_mckee(pattern);
            self.ordering = Some((pattern.clone(), perm));
        }
        match &self.ordering {
            Some((_, perm)) => perm,
            None => &[],
        }
    }
}

impl<T: RealField + Copy> BandedLu<T> {
    fn load_rows(&mut self, matrix: &CsrMatrix<T>, perm: &[usize], inverse: &[usize]) -> usize {
        self.rows.clear();
        let mut lower_bandwidth = 0;
        for (new_row, &old_row) in perm.iter().enumerate() {
            let row = matrix.row(old_row);
            let (mut first, mut last) = (new_row, new_row);
            for &old_col in row.col_indices() {
                first = min(first, inverse[old_col]);
                last = last.max(inverse[old_col]);
            }

            let mut values = vec![T::zero(); last - first + 1];
            for (&old_col, &a_ij) in row.col_indices().iter().zip(row.values()) {
                values[inverse[old_col] - first] += a_ij;
            }
            lower_bandwidth = lower_bandwidth.max(new_row - first);
            self.rows.push(BandRow { start: first, values });
        }
        lower_bandwidth
    }

    /// In-place LU factorization with partial pivoting. Row interchanges are applied to the
    /// stored right-hand side as they happen.
    fn factorize(&mut self, lower_bandwidth: usize) -> Result<(), SolveError> {
        let n = self.rows.len();
        for k in 0..n {
            // Rows further down than the lower bandwidth are still untouched and therefore
            // have no entry in column k
            let last_candidate = min(n - 1, k + lower_bandwidth);

            let mut pivot_row = k;
            let mut pivot_abs = self.rows[k].get(k).abs();
            for r in k + 1..=last_candidate {
                let a_rk = self.rows[r].get(k).abs();
                if a_rk > pivot_abs {
                    pivot_abs = a_rk;
                    pivot_row = r;
                }
            }

            if pivot_abs == T::zero() || !pivot_abs.is_finite() {
                return Err(SolveError::SingularMatrix);
            }
            if pivot_row != k {
                self.rows.swap(k, pivot_row);
                self.rhs.swap(k, pivot_row);
            }

            let (head, tail) = self.rows.split_at_mut(k + 1);
            let pivot = &head[k];
            let a_kk = pivot.get(k);
            let pivot_end = pivot.end();
            for row in tail.iter_mut().take(last_candidate - k) {
                let a_rk = row.get(k);
                if a_rk == T::zero() {
                    continue;
                }
                let factor = a_rk / a_kk;
                row.extend_to(pivot_end);
                row.values[k - row.start] = factor;
                for j in k + 1..pivot_end {
                    row.values[j - row.start] -= factor * pivot.values[j - pivot.start];
                }
            }
        }
        Ok(())
    }

    /// Forward and backward substitution with the factors stored in the rows.
    fn substitute(&mut self) {
        let n = self.rows.len();
        for i in 0..n {
            let row = &self.rows[i];
            let mut y_i = self.rhs[i];
            for j in row.start..i {
                y_i -= row.values[j - row.start] * self.rhs[j];
            }
            self.rhs[i] = y_i;
        }

        for i in (0..n).rev() {
            let row = &self.rows[i];
            let mut x_i = self.rhs[i];
            for j in i + 1..row.end() {
                x_i -= row.values[j - row.start] * self.rhs[j];
            }
            self.rhs[i] = x_i / row.get(i);
        }
    }
}

impl<T: RealField + Copy> LinearSolver<T> for BandedLu<T> {
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        rhs: DVectorView<T>,
        mut solution: DVectorViewMut<T>,
    ) -> Result<SolveOutput, SolveError> {
        check_dimensions(matrix, rhs.len(), solution.len())?;

        let perm = self.update_ordering(matrix.pattern()).to_vec();
        let inverse = invert_permutation(&perm);

        let lower_bandwidth = self.load_rows(matrix, &perm, &inverse);
        self.rhs.clear();
        self.rhs.extend(perm.iter().map(|&old| rhs[old]));
        debug!(
            "Banded LU: {} unknowns, lower bandwidth {} after reordering",
            perm.len(),
            lower_bandwidth
        );

        self.factorize(lower_bandwidth)?;
        self.substitute();

        if self.rhs.iter().any(|x_i| !x_i.is_finite()) {
            return Err(SolveError::NonFiniteSolution);
        }
        for (&old, &x_i) in perm.iter().zip(&self.rhs) {
            solution[old] = x_i;
        }
        Ok(SolveOutput::direct())
    }

    fn name(&self) -> &str {
        "banded LU"
    }
}
