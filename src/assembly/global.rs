use crate::assembly::local::{AssemblyError, ElementConnectivityAssembler, ElementSystemAssembler, ElementVectorAssembler};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// A square linear system `A x = b` with `A` in CSR format.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem<T: Scalar> {
    pub matrix: CsrMatrix<T>,
    pub rhs: DVector<T>,
}

impl<T: RealField> LinearSystem<T> {
    /// Creates a system with all values set to zero.
    pub fn zeros(pattern: SparsityPattern) -> Self {
        let n = pattern.major_dim();
        let values = vec![T::zero(); pattern.nnz()];
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, values)
            .expect("Number of values matches the pattern by construction");
        Self {
            matrix,
            rhs: DVector::zeros(n),
        }
    }

    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    /// Sets all matrix and right-hand side values to zero, keeping the pattern.
    pub fn clear(&mut self) {
        self.matrix.values_mut().fill(T::zero());
        self.rhs.fill(T::zero());
    }
}

/// An assembler for CSR systems.
#[derive(Debug, Clone)]
pub struct CsrAssembler<T: Scalar> {
    // All members are buffers that help prevent unnecessary allocations
    // when assembling multiple systems with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace<T>>,
}

impl<T: Scalar> Default for CsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(CsrAssemblerWorkspace::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace<T: Scalar> {
    element_global_dofs: Vec<usize>,
    element_matrix: DMatrix<T>,
    element_rhs: DVector<T>,
}

impl<T: Scalar> Default for CsrAssemblerWorkspace<T> {
    fn default() -> Self {
        Self {
            element_global_dofs: Vec::new(),
            element_matrix: DMatrix::from_row_slice(0, 0, &[]),
            element_rhs: DVector::from_row_slice(&[]),
        }
    }
}

impl<T: Scalar> CsrAssembler<T> {
    /// Builds the sparsity pattern coupling all dofs that share an element.
    ///
    /// The diagonal is always part of the pattern, so that rows can later be replaced by
    /// identity rows even for dofs whose diagonal entry is structurally zero.
    pub fn assemble_pattern(&self, element_assembler: &dyn ElementConnectivityAssembler) -> SparsityPattern {
        // Here we optimize for memory usage rather than performance: by collecting into a
        // BTreeSet we store each matrix entry exactly once
        let num_rows = element_assembler.num_dofs();
        let mut matrix_entries: BTreeSet<_> = (0..num_rows).map(|i| (i, i)).collect();
        let mut element_global_dofs = Vec::new();
        for i in 0..element_assembler.num_elements() {
            element_global_dofs.resize(element_assembler.element_dof_count(i), usize::MAX);
            element_assembler.populate_element_dofs(&mut element_global_dofs, i);

            for &dof_i in &element_global_dofs {
                for &dof_j in &element_global_dofs {
                    matrix_entries.insert((dof_i, dof_j));
                }
            }
        }

        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            while i + 1 > offsets.len() {
                // This condition indicates that we have reached a new row. We need to run this
                // in a while loop to correctly handle consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }

        // Make sure we fill out the remaining offsets if the last rows are empty
        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .expect("Entries are sorted and unique by construction")
    }
}

impl<T: RealField> CsrAssembler<T> {
    /// Builds the pattern and assembles a new system.
    pub fn assemble_system(
        &self,
        element_assembler: &dyn ElementSystemAssembler<T>,
    ) -> Result<LinearSystem<T>, AssemblyError> {
        let mut system = LinearSystem::zeros(self.assemble_pattern(element_assembler));
        self.assemble_system_into(&mut system, element_assembler)?;
        Ok(system)
    }

    /// Overwrites the values of an existing system, reusing its sparsity pattern.
    ///
    /// The pattern must contain every entry coupled by the element assembler, for example
    /// by having been built from the same connectivity with
    /// [`assemble_pattern`](Self::assemble_pattern).
    pub fn assemble_system_into(
        &self,
        system: &mut LinearSystem<T>,
        element_assembler: &dyn ElementSystemAssembler<T>,
    ) -> Result<(), AssemblyError> {
        let expected = element_assembler.num_dofs();
        if system.dim() != expected || system.matrix.nrows() != expected {
            return Err(AssemblyError::DimensionMismatch {
                expected,
                actual: system.dim(),
            });
        }
        system.clear();

        // Reuse previously allocated buffers
        let ws = &mut *self.workspace.borrow_mut();
        let element_global_dofs = &mut ws.element_global_dofs;
        let element_matrix = &mut ws.element_matrix;
        let element_rhs = &mut ws.element_rhs;

        for i in 0..element_assembler.num_elements() {
            let element_dof_count = element_assembler.element_dof_count(i);

            element_global_dofs.resize(element_dof_count, 0);
            element_matrix.resize_mut(element_dof_count, element_dof_count, T::zero());
            element_matrix.fill(T::zero());
            element_rhs.resize_vertically_mut(element_dof_count, T::zero());
            element_rhs.fill(T::zero());

            element_assembler.assemble_element_system_into(
                i,
                DMatrixViewMut::from(&mut *element_matrix),
                DVectorViewMut::from(&mut *element_rhs),
            )?;
            element_assembler.populate_element_dofs(element_global_dofs, i);

            for (local_row, &global_row) in element_global_dofs.iter().enumerate() {
                system.rhs[global_row] += element_rhs[local_row].clone();

                let mut csr_row = system.matrix.row_mut(global_row);
                let (cols, values) = csr_row.cols_and_values_mut();
                for (local_col, &global_col) in element_global_dofs.iter().enumerate() {
                    let idx = cols
                        .binary_search(&global_col)
                        .map_err(|_| AssemblyError::MissingPatternEntry {
                            row: global_row,
                            col: global_col,
                        })?;
                    values[idx] += element_matrix[(local_row, local_col)].clone();
                }
            }
        }

        Ok(())
    }
}

/// An assembler for global load vectors.
#[derive(Debug, Clone)]
pub struct SerialVectorAssembler<T: Scalar> {
    workspace: RefCell<(Vec<usize>, DVector<T>)>,
}

impl<T: Scalar> Default for SerialVectorAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new((Vec::new(), DVector::from_row_slice(&[]))),
        }
    }
}

impl<T: RealField> SerialVectorAssembler<T> {
    pub fn assemble_vector(&self, element_assembler: &dyn ElementVectorAssembler<T>) -> Result<DVector<T>, AssemblyError> {
        let mut output = DVector::zeros(element_assembler.num_dofs());
        self.assemble_vector_into(DVectorViewMut::from(&mut output), element_assembler)?;
        Ok(output)
    }

    /// Overwrites `output` with the assembled vector.
    pub fn assemble_vector_into(
        &self,
        mut output: DVectorViewMut<T>,
        element_assembler: &dyn ElementVectorAssembler<T>,
    ) -> Result<(), AssemblyError> {
        let expected = element_assembler.num_dofs();
        if output.len() != expected {
            return Err(AssemblyError::DimensionMismatch {
                expected,
                actual: output.len(),
            });
        }
        output.fill(T::zero());

        let ws = &mut *self.workspace.borrow_mut();
        let (element_global_dofs, element_vector) = ws;
        for i in 0..element_assembler.num_elements() {
            let element_dof_count = element_assembler.element_dof_count(i);
            element_global_dofs.resize(element_dof_count, 0);
            element_vector.resize_vertically_mut(element_dof_count, T::zero());
            element_vector.fill(T::zero());

            element_assembler.assemble_element_vector_into(i, DVectorViewMut::from(&mut *element_vector))?;
            element_assembler.populate_element_dofs(element_global_dofs, i);

            for (local, &global) in element_global_dofs.iter().enumerate() {
                output[global] += element_vector[local].clone();
            }
        }

        Ok(())
    }
}
