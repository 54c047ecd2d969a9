use crate::assembly::local::{AssemblyError, ElementConnectivityAssembler, ElementSystemAssembler};
use crate::assembly::operators::is_degenerate;
use crate::element::{physical_gradients, FiniteElement, FixedNodesReferenceFiniteElement, Tri3d2Element};
use crate::quadrature::{total_order, Quadrature2d, QuadraturePair2d};
use crate::space::FunctionSpace;
use nalgebra::{DMatrixViewMut, DVectorViewMut};

/// The Laplace operator `(grad w, grad z)` on a scalar or vector P1 space.
///
/// On the vector space it extends prescribed boundary velocities of a moving mesh smoothly
/// into the interior, on the scalar space it is the left-hand side of the stream function
/// problem. Components are decoupled and the right-hand side is zero.
#[derive(Debug, Clone)]
pub struct LaplaceOperator {
    quadrature: QuadraturePair2d<f64>,
}

impl LaplaceOperator {
    pub fn new() -> Result<Self, AssemblyError> {
        Ok(Self {
            quadrature: total_order::triangle(2)?,
        })
    }

    /// The space must number the dofs of each cell vertex-major, `c v + i` for `c` components.
    pub fn element_assembler<S: FunctionSpace>(&self, space: S) -> LaplaceElementAssembler<'_, S> {
        LaplaceElementAssembler { operator: self, space }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaplaceElementAssembler<'a, S> {
    operator: &'a LaplaceOperator,
    space: S,
}

impl<'a, S: FunctionSpace> ElementConnectivityAssembler for LaplaceElementAssembler<'a, S> {
    fn num_dofs(&self) -> usize {
        self.space.num_dofs()
    }

    fn num_elements(&self) -> usize {
        self.space.num_elements()
    }

    fn element_dof_count(&self, element_index: usize) -> usize {
        self.space.element_dof_count(element_index)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        self.space.populate_element_dofs(output, element_index)
    }
}

impl<'a, S: FunctionSpace> ElementSystemAssembler<f64> for LaplaceElementAssembler<'a, S> {
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        mut matrix: DMatrixViewMut<f64>,
        _rhs: DVectorViewMut<f64>,
    ) -> Result<(), AssemblyError> {
        let domain = self.space.domain();
        let cell = &domain.mesh().connectivity()[element_index];
        let element = Tri3d2Element::from_connectivity(cell, domain.vertices())
            .ok_or(AssemblyError::InvalidConnectivity { element_index })?;
        let diameter = element.diameter();
        let num_components = self.space.element_dof_count(element_index) / 3;

        let quadrature = &self.operator.quadrature;
        for (&weight, xi) in quadrature.weights().iter().zip(quadrature.points()) {
            let jacobian = element.reference_jacobian(xi);
            let jacobian_determinant = jacobian.determinant();
            let degenerate = AssemblyError::DegenerateElement {
                element_index,
                jacobian_determinant,
            };
            if is_degenerate(jacobian_determinant, diameter) {
                return Err(degenerate);
            }
            let gradients = physical_gradients(&jacobian, &element.gradients(xi)).ok_or(degenerate)?;
            let dv = weight * jacobian_determinant.abs();

            for a in 0..3 {
                for b in 0..3 {
                    let contraction = gradients.column(a).dot(&gradients.column(b)) * dv;
                    for i in 0..num_components {
                        matrix[(num_components * a + i, num_components * b + i)] += contraction;
                    }
                }
            }
        }

        Ok(())
    }
}
