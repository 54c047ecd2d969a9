use crate::assembly::local::{AssemblyError, ElementConnectivityAssembler, ElementVectorAssembler};
use crate::assembly::operators::is_degenerate;
use crate::element::{physical_gradients, FiniteElement, FixedNodesReferenceFiniteElement, Tri6d2Element};
use crate::quadrature::{total_order, Quadrature2d, QuadraturePair2d};
use crate::space::{FunctionSpace, ScalarP1Space};
use crate::state::MixedState;
use nalgebra::DVectorViewMut;

/// The load vector `(curl u, q)` of a Taylor-Hood velocity tested against scalar P1 functions,
/// with `curl u = du_y/dx - du_x/dy`.
#[derive(Debug, Clone)]
pub struct VorticitySource {
    quadrature: QuadraturePair2d<f64>,
}

impl VorticitySource {
    pub fn new() -> Result<Self, AssemblyError> {
        Ok(Self {
            quadrature: total_order::triangle(2)?,
        })
    }

    pub fn element_assembler<'a>(
        &'a self,
        space: ScalarP1Space<'a>,
        state: &'a MixedState,
    ) -> VorticityElementAssembler<'a> {
        VorticityElementAssembler {
            source: self,
            space,
            state,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VorticityElementAssembler<'a> {
    source: &'a VorticitySource,
    space: ScalarP1Space<'a>,
    state: &'a MixedState,
}

impl<'a> ElementConnectivityAssembler for VorticityElementAssembler<'a> {
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

impl<'a> ElementVectorAssembler<f64> for VorticityElementAssembler<'a> {
    fn assemble_element_vector_into(
        &self,
        element_index: usize,
        mut output: DVectorViewMut<f64>,
    ) -> Result<(), AssemblyError> {
        let domain = self.space.domain();
        let cell = &domain.topology().connectivity()[element_index];
        let element = Tri6d2Element::from_connectivity(cell, domain.node_positions())
            .ok_or(AssemblyError::InvalidConnectivity { element_index })?;
        let diameter = element.diameter();

        let quadrature = &self.source.quadrature;
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
            let grad_phi = physical_gradients(&jacobian, &element.gradients(xi)).ok_or(degenerate)?;
            let psi = element.tri3().evaluate_basis(xi);
            let dv = weight * jacobian_determinant.abs();

            let curl: f64 = (0..6)
                .map(|a| {
                    let u = self.state.velocity_at_node(cell[a]);
                    u.y * grad_phi[(0, a)] - u.x * grad_phi[(1, a)]
                })
                .sum();
            for k in 0..3 {
                output[k] += curl * psi[k] * dv;
            }
        }

        Ok(())
    }
}
