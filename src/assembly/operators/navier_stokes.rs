use crate::assembly::local::{AssemblyError, ElementConnectivityAssembler, ElementSystemAssembler};
use crate::assembly::operators::{is_degenerate, PressureCoupling, ViscousForm};
use crate::boundary::VectorFunction;
use crate::config::FlowParameters;
use crate::element::{physical_gradients, FiniteElement, FixedNodesReferenceFiniteElement, Tri6d2Element};
use crate::quadrature::{total_order, Quadrature2d, QuadraturePair2d};
use crate::space::{FunctionSpace, TaylorHoodSpace};
use crate::state::MixedState;
use nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut, Matrix2, Point2, Vector2};

/// Theta-scheme discretization of the incompressible Navier-Stokes equations on a
/// Taylor-Hood space.
///
/// Given the state `u0` at the previous time level and the convective velocity
/// `beta = u0 - w0`, where `w0` is the mesh velocity (zero on a fixed domain), the operator
/// assembles the linear system for `(u, p)` from
///
/// ```text
/// rho/dt (u - u0, v) + nu (grad u_mid, grad v) + rho ((grad u_mid) beta, v)
///     + P(p, v) + (q, div u) - (f_mid, v) = 0
/// ```
///
/// with `u_mid = (1 - theta) u0 + theta u`, `f_mid = (1 - theta) f(t_prev) + theta f(t)` and
/// `P` given by the [`PressureCoupling`]. The pressure is treated fully implicitly. With
/// [`ViscousForm::SymmetricGradient`] the viscous term is `2 nu (eps(u_mid), eps(v))` instead.
#[derive(Debug, Clone)]
pub struct NavierStokesOperator {
    parameters: FlowParameters,
    dt: f64,
    quadrature: QuadraturePair2d<f64>,
}

/// Data at the previous time level, borrowed for the assembly of a single step.
#[derive(Clone, Copy)]
pub struct NavierStokesInput<'a> {
    pub previous: &'a MixedState,
    /// Mesh velocity accepted at the previous step as a vector P1 function, if the mesh moves.
    pub mesh_velocity: Option<DVectorView<'a, f64>>,
    pub forcing: Option<&'a VectorFunction>,
    pub previous_time: f64,
    pub time: f64,
}

impl NavierStokesOperator {
    pub fn new(parameters: FlowParameters, dt: f64) -> Result<Self, AssemblyError> {
        Ok(Self {
            parameters,
            dt,
            quadrature: total_order::triangle(5)?,
        })
    }

    pub fn parameters(&self) -> &FlowParameters {
        &self.parameters
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn element_assembler<'a>(
        &'a self,
        space: TaylorHoodSpace<'a>,
        input: NavierStokesInput<'a>,
    ) -> NavierStokesElementAssembler<'a> {
        NavierStokesElementAssembler {
            operator: self,
            space,
            input,
        }
    }
}

pub struct NavierStokesElementAssembler<'a> {
    operator: &'a NavierStokesOperator,
    space: TaylorHoodSpace<'a>,
    input: NavierStokesInput<'a>,
}

impl<'a> NavierStokesElementAssembler<'a> {
    fn forcing_midpoint(&self, x: &Point2<f64>) -> Vector2<f64> {
        let theta = self.operator.parameters.theta;
        match self.input.forcing {
            Some(f) => f(x, self.input.previous_time) * (1.0 - theta) + f(x, self.input.time) * theta,
            None => Vector2::zeros(),
        }
    }

    fn vertex_mesh_velocity(&self, vertex: usize) -> Vector2<f64> {
        match &self.input.mesh_velocity {
            Some(w) => Vector2::new(w[2 * vertex], w[2 * vertex + 1]),
            None => Vector2::zeros(),
        }
    }
}

impl<'a> ElementConnectivityAssembler for NavierStokesElementAssembler<'a> {
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

impl<'a> ElementSystemAssembler<f64> for NavierStokesElementAssembler<'a> {
    #[allow(non_snake_case)]
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        mut matrix: DMatrixViewMut<f64>,
        mut rhs: DVectorViewMut<f64>,
    ) -> Result<(), AssemblyError> {
        let domain = self.space.domain();
        let cell = &domain.topology().connectivity()[element_index];
        let element = Tri6d2Element::from_connectivity(cell, domain.node_positions())
            .ok_or(AssemblyError::InvalidConnectivity { element_index })?;
        let diameter = element.diameter();

        let FlowParameters {
            density: rho,
            viscosity: nu,
            theta,
            coupling,
            viscous_form,
            ..
        } = self.operator.parameters;
        let symmetric = viscous_form == ViscousForm::SymmetricGradient;
        let dt = self.operator.dt;

        let u0: [Vector2<f64>; 6] = std::array::from_fn(|a| self.input.previous.velocity_at_node(cell[a]));
        let w0: [Vector2<f64>; 3] = std::array::from_fn(|k| self.vertex_mesh_velocity(cell[k]));

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
            let phi = element.evaluate_basis(xi);
            let grad_phi = physical_gradients(&jacobian, &element.gradients(xi)).ok_or(degenerate.clone())?;
            let psi = element.tri3().evaluate_basis(xi);
            let grad_psi = physical_gradients(&jacobian, &element.tri3().gradients(xi)).ok_or(degenerate)?;
            let dv = weight * jacobian_determinant.abs();

            // Previous velocity, its gradient (row i holds grad u0_i) and the convective velocity
            let mut u0_q = Vector2::zeros();
            let mut grad_u0 = Matrix2::zeros();
            for a in 0..6 {
                u0_q += u0[a] * phi[a];
                grad_u0 += u0[a] * grad_phi.column(a).transpose();
            }
            let w0_q: Vector2<f64> = (0..3).map(|k| w0[k] * psi[k]).sum();
            let beta = u0_q - w0_q;
            let convection_u0 = grad_u0 * beta;
            let f_mid = self.forcing_midpoint(&element.map_reference_coords(xi));

            for a in 0..6 {
                let grad_a = grad_phi.column(a);
                for i in 0..2 {
                    let mut viscous_u0_a = grad_u0[(i, 0)] * grad_a[0] + grad_u0[(i, 1)] * grad_a[1];
                    if symmetric {
                        // Transposed part: sum_j d_i u0_j d_j phi_a
                        viscous_u0_a += grad_u0[(0, i)] * grad_a[0] + grad_u0[(1, i)] * grad_a[1];
                    }
                    rhs[2 * a + i] += (rho / dt * u0_q[i] * phi[a]
                        - (1.0 - theta) * nu * viscous_u0_a
                        - (1.0 - theta) * rho * convection_u0[i] * phi[a]
                        + f_mid[i] * phi[a])
                        * dv;
                }

                for b in 0..6 {
                    let grad_b = grad_phi.column(b);
                    let A_ab = rho / dt * phi[a] * phi[b]
                        + theta * nu * grad_a.dot(&grad_b)
                        + theta * rho * beta.dot(&grad_b) * phi[a];
                    for i in 0..2 {
                        matrix[(2 * a + i, 2 * b + i)] += A_ab * dv;
                    }
                    if symmetric {
                        for i in 0..2 {
                            for j in 0..2 {
                                matrix[(2 * a + i, 2 * b + j)] += theta * nu * grad_a[j] * grad_b[i] * dv;
                            }
                        }
                    }
                }

                for k in 0..3 {
                    for i in 0..2 {
                        let B_aik = match coupling {
                            PressureCoupling::Divergence => -psi[k] * grad_a[i],
                            PressureCoupling::Gradient => grad_psi[(i, k)] * phi[a],
                        };
                        matrix[(2 * a + i, 12 + k)] += B_aik * dv;
                        // Continuity equation (q, div u)
                        matrix[(12 + k, 2 * a + i)] += psi[k] * grad_a[i] * dv;
                    }
                }
            }
        }

        Ok(())
    }
}
