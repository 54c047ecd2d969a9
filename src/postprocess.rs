//! Quantities derived from a computed flow.
use crate::assembly::global::{CsrAssembler, SerialVectorAssembler};
use crate::assembly::operators::{LaplaceOperator, VorticitySource};
use crate::space::FlowDomain;
use crate::state::MixedState;
use eyre::WrapErr;
use fenris_flow_sparse::{apply_dirichlet_rows, BandedLu, LinearSolver};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};

/// Computes the stream function `psi` of the velocity in `state` as a scalar P1 function.
///
/// Solves `(grad psi, grad q) = (curl u, q)` with `psi = 0` on the boundary, so that
/// `-laplace psi = curl u`. For a lid-driven cavity the minimum of `psi` measures the strength
/// of the primary vortex.
pub fn streamfunction(domain: &FlowDomain, state: &MixedState) -> eyre::Result<DVector<f64>> {
    let expected = domain.taylor_hood().num_velocity_dofs();
    if state.velocity().len() != expected {
        eyre::bail!(
            "State has {} velocity dofs, but the domain has {}",
            state.velocity().len(),
            expected
        );
    }

    if domain.num_vertices() == 0 {
        return Ok(DVector::zeros(0));
    }

    let space = domain.scalar_p1();
    let laplace = LaplaceOperator::new()?;
    let mut system = CsrAssembler::<f64>::default()
        .assemble_system(&laplace.element_assembler(space))
        .wrap_err("failed to assemble stream function matrix")?;
    let vorticity = VorticitySource::new()?;
    SerialVectorAssembler::<f64>::default()
        .assemble_vector_into(DVectorViewMut::from(&mut system.rhs), &vorticity.element_assembler(space, state))
        .wrap_err("failed to assemble vorticity")?;

    let boundary = domain.boundary_vertices();
    let zeros = vec![0.0; boundary.len()];
    apply_dirichlet_rows(&mut system.matrix, &mut system.rhs, boundary, &zeros)?;

    let mut psi = DVector::zeros(system.dim());
    let mut solver = BandedLu::<f64>::new();
    solver
        .solve(
            &system.matrix,
            DVectorView::from(&system.rhs),
            DVectorViewMut::from(&mut psi),
        )
        .wrap_err("stream function solve failed")?;
    debug!("Stream function range [{:.6}, {:.6}]", psi.min(), psi.max());
    Ok(psi)
}
