use fenris_flow::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, Diagonal};
use fenris_flow::postprocess::streamfunction;
use fenris_flow::space::FlowDomain;
use fenris_flow::state::MixedState;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DVector, DVectorView, Point2, Vector2};

/// A state whose velocity interpolates `u` at the P2 nodes and whose pressure is zero.
fn interpolated_state(domain: &FlowDomain, u: impl Fn(&Point2<f64>) -> Vector2<f64>) -> MixedState {
    let space = domain.taylor_hood();
    let mut state = MixedState::zeros_for(&space);
    let mut values = DVector::zeros(state.len());
    for (node, x) in domain.node_positions().iter().enumerate() {
        let u_node = u(x);
        values[space.velocity_dof(node, 0)] = u_node.x;
        values[space.velocity_dof(node, 1)] = u_node.y;
    }
    state.assign(DVectorView::from(&values));
    state
}

#[test]
fn uniform_flow_has_zero_stream_function() {
    let domain = FlowDomain::new(create_unit_square_uniform_tri_mesh_2d(4, Diagonal::Left));
    let state = interpolated_state(&domain, |_| Vector2::new(1.0, -0.5));
    let psi = streamfunction(&domain, &state).unwrap();
    assert_eq!(psi.len(), domain.num_vertices());
    for value in psi.iter() {
        assert_scalar_eq!(*value, 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn rigid_rotation_gives_positive_stream_function() {
    // Counter-clockwise rotation with constant vorticity 2, so that -laplace psi = 2
    let domain = FlowDomain::new(create_unit_square_uniform_tri_mesh_2d(8, Diagonal::Crossed));
    let state = interpolated_state(&domain, |x| Vector2::new(-(x.y - 0.5), x.x - 0.5));
    let psi = streamfunction(&domain, &state).unwrap();

    let boundary = domain.boundary_vertices();
    for (v, value) in psi.iter().enumerate() {
        if boundary.binary_search(&v).is_ok() {
            assert_eq!(*value, 0.0);
        } else {
            assert!(*value > 0.0);
        }
    }

    // Series solution at the center of the unit square is about 0.1473
    let center = domain
        .vertices()
        .iter()
        .position(|x| (x - Point2::new(0.5, 0.5)).norm() < 1e-12)
        .unwrap();
    assert_scalar_eq!(psi[center], 0.1473, comp = abs, tol = 0.01);
    assert_eq!(psi.argmax().0, center);
}

#[test]
fn state_of_other_domain_is_rejected() {
    let domain = FlowDomain::new(create_unit_square_uniform_tri_mesh_2d(2, Diagonal::Right));
    let other = FlowDomain::new(create_unit_square_uniform_tri_mesh_2d(3, Diagonal::Right));
    let state = MixedState::zeros_for(&other.taylor_hood());
    assert!(streamfunction(&domain, &state).is_err());
}
