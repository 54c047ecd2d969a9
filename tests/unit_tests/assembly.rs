use fenris_flow::assembly::global::{CsrAssembler, LinearSystem, SerialVectorAssembler};
use fenris_flow::assembly::local::AssemblyError;
use fenris_flow::assembly::operators::{
    LaplaceOperator, NavierStokesInput, NavierStokesOperator, PressureCoupling, ViscousForm, VorticitySource,
};
use fenris_flow::boundary::VectorFunction;
use fenris_flow::config::FlowParameters;
use fenris_flow::connectivity::Tri3d2Connectivity;
use fenris_flow::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, Diagonal};
use fenris_flow::mesh::TriangleMesh2d;
use fenris_flow::nalgebra_sparse::pattern::SparsityPattern;
use fenris_flow::space::FlowDomain;
use fenris_flow::state::MixedState;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Point2, Vector2};
use std::sync::Arc;

fn unit_square_domain(resolution: usize, diagonal: Diagonal) -> FlowDomain {
    FlowDomain::new(create_unit_square_uniform_tri_mesh_2d(resolution, diagonal))
}

fn flow_parameters(coupling: PressureCoupling) -> FlowParameters {
    FlowParameters {
        density: 2.0,
        viscosity: 0.5,
        theta: 0.5,
        coupling,
        viscous_form: ViscousForm::Gradient,
    }
}

/// Velocity dofs interpolating `u` at the P2 nodes, pressure dofs zero.
fn interpolate_velocity(domain: &FlowDomain, u: impl Fn(&Point2<f64>) -> Vector2<f64>) -> DVector<f64> {
    let space = domain.taylor_hood();
    let mut values = DVector::zeros(space.num_velocity_dofs() + space.num_pressure_dofs());
    for (node, x) in domain.node_positions().iter().enumerate() {
        let u_node = u(x);
        values[space.velocity_dof(node, 0)] = u_node.x;
        values[space.velocity_dof(node, 1)] = u_node.y;
    }
    values
}

/// The viscous part of the system matrix, isolated by assembling with two viscosities.
fn viscous_matrix(domain: &FlowDomain, viscous_form: ViscousForm) -> DMatrix<f64> {
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    let with_viscosity = |viscosity| {
        let parameters = FlowParameters {
            viscosity,
            viscous_form,
            ..flow_parameters(PressureCoupling::Divergence)
        };
        DMatrix::from(&assemble_navier_stokes(domain, parameters, input(&previous)).matrix)
    };
    // The difference is theta * (1.0 - 0.5) * K with theta = 0.5
    (with_viscosity(1.0) - with_viscosity(0.5)) * 4.0
}

fn input<'a>(previous: &'a MixedState) -> NavierStokesInput<'a> {
    NavierStokesInput {
        previous,
        mesh_velocity: None,
        forcing: None,
        previous_time: 0.0,
        time: 0.1,
    }
}

fn assemble_navier_stokes(domain: &FlowDomain, parameters: FlowParameters, input: NavierStokesInput) -> LinearSystem<f64> {
    let operator = NavierStokesOperator::new(parameters, 0.1).unwrap();
    let element_assembler = operator.element_assembler(domain.taylor_hood(), input);
    CsrAssembler::default()
        .assemble_system(&element_assembler)
        .unwrap()
}

fn assert_symmetric_pattern_with_diagonal(pattern: &SparsityPattern) {
    for i in 0..pattern.major_dim() {
        let lane = pattern.lane(i);
        assert!(lane.binary_search(&i).is_ok(), "Missing diagonal in row {}", i);
        for &j in lane {
            assert!(pattern.lane(j).binary_search(&i).is_ok(), "Entry ({}, {}) has no transpose", i, j);
        }
    }
}

#[test]
fn taylor_hood_pattern_is_symmetric_with_diagonal() {
    let domain = unit_square_domain(3, Diagonal::Crossed);
    let pattern = CsrAssembler::<f64>::default().assemble_pattern(&domain.taylor_hood());
    assert_eq!(pattern.major_dim(), domain.taylor_hood().num_velocity_dofs() + domain.num_vertices());
    assert_symmetric_pattern_with_diagonal(&pattern);
}

#[test]
fn vector_p1_pattern_couples_vertices_of_shared_cells() {
    let domain = unit_square_domain(1, Diagonal::Right);
    let pattern = CsrAssembler::<f64>::default().assemble_pattern(&domain.vector_p1());
    assert_symmetric_pattern_with_diagonal(&pattern);
    // Vertices 1 and 2 do not share a cell, vertex 0 shares a cell with all others
    assert_eq!(pattern.lane(2), &[0, 1, 2, 3, 6, 7]);
    assert_eq!(pattern.lane(0), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn laplace_annihilates_constants_and_is_symmetric() {
    let domain = unit_square_domain(4, Diagonal::Left);
    let operator = LaplaceOperator::new().unwrap();
    let system = CsrAssembler::default()
        .assemble_system(&operator.element_assembler(domain.vector_p1()))
        .unwrap();
    let dense = DMatrix::from(&system.matrix);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-12);

    let ones = DVector::repeat(system.dim(), 1.0);
    let product = &dense * &ones;
    assert_matrix_eq!(product, DVector::<f64>::zeros(system.dim()), comp = abs, tol = 1e-12);
    assert_eq!(system.rhs, DVector::<f64>::zeros(system.dim()));
}

#[test]
fn laplace_vanishes_on_linear_functions_at_interior_vertices() {
    let domain = unit_square_domain(4, Diagonal::Crossed);
    let operator = LaplaceOperator::new().unwrap();
    let system = CsrAssembler::default()
        .assemble_system(&operator.element_assembler(domain.vector_p1()))
        .unwrap();
    let linear = DVector::from_fn(system.dim(), |i, _| {
        let x = domain.vertices()[i / 2];
        if i % 2 == 0 {
            2.0 * x.x - x.y + 1.0
        } else {
            0.5 * x.y
        }
    });
    let product = &system.matrix * &linear;
    let boundary = domain.boundary_vertices();
    for v in 0..domain.num_vertices() {
        if boundary.binary_search(&v).is_err() {
            assert_scalar_eq!(product[2 * v], 0.0, comp = abs, tol = 1e-12);
            assert_scalar_eq!(product[2 * v + 1], 0.0, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn navier_stokes_velocity_block_sums_to_scaled_area() {
    let domain = unit_square_domain(3, Diagonal::Right);
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    let system = assemble_navier_stokes(&domain, flow_parameters(PressureCoupling::Divergence), input(&previous));

    // The stiffness part annihilates constants and there is no convection for a zero state,
    // leaving rho/dt times the integral of the partition of unity
    let first_component =
        DVector::from_fn(system.dim(), |i, _| if i < space.num_velocity_dofs() && i % 2 == 0 { 1.0 } else { 0.0 });
    let total = first_component.dot(&(&system.matrix * &first_component));
    assert_scalar_eq!(total, 2.0 / 0.1, comp = abs, tol = 1e-10);
    assert_eq!(system.rhs, DVector::<f64>::zeros(system.dim()));
}

#[test]
fn continuity_rows_vanish_for_constant_velocity() {
    let domain = unit_square_domain(2, Diagonal::Crossed);
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    for coupling in [PressureCoupling::Divergence, PressureCoupling::Gradient] {
        let system = assemble_navier_stokes(&domain, flow_parameters(coupling), input(&previous));
        let constant = DVector::from_fn(system.dim(), |i, _| match i {
            i if i >= space.num_velocity_dofs() => 0.0,
            i if i % 2 == 0 => 1.0,
            _ => -2.0,
        });
        let product = &system.matrix * &constant;
        let pressure_rows = product.rows(space.num_velocity_dofs(), space.num_pressure_dofs());
        assert_matrix_eq!(
            pressure_rows,
            DVector::<f64>::zeros(space.num_pressure_dofs()),
            comp = abs,
            tol = 1e-12
        );
    }
}

#[test]
fn gradient_coupling_ignores_constant_pressure() {
    let domain = unit_square_domain(2, Diagonal::Right);
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    let system = assemble_navier_stokes(&domain, flow_parameters(PressureCoupling::Gradient), input(&previous));
    let pressure = DVector::from_fn(system.dim(), |i, _| if i < space.num_velocity_dofs() { 0.0 } else { 1.0 });
    let product = &system.matrix * &pressure;
    let velocity_rows = product.rows(0, space.num_velocity_dofs());
    assert_matrix_eq!(
        velocity_rows,
        DVector::<f64>::zeros(space.num_velocity_dofs()),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn constant_forcing_integrates_to_area() {
    let domain = unit_square_domain(2, Diagonal::Left);
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    let forcing: VectorFunction = Arc::new(|_: &Point2<f64>, _: f64| Vector2::new(1.0, 0.0));
    let input = NavierStokesInput {
        forcing: Some(&forcing),
        ..input(&previous)
    };
    let system = assemble_navier_stokes(&domain, flow_parameters(PressureCoupling::Divergence), input);

    let velocity_rhs = system.rhs.rows(0, space.num_velocity_dofs());
    let first: f64 = velocity_rhs.iter().step_by(2).sum();
    let second: f64 = velocity_rhs.iter().skip(1).step_by(2).sum();
    assert_scalar_eq!(first, 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(second, 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn convection_uses_velocity_relative_to_mesh() {
    let domain = unit_square_domain(2, Diagonal::Crossed);
    let space = domain.taylor_hood();
    let still = MixedState::zeros_for(&space);

    let mut moving = MixedState::zeros_for(&space);
    let values = DVector::from_fn(moving.len(), |i, _| match i {
        i if i >= space.num_velocity_dofs() => 0.0,
        i if i % 2 == 0 => 1.0,
        _ => 0.5,
    });
    moving.assign(DVectorView::from(&values));
    let mesh_velocity = DVector::from_fn(2 * domain.num_vertices(), |i, _| if i % 2 == 0 { 1.0 } else { 0.5 });

    let parameters = flow_parameters(PressureCoupling::Divergence);
    let reference = assemble_navier_stokes(&domain, parameters, input(&still));
    let comoving = assemble_navier_stokes(
        &domain,
        parameters,
        NavierStokesInput {
            mesh_velocity: Some(DVectorView::from(&mesh_velocity)),
            ..input(&moving)
        },
    );
    assert_matrix_eq!(
        DMatrix::from(&comoving.matrix),
        DMatrix::from(&reference.matrix),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn collinear_cell_is_reported_as_degenerate() {
    let mesh = TriangleMesh2d::from_vertices_and_connectivity(
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(2.0, 0.0),
        ],
        vec![Tri3d2Connectivity([0, 1, 2]), Tri3d2Connectivity([0, 1, 3])],
    );
    let domain = FlowDomain::new(mesh);
    let operator = LaplaceOperator::new().unwrap();
    let result = CsrAssembler::default().assemble_system(&operator.element_assembler(domain.vector_p1()));
    assert!(matches!(
        result,
        Err(AssemblyError::DegenerateElement { element_index: 1, .. })
    ));
}

#[test]
fn assembling_into_system_of_other_space_fails() {
    let domain = unit_square_domain(1, Diagonal::Right);
    let space = domain.taylor_hood();
    let previous = MixedState::zeros_for(&space);
    let assembler = CsrAssembler::default();
    let mut system = LinearSystem::zeros(assembler.assemble_pattern(&domain.vector_p1()));

    let operator = NavierStokesOperator::new(FlowParameters::default(), 0.1).unwrap();
    let result = assembler.assemble_system_into(&mut system, &operator.element_assembler(space, input(&previous)));
    assert_eq!(
        result,
        Err(AssemblyError::DimensionMismatch {
            expected: space.num_velocity_dofs() + space.num_pressure_dofs(),
            actual: 8
        })
    );
}

#[test]
fn symmetric_viscous_form_annihilates_rigid_motions() {
    let domain = unit_square_domain(3, Diagonal::Crossed);
    let symmetric = viscous_matrix(&domain, ViscousForm::SymmetricGradient);
    let gradient = viscous_matrix(&domain, ViscousForm::Gradient);
    let zeros = DVector::<f64>::zeros(symmetric.nrows());

    let rotation = interpolate_velocity(&domain, |x| Vector2::new(-x.y, x.x));
    assert_matrix_eq!(&symmetric * &rotation, zeros.clone(), comp = abs, tol = 1e-12);
    // Rotation is harmonic but not constant, the gradient form sees it on the boundary
    assert!((&gradient * &rotation).norm() > 1e-3);

    let translation = interpolate_velocity(&domain, |_| Vector2::new(0.3, -1.0));
    assert_matrix_eq!(&symmetric * &translation, zeros.clone(), comp = abs, tol = 1e-12);
    assert_matrix_eq!(&gradient * &translation, zeros, comp = abs, tol = 1e-12);
}

#[test]
fn symmetric_viscous_form_is_symmetric_and_agrees_on_linear_fields() {
    let domain = unit_square_domain(2, Diagonal::Right);
    let symmetric = viscous_matrix(&domain, ViscousForm::SymmetricGradient);
    assert_matrix_eq!(symmetric, symmetric.transpose(), comp = abs, tol = 1e-12);

    // The forms differ by (grad u^T, grad v), which vanishes at interior nodes for linear u
    let gradient = viscous_matrix(&domain, ViscousForm::Gradient);
    let strain = interpolate_velocity(&domain, |x| Vector2::new(x.x, -x.y));
    let difference = (&symmetric - &gradient) * &strain;
    let space = domain.taylor_hood();
    for node in 0..domain.num_nodes() {
        if domain.boundary_nodes().binary_search(&node).is_err() {
            for i in 0..2 {
                assert_scalar_eq!(difference[space.velocity_dof(node, i)], 0.0, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn explicit_viscous_terms_follow_viscous_form() {
    let domain = unit_square_domain(2, Diagonal::Left);
    let space = domain.taylor_hood();
    let mut previous = MixedState::zeros_for(&space);
    let rotation = interpolate_velocity(&domain, |x| Vector2::new(-x.y, x.x));
    previous.assign(DVectorView::from(&rotation));

    let rhs = |viscous_form, viscosity| {
        let parameters = FlowParameters {
            viscosity,
            viscous_form,
            ..flow_parameters(PressureCoupling::Divergence)
        };
        assemble_navier_stokes(&domain, parameters, input(&previous)).rhs
    };
    // The explicit viscous contribution of a rigid rotation vanishes only for the symmetric form
    let symmetric = rhs(ViscousForm::SymmetricGradient, 1.0) - rhs(ViscousForm::SymmetricGradient, 0.5);
    assert_matrix_eq!(symmetric, DVector::<f64>::zeros(symmetric.len()), comp = abs, tol = 1e-12);
    let gradient = rhs(ViscousForm::Gradient, 1.0) - rhs(ViscousForm::Gradient, 0.5);
    assert!(gradient.norm() > 1e-3);
}

#[test]
fn scalar_laplace_rows_sum_to_zero() {
    let domain = unit_square_domain(3, Diagonal::Crossed);
    let operator = LaplaceOperator::new().unwrap();
    let system = CsrAssembler::default()
        .assemble_system(&operator.element_assembler(domain.scalar_p1()))
        .unwrap();
    assert_eq!(system.dim(), domain.num_vertices());
    let dense = DMatrix::from(&system.matrix);
    let row_sums = &dense * DVector::repeat(system.dim(), 1.0);
    assert_matrix_eq!(row_sums, DVector::<f64>::zeros(system.dim()), comp = abs, tol = 1e-12);
    // Diagonal of the vector Laplacian repeats the scalar one per component
    let vector = CsrAssembler::default()
        .assemble_system(&operator.element_assembler(domain.vector_p1()))
        .unwrap();
    let vector_dense = DMatrix::from(&vector.matrix);
    for v in 0..domain.num_vertices() {
        assert_eq!(vector_dense[(2 * v, 2 * v)], dense[(v, v)]);
        assert_eq!(vector_dense[(2 * v + 1, 2 * v + 1)], dense[(v, v)]);
    }
}

#[test]
fn vorticity_of_rotation_integrates_to_twice_the_area() {
    let domain = unit_square_domain(2, Diagonal::Crossed);
    let space = domain.taylor_hood();
    let mut state = MixedState::zeros_for(&space);
    state.assign(DVectorView::from(&interpolate_velocity(&domain, |x| Vector2::new(-x.y, x.x))));

    let source = VorticitySource::new().unwrap();
    let load = SerialVectorAssembler::<f64>::default()
        .assemble_vector(&source.element_assembler(domain.scalar_p1(), &state))
        .unwrap();
    assert_eq!(load.len(), domain.num_vertices());
    assert_scalar_eq!(load.sum(), 2.0, comp = abs, tol = 1e-12);
}

#[test]
fn vector_assembly_into_wrong_size_fails() {
    let domain = unit_square_domain(1, Diagonal::Right);
    let state = MixedState::zeros_for(&domain.taylor_hood());
    let source = VorticitySource::new().unwrap();
    let mut output = DVector::zeros(domain.num_vertices() + 1);
    let result = SerialVectorAssembler::<f64>::default().assemble_vector_into(
        DVectorViewMut::from(&mut output),
        &source.element_assembler(domain.scalar_p1(), &state),
    );
    assert_eq!(
        result,
        Err(AssemblyError::DimensionMismatch {
            expected: 4,
            actual: 5
        })
    );
}
