//! The two preset experiments: a lid-driven cavity on a fixed mesh and a channel whose upper
//! wall oscillates, computed on a moving mesh.
//!
//! Both are plain configurations of [`SimulationBuilder`]. The numeric parameters live in an
//! [`ExperimentConfig`] that can be replaced by a JSON file, while the boundary conditions are
//! fixed in code.
use crate::assembly::operators::{PressureCoupling, ViscousForm};
use crate::boundary::{near, BoundaryRegion, BoundaryValue, DirichletBc, DirichletBcList, OverlapPolicy, BOUNDARY_TOLERANCE};
use crate::config::{ExperimentConfig, FlowParameters, LinearSolverKind, MeshParameters, OutputParameters, TimeStepping};
use crate::driver::SimulationBuilder;
use crate::io::vtk::VtkTrajectoryWriter;
use crate::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, Diagonal};
use crate::space::Subspace;
use eyre::WrapErr;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

pub fn driven_cavity_config() -> ExperimentConfig {
    ExperimentConfig {
        name: "driven_cavity".to_string(),
        mesh: MeshParameters::new(16, Diagonal::Crossed),
        flow: FlowParameters {
            density: 1.0,
            viscosity: 1.0 / 8.0,
            theta: 0.5,
            coupling: PressureCoupling::Divergence,
            viscous_form: ViscousForm::Gradient,
        },
        time: TimeStepping::new(0.02, 1.0),
        solver: LinearSolverKind::BandedLu,
        mesh_solver: LinearSolverKind::BandedLu,
        output: OutputParameters::default(),
    }
}

pub fn ale_channel_config() -> ExperimentConfig {
    ExperimentConfig {
        name: "ale_channel".to_string(),
        mesh: MeshParameters::new(8, Diagonal::Right),
        flow: FlowParameters {
            density: 1.0,
            viscosity: 1.0,
            theta: 0.5,
            coupling: PressureCoupling::Gradient,
            viscous_form: ViscousForm::Gradient,
        },
        time: TimeStepping::new(0.01, 1.5),
        solver: LinearSolverKind::BandedLu,
        mesh_solver: LinearSolverKind::BandedLu,
        output: OutputParameters::default(),
    }
}

/// Unit lid velocity on `y = 1`, no-slip on the remaining walls, and zero pressure at the
/// origin to fix the pressure constant.
pub fn driven_cavity_boundary_conditions() -> DirichletBcList {
    let lid = BoundaryRegion::new("lid", |x| x.y > 1.0 - BOUNDARY_TOLERANCE);
    let walls = BoundaryRegion::new("walls", |x| x.y <= 1.0 - BOUNDARY_TOLERANCE);
    let origin = BoundaryRegion::new("origin", |x| near(x.x, 0.0) && near(x.y, 0.0));
    DirichletBcList::new()
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::Vector(Vector2::new(1.0, 0.0)),
            lid,
        ))
        .with_bc(DirichletBc::new(Subspace::Velocity, BoundaryValue::zero_vector(), walls))
        .with_bc(DirichletBc::new(Subspace::Pressure, BoundaryValue::Scalar(0.0), origin))
}

/// Velocity of the oscillating upper wall, `(0, -2 cos(4 pi t) x (x - 1))`.
pub fn upper_wall_velocity(x: &Point2<f64>, t: f64) -> Vector2<f64> {
    Vector2::new(0.0, -2.0 * (4.0 * PI * t).cos() * x.x * (x.x - 1.0))
}

/// Pressure driven flow from `x = 0` to `x = 1` between a fixed lower wall and the moving upper
/// wall.
pub fn ale_channel_flow_boundary_conditions() -> DirichletBcList {
    DirichletBcList::new()
        .with_bc(DirichletBc::new(
            Subspace::Pressure,
            BoundaryValue::Scalar(1.0),
            BoundaryRegion::new("inflow", |x| near(x.x, 0.0)),
        ))
        .with_bc(DirichletBc::new(
            Subspace::Pressure,
            BoundaryValue::Scalar(0.0),
            BoundaryRegion::new("outflow", |x| near(x.x, 1.0)),
        ))
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::vector_fn(upper_wall_velocity),
            BoundaryRegion::new("upper_wall", |x| near(x.y, 1.0)),
        ))
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::zero_vector(),
            BoundaryRegion::new("lower_wall", |x| near(x.y, 0.0)),
        ))
}

/// The upper wall moves with the flow, the rest of the contour is fixed.
///
/// The two regions share the upper corners, where the fixed contour takes precedence.
pub fn ale_channel_mesh_boundary_conditions() -> DirichletBcList {
    DirichletBcList::new()
        .with_policy(OverlapPolicy::LastWins)
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::vector_fn(upper_wall_velocity),
            BoundaryRegion::new("top", |x| near(x.y, 1.0)),
        ))
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::zero_vector(),
            BoundaryRegion::new("contour", |x| near(x.x, 0.0) || near(x.x, 1.0) || near(x.y, 0.0)),
        ))
}

fn builder_from_config(config: &ExperimentConfig) -> eyre::Result<SimulationBuilder> {
    config
        .validate()
        .wrap_err_with(|| format!("invalid configuration for experiment {}", config.name))?;
    let mesh = create_unit_square_uniform_tri_mesh_2d(config.mesh.resolution, config.mesh.diagonal);
    let mut builder =
        SimulationBuilder::new(mesh, config.flow, config.time).linear_solver(config.solver.create());
    if let Some(directory) = &config.output.directory {
        builder = builder.observer(VtkTrajectoryWriter::new(directory, &config.name).with_interval(config.output.every));
    }
    Ok(builder)
}

/// Lid-driven cavity on a fixed mesh.
pub fn driven_cavity(config: &ExperimentConfig) -> eyre::Result<SimulationBuilder> {
    Ok(builder_from_config(config)?.boundary_conditions(driven_cavity_boundary_conditions()))
}

/// Channel with an oscillating upper wall, on a mesh that follows the wall.
pub fn ale_channel(config: &ExperimentConfig) -> eyre::Result<SimulationBuilder> {
    Ok(builder_from_config(config)?
        .boundary_conditions(ale_channel_flow_boundary_conditions())
        .mesh_motion(ale_channel_mesh_boundary_conditions())
        .mesh_solver(config.mesh_solver.create()))
}
