use fenris_flow::boundary::{near, BoundaryRegion, BoundaryValue, DirichletBc, DirichletBcList, VectorFunction};
use fenris_flow::config::{ConfigError, FlowParameters, TimeStepping};
use fenris_flow::driver::{
    DriverError, DriverState, RunSummary, SimulationBuilder, StepObserver, StepReport, StepView,
};
use fenris_flow::mesh::procedural::{create_unit_square_uniform_tri_mesh_2d, Diagonal};
use fenris_flow::sparse::{CsrMatrix, LinearSolver, SolveError, SolveOutput};
use fenris_flow::space::Subspace;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DVectorView, DVectorViewMut, Point2, Vector2};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// No-slip everywhere and zero pressure at the origin.
fn enclosed_boundary_conditions() -> DirichletBcList {
    DirichletBcList::new()
        .with_bc(DirichletBc::new(
            Subspace::Velocity,
            BoundaryValue::zero_vector(),
            BoundaryRegion::everywhere(),
        ))
        .with_bc(DirichletBc::new(
            Subspace::Pressure,
            BoundaryValue::Scalar(0.0),
            BoundaryRegion::new("origin", |x| near(x.x, 0.0) && near(x.y, 0.0)),
        ))
}

fn implicit_flow() -> FlowParameters {
    FlowParameters {
        theta: 1.0,
        ..Default::default()
    }
}

fn enclosed_builder(time: TimeStepping) -> SimulationBuilder {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2, Diagonal::Right);
    SimulationBuilder::new(mesh, implicit_flow(), time).boundary_conditions(enclosed_boundary_conditions())
}

fn driver_error(err: &eyre::Report) -> Option<&DriverError> {
    err.downcast_ref::<DriverError>()
}

struct FailingSolver;

impl LinearSolver<f64> for FailingSolver {
    fn solve(
        &mut self,
        _matrix: &CsrMatrix<f64>,
        _rhs: DVectorView<f64>,
        _solution: DVectorViewMut<f64>,
    ) -> Result<SolveOutput, SolveError> {
        Err(SolveError::SingularMatrix)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Records the sequence of observer calls.
#[derive(Default, Clone)]
struct RecordingObserver {
    events: Rc<RefCell<Vec<String>>>,
    fail_at_step: Option<usize>,
}

impl StepObserver for RecordingObserver {
    fn on_start(&mut self, view: StepView) -> eyre::Result<()> {
        self.events.borrow_mut().push(format!("start {}", view.step));
        Ok(())
    }

    fn on_step(&mut self, report: &StepReport, view: StepView) -> eyre::Result<()> {
        assert_eq!(report.step, view.step);
        self.events.borrow_mut().push(format!("step {}", report.step));
        if self.fail_at_step == Some(report.step) {
            eyre::bail!("observer refused step {}", report.step);
        }
        Ok(())
    }

    fn on_finish(&mut self, summary: &RunSummary, _view: StepView) -> eyre::Result<()> {
        self.events
            .borrow_mut()
            .push(format!("finish {}", summary.num_steps));
        Ok(())
    }
}

#[test]
fn zero_data_keeps_zero_state() {
    let mut simulation = enclosed_builder(TimeStepping::new(0.1, 0.3)).build().unwrap();
    assert_eq!(simulation.driver_state(), DriverState::Initialized);
    assert!(simulation.motion().is_none());

    let summary = simulation.run().unwrap();
    assert_eq!(summary.num_steps, 3);
    assert_scalar_eq!(summary.final_time, 0.3, comp = abs, tol = 1e-12);
    assert_eq!(summary.max_velocity, 0.0);
    assert_eq!(summary.max_displacement, None);
    assert_eq!(simulation.state().pressure_range(), Some((0.0, 0.0)));
    assert_eq!(simulation.driver_state(), DriverState::Done);
}

#[test]
fn step_reports_follow_time_grid() {
    let mut simulation = enclosed_builder(TimeStepping::new(0.25, 0.5)).build().unwrap();
    let first = simulation.step().unwrap().unwrap();
    assert_eq!(first.step, 1);
    assert_eq!(first.time, 0.25);
    assert_eq!(first.motion, None);
    assert_eq!(simulation.driver_state(), DriverState::Stepping);

    let second = simulation.step().unwrap().unwrap();
    assert_eq!((second.step, second.time), (2, 0.5));
    assert_eq!(simulation.current_time(), 0.5);

    assert_eq!(simulation.step().unwrap(), None);
    assert_eq!(simulation.driver_state(), DriverState::Done);
    assert_eq!(simulation.step_index(), 2);
}

#[test]
fn stepping_after_done_is_an_error() {
    let mut simulation = enclosed_builder(TimeStepping::new(0.5, 0.5)).build().unwrap();
    simulation.run().unwrap();
    let err = simulation.step().unwrap_err();
    assert_eq!(
        driver_error(&err),
        Some(&DriverError::Terminated {
            state: DriverState::Done
        })
    );
    // The terminal state is kept
    assert_eq!(simulation.driver_state(), DriverState::Done);
    assert_eq!(simulation.step_index(), 1);
}

#[test]
fn failed_solve_is_fatal() {
    let mut simulation = enclosed_builder(TimeStepping::new(0.1, 1.0))
        .linear_solver(Box::new(FailingSolver))
        .build()
        .unwrap();
    let err = simulation.step().unwrap_err();
    assert_eq!(err.downcast_ref::<SolveError>(), Some(&SolveError::SingularMatrix));
    assert_eq!(simulation.driver_state(), DriverState::Failed);
    assert_eq!(simulation.step_index(), 0);

    let err = simulation.step().unwrap_err();
    assert_eq!(
        driver_error(&err),
        Some(&DriverError::Terminated {
            state: DriverState::Failed
        })
    );
}

#[test]
fn observers_see_start_steps_and_finish() {
    let observer = RecordingObserver::default();
    let events = observer.events.clone();
    let mut simulation = enclosed_builder(TimeStepping::new(0.1, 0.3))
        .observer(observer)
        .build()
        .unwrap();
    assert!(events.borrow().is_empty());
    simulation.run().unwrap();
    assert_eq!(
        *events.borrow(),
        vec!["start 0", "step 1", "step 2", "step 3", "finish 3"]
    );
}

#[test]
fn observer_error_is_fatal() {
    let observer = RecordingObserver {
        fail_at_step: Some(2),
        ..Default::default()
    };
    let events = observer.events.clone();
    let mut simulation = enclosed_builder(TimeStepping::new(0.1, 1.0))
        .observer(observer)
        .build()
        .unwrap();
    assert!(simulation.run().is_err());
    assert_eq!(simulation.driver_state(), DriverState::Failed);
    assert_eq!(*events.borrow(), vec!["start 0", "step 1", "step 2"]);
}

#[test]
fn empty_mesh_is_rejected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(0, Diagonal::Crossed);
    let err = SimulationBuilder::new(mesh, FlowParameters::default(), TimeStepping::new(0.1, 1.0))
        .build()
        .unwrap_err();
    assert_eq!(driver_error(&err), Some(&DriverError::EmptyMesh));
}

#[test]
fn invalid_parameters_are_rejected_at_build() {
    let err = enclosed_builder(TimeStepping::new(-0.1, 1.0)).build().unwrap_err();
    let config_error = err.downcast_ref::<ConfigError>().unwrap();
    assert_eq!(config_error.parameter(), "dt");

    let mesh = create_unit_square_uniform_tri_mesh_2d(1, Diagonal::Right);
    let flow = FlowParameters {
        viscosity: 0.0,
        ..Default::default()
    };
    assert!(SimulationBuilder::new(mesh, flow, TimeStepping::new(0.1, 1.0))
        .build()
        .is_err());
}

#[test]
fn overlapping_boundary_conditions_are_rejected_at_build() {
    let bcs = enclosed_boundary_conditions().with_bc(DirichletBc::new(
        Subspace::Velocity,
        BoundaryValue::Vector(Vector2::new(1.0, 0.0)),
        BoundaryRegion::new("lid", |x| near(x.y, 1.0)),
    ));
    let mesh = create_unit_square_uniform_tri_mesh_2d(2, Diagonal::Right);
    let result = SimulationBuilder::new(mesh, implicit_flow(), TimeStepping::new(0.1, 1.0))
        .boundary_conditions(bcs)
        .build();
    assert!(result.is_err());
}

#[test]
fn hydrostatic_pressure_balances_gravity() {
    let gravity: VectorFunction = Arc::new(|_: &Point2<f64>, _: f64| Vector2::new(0.0, -1.0));
    let mut simulation = enclosed_builder(TimeStepping::new(0.1, 0.1))
        .forcing(gravity)
        .build()
        .unwrap();
    simulation.run().unwrap();

    let state = simulation.state();
    assert_scalar_eq!(state.max_velocity_magnitude(), 0.0, comp = abs, tol = 1e-10);
    for (v, vertex) in simulation.domain().vertices().iter().enumerate() {
        assert_scalar_eq!(state.pressure_at_vertex(v), -vertex.y, comp = abs, tol = 1e-10);
    }
}
