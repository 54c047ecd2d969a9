//! The time-stepping driver for fixed and moving domains.
//!
//! A [`Simulation`] advances a [`MixedState`] from `t = 0` in steps of fixed size. Each step
//!
//! 1. computes the step time `t_n = n dt` once,
//! 2. assembles the flow system from the previous state (and the previous mesh velocity on a
//!    moving domain),
//! 3. applies the flow boundary conditions at `t_n` and solves,
//! 4. on a moving domain, solves the vector Laplace problem for the mesh velocity `w`,
//!    accumulates the increment `w dt` into the total displacement and moves the mesh by the
//!    increment,
//! 5. accepts the new state and mesh velocity,
//! 6. notifies the registered observers.
//!
//! Any error is fatal: the simulation enters [`DriverState::Failed`] and cannot be stepped
//! again.
use crate::assembly::global::{CsrAssembler, LinearSystem};
use crate::assembly::operators::{LaplaceOperator, NavierStokesInput, NavierStokesOperator};
use crate::boundary::{DirichletBcList, ResolvedDirichletBcs, VectorFunction};
use crate::config::{FlowParameters, LinearSolverKind, TimeStepping};
use crate::mesh::TriangleMesh2d;
use crate::space::FlowDomain;
use crate::state::MixedState;
use eyre::WrapErr;
use fenris_flow_sparse::{LinearSolver, SolveOutput};
use log::{debug, info, warn};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::error::Error;
use std::fmt;

/// Iterative solves needing more iterations than this are reported with a warning.
const ITERATION_WARNING_THRESHOLD: usize = 500;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// Built, no step taken yet.
    Initialized,
    Stepping,
    /// All steps within the horizon have been taken.
    Done,
    /// A step failed. The state is left as it was after the last successful step.
    Failed,
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DriverError {
    /// The simulation was stepped after reaching a terminal state.
    Terminated { state: DriverState },
    EmptyMesh,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated { state } => write!(f, "Cannot step a simulation in terminal state {:?}", state),
            Self::EmptyMesh => write!(f, "The mesh has no cells"),
        }
    }
}

impl Error for DriverError {}

/// Summary of the mesh motion part of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionReport {
    pub solve: SolveOutput,
    pub max_mesh_velocity: f64,
    /// Largest vertex movement during the step.
    pub max_increment: f64,
    /// Largest vertex distance from the initial configuration.
    pub max_displacement: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Step index, starting at `1` for the first solve.
    pub step: usize,
    pub time: f64,
    pub solve: SolveOutput,
    pub max_velocity: f64,
    pub pressure_range: Option<(f64, f64)>,
    pub motion: Option<MotionReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub num_steps: usize,
    /// Time of the last accepted step.
    pub final_time: f64,
    pub max_velocity: f64,
    /// Largest vertex displacement at the end of the run, for moving domains.
    pub max_displacement: Option<f64>,
}

/// Read-only view of the simulation handed to observers.
#[derive(Clone, Copy)]
pub struct StepView<'a> {
    pub step: usize,
    pub time: f64,
    pub domain: &'a FlowDomain,
    pub state: &'a MixedState,
    pub motion: Option<&'a MeshMotion>,
}

/// Hooks invoked by the driver. All methods default to doing nothing.
///
/// An error returned from an observer is fatal, like a failed solve.
pub trait StepObserver {
    /// Called once with the initial state, before the first step.
    fn on_start(&mut self, _view: StepView) -> eyre::Result<()> {
        Ok(())
    }

    /// Called after every accepted step.
    fn on_step(&mut self, _report: &StepReport, _view: StepView) -> eyre::Result<()> {
        Ok(())
    }

    /// Called once when the horizon has been reached.
    fn on_finish(&mut self, _summary: &RunSummary, _view: StepView) -> eyre::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

impl<O: ?Sized + StepObserver> StepObserver for Box<O> {
    fn on_start(&mut self, view: StepView) -> eyre::Result<()> {
        (**self).on_start(view)
    }

    fn on_step(&mut self, report: &StepReport, view: StepView) -> eyre::Result<()> {
        (**self).on_step(report, view)
    }

    fn on_finish(&mut self, summary: &RunSummary, view: StepView) -> eyre::Result<()> {
        (**self).on_finish(summary, view)
    }
}

/// Mesh velocity solve and displacement bookkeeping of a moving domain.
pub struct MeshMotion {
    laplace: LaplaceOperator,
    system: LinearSystem<f64>,
    bcs: ResolvedDirichletBcs,
    solver: Box<dyn LinearSolver<f64>>,
    /// Solution buffer of the current step
    velocity: DVector<f64>,
    /// Mesh velocity accepted at the previous step
    mesh_velocity: DVector<f64>,
    increment: DVector<f64>,
    displacement: DVector<f64>,
    num_solves: usize,
    num_relocations: usize,
}

impl fmt::Debug for MeshMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshMotion")
            .field("solver", &self.solver.name())
            .field("num_solves", &self.num_solves)
            .field("num_relocations", &self.num_relocations)
            .finish()
    }
}

impl MeshMotion {
    /// Mesh velocity accepted at the last step, as a vector P1 function. Zero before the first
    /// step.
    pub fn mesh_velocity(&self) -> DVectorView<f64> {
        DVectorView::from(&self.mesh_velocity)
    }

    /// Accumulated displacement `X` of every vertex.
    pub fn displacement(&self) -> DVectorView<f64> {
        DVectorView::from(&self.displacement)
    }

    /// The increment `Y = w dt` the mesh was moved by in the last step.
    pub fn last_increment(&self) -> DVectorView<f64> {
        DVectorView::from(&self.increment)
    }

    pub fn num_solves(&self) -> usize {
        self.num_solves
    }

    pub fn num_relocations(&self) -> usize {
        self.num_relocations
    }

    pub fn max_displacement(&self) -> f64 {
        max_vertex_norm(&self.displacement)
    }
}

fn max_vertex_norm(values: &DVector<f64>) -> f64 {
    values
        .as_slice()
        .chunks_exact(2)
        .map(|v| v[0].hypot(v[1]))
        .fold(0.0, f64::max)
}

fn check_iterations(output: &SolveOutput, system: &str, step: usize) {
    if let Some(num_iterations) = output.num_iterations {
        if num_iterations > ITERATION_WARNING_THRESHOLD {
            warn!(
                "{} solve at step {} needed {} iterations",
                system, step, num_iterations
            );
        }
    }
}

/// Time-stepping simulation of incompressible flow, on a fixed or moving domain.
///
/// Created with a [`SimulationBuilder`].
pub struct Simulation {
    domain: FlowDomain,
    state: MixedState,
    time: TimeStepping,
    step: usize,
    driver_state: DriverState,
    operator: NavierStokesOperator,
    system: LinearSystem<f64>,
    bcs: ResolvedDirichletBcs,
    forcing: Option<VectorFunction>,
    solver: Box<dyn LinearSolver<f64>>,
    solution: DVector<f64>,
    motion: Option<MeshMotion>,
    assembler: CsrAssembler<f64>,
    observers: Vec<Box<dyn StepObserver>>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("step", &self.step)
            .field("time", &self.time)
            .field("driver_state", &self.driver_state)
            .field("num_dofs", &self.state.len())
            .field("solver", &self.solver.name())
            .field("motion", &self.motion)
            .finish()
    }
}

impl Simulation {
    pub fn domain(&self) -> &FlowDomain {
        &self.domain
    }

    pub fn state(&self) -> &MixedState {
        &self.state
    }

    pub fn motion(&self) -> Option<&MeshMotion> {
        self.motion.as_ref()
    }

    pub fn flow_parameters(&self) -> &FlowParameters {
        self.operator.parameters()
    }

    pub fn time_stepping(&self) -> &TimeStepping {
        &self.time
    }

    pub fn driver_state(&self) -> DriverState {
        self.driver_state
    }

    /// Index of the last accepted step, `0` for the initial state.
    pub fn step_index(&self) -> usize {
        self.step
    }

    /// Time of the last accepted step.
    pub fn current_time(&self) -> f64 {
        self.time.time_at(self.step)
    }

    fn view(&self) -> StepView<'_> {
        StepView {
            step: self.step,
            time: self.current_time(),
            domain: &self.domain,
            state: &self.state,
            motion: self.motion.as_ref(),
        }
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            num_steps: self.step,
            final_time: self.current_time(),
            max_velocity: self.state.max_velocity_magnitude(),
            max_displacement: self.motion.as_ref().map(MeshMotion::max_displacement),
        }
    }

    fn notify<F>(&mut self, mut f: F) -> eyre::Result<()>
    where
        F: FnMut(&mut dyn StepObserver, StepView) -> eyre::Result<()>,
    {
        let mut observers = std::mem::take(&mut self.observers);
        let result = observers
            .iter_mut()
            .try_for_each(|observer| f(&mut **observer, self.view()));
        self.observers = observers;
        result
    }

    /// Takes the next step.
    ///
    /// Returns `Ok(None)` and enters [`DriverState::Done`] if the next step lies beyond the
    /// horizon. Stepping a simulation in a terminal state is an error.
    pub fn step(&mut self) -> eyre::Result<Option<StepReport>> {
        if self.driver_state.is_terminal() {
            return Err(DriverError::Terminated {
                state: self.driver_state,
            }
            .into());
        }
        match self.try_step() {
            Ok(report) => Ok(report),
            Err(err) => {
                self.driver_state = DriverState::Failed;
                Err(err)
            }
        }
    }

    fn try_step(&mut self) -> eyre::Result<Option<StepReport>> {
        if self.driver_state == DriverState::Initialized {
            info!(
                "Starting simulation: {} flow dofs, {} cells, dt = {}, T = {}, {} steps",
                self.state.len(),
                self.domain.num_cells(),
                self.time.dt,
                self.time.final_time,
                self.time.num_steps()
            );
            self.notify(|observer, view| observer.on_start(view))
                .wrap_err("observer failed at start of simulation")?;
            self.driver_state = DriverState::Stepping;
        }

        let n = self.step + 1;
        if !self.time.accepts(n) {
            let summary = self.summary();
            info!(
                "Simulation finished after {} steps at t = {}",
                summary.num_steps, summary.final_time
            );
            self.notify(|observer, view| observer.on_finish(&summary, view))
                .wrap_err("observer failed at end of simulation")?;
            self.driver_state = DriverState::Done;
            return Ok(None);
        }

        let report = self.advance(n)?;
        info!(
            "step {:>5}, t = {:.4}: max |u| = {:.4e}, p in [{:.4e}, {:.4e}]{}",
            report.step,
            report.time,
            report.max_velocity,
            report.pressure_range.map_or(0.0, |(min, _)| min),
            report.pressure_range.map_or(0.0, |(_, max)| max),
            report
                .motion
                .as_ref()
                .map(|motion| format!(", max |X| = {:.4e}", motion.max_displacement))
                .unwrap_or_default()
        );
        self.notify(|observer, view| observer.on_step(&report, view))
            .wrap_err_with(|| format!("observer failed at step {}", n))?;
        Ok(Some(report))
    }

    fn advance(&mut self, n: usize) -> eyre::Result<StepReport> {
        let t = self.time.time_at(n);
        let t_prev = self.time.time_at(n - 1);

        {
            let input = NavierStokesInput {
                previous: &self.state,
                mesh_velocity: self.motion.as_ref().map(|motion| motion.mesh_velocity()),
                forcing: self.forcing.as_ref(),
                previous_time: t_prev,
                time: t,
            };
            let element_assembler = self.operator.element_assembler(self.domain.taylor_hood(), input);
            debug!("Assembling flow system at t = {}", t);
            self.assembler
                .assemble_system_into(&mut self.system, &element_assembler)
                .wrap_err_with(|| format!("failed to assemble flow system at step {}", n))?;
        }
        self.bcs
            .apply(&mut self.system, self.domain.node_positions(), t)
            .wrap_err_with(|| format!("failed to apply flow boundary conditions at step {}", n))?;

        debug!("Solving flow system with {}", self.solver.name());
        let solve = self
            .solver
            .solve(
                &self.system.matrix,
                DVectorView::from(&self.system.rhs),
                DVectorViewMut::from(&mut self.solution),
            )
            .wrap_err_with(|| format!("flow solve failed at step {}, t = {}", n, t))?;
        check_iterations(&solve, "flow", n);

        let motion_report = match self.motion.as_mut() {
            Some(motion) => Some(
                move_mesh(motion, &mut self.domain, &self.assembler, self.time.dt, t)
                    .wrap_err_with(|| format!("mesh motion failed at step {}, t = {}", n, t))?,
            ),
            None => None,
        };

        self.state.assign(DVectorView::from(&self.solution));
        if let Some(motion) = self.motion.as_mut() {
            motion.mesh_velocity.copy_from(&motion.velocity);
        }
        self.step = n;

        Ok(StepReport {
            step: n,
            time: t,
            solve,
            max_velocity: self.state.max_velocity_magnitude(),
            pressure_range: self.state.pressure_range(),
            motion: motion_report,
        })
    }

    /// Steps until the horizon is reached.
    pub fn run(&mut self) -> eyre::Result<RunSummary> {
        while self.step()?.is_some() {}
        Ok(self.summary())
    }
}

/// Solves for the mesh velocity and moves the mesh by one increment.
fn move_mesh(
    motion: &mut MeshMotion,
    domain: &mut FlowDomain,
    assembler: &CsrAssembler<f64>,
    dt: f64,
    t: f64,
) -> eyre::Result<MotionReport> {
    {
        let element_assembler = motion.laplace.element_assembler(domain.vector_p1());
        debug!("Assembling mesh velocity system at t = {}", t);
        assembler
            .assemble_system_into(&mut motion.system, &element_assembler)
            .wrap_err("failed to assemble mesh velocity system")?;
    }
    motion
        .bcs
        .apply(&mut motion.system, domain.node_positions(), t)
        .wrap_err("failed to apply mesh boundary conditions")?;

    debug!("Solving mesh velocity system with {}", motion.solver.name());
    let solve = motion
        .solver
        .solve(
            &motion.system.matrix,
            DVectorView::from(&motion.system.rhs),
            DVectorViewMut::from(&mut motion.velocity),
        )
        .wrap_err("mesh velocity solve failed")?;
    motion.num_solves += 1;

    motion.increment.copy_from(&motion.velocity);
    motion.increment *= dt;
    motion.displacement += &motion.increment;
    domain.relocate(DVectorView::from(&motion.increment));
    motion.num_relocations += 1;

    Ok(MotionReport {
        solve,
        max_mesh_velocity: max_vertex_norm(&motion.velocity),
        max_increment: max_vertex_norm(&motion.increment),
        max_displacement: motion.max_displacement(),
    })
}

/// Configures and builds a [`Simulation`].
///
/// The domain moves if and only if mesh boundary conditions are given with
/// [`mesh_motion`](Self::mesh_motion).
pub struct SimulationBuilder {
    mesh: TriangleMesh2d<f64>,
    flow: FlowParameters,
    time: TimeStepping,
    bcs: DirichletBcList,
    forcing: Option<VectorFunction>,
    solver: Option<Box<dyn LinearSolver<f64>>>,
    mesh_bcs: Option<DirichletBcList>,
    mesh_solver: Option<Box<dyn LinearSolver<f64>>>,
    observers: Vec<Box<dyn StepObserver>>,
}

impl SimulationBuilder {
    pub fn new(mesh: TriangleMesh2d<f64>, flow: FlowParameters, time: TimeStepping) -> Self {
        Self {
            mesh,
            flow,
            time,
            bcs: DirichletBcList::new(),
            forcing: None,
            solver: None,
            mesh_bcs: None,
            mesh_solver: None,
            observers: Vec::new(),
        }
    }

    /// Dirichlet conditions on velocity and pressure.
    pub fn boundary_conditions(self, bcs: DirichletBcList) -> Self {
        Self { bcs, ..self }
    }

    /// Body force `f(x, t)`. Zero if not set.
    pub fn forcing(self, forcing: VectorFunction) -> Self {
        Self {
            forcing: Some(forcing),
            ..self
        }
    }

    /// Makes the domain move with a mesh velocity subject to the given conditions.
    pub fn mesh_motion(self, mesh_bcs: DirichletBcList) -> Self {
        Self {
            mesh_bcs: Some(mesh_bcs),
            ..self
        }
    }

    pub fn linear_solver(self, solver: Box<dyn LinearSolver<f64>>) -> Self {
        Self {
            solver: Some(solver),
            ..self
        }
    }

    pub fn mesh_solver(self, solver: Box<dyn LinearSolver<f64>>) -> Self {
        Self {
            mesh_solver: Some(solver),
            ..self
        }
    }

    pub fn observer(mut self, observer: impl StepObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn build(self) -> eyre::Result<Simulation> {
        self.flow.validate().wrap_err("invalid flow parameters")?;
        self.time.validate().wrap_err("invalid time stepping")?;

        let domain = FlowDomain::new(self.mesh);
        if domain.num_cells() == 0 {
            return Err(DriverError::EmptyMesh.into());
        }

        let assembler = CsrAssembler::default();
        let (system, bcs, state) = {
            let space = domain.taylor_hood();
            let bcs = self
                .bcs
                .resolve(&space)
                .wrap_err("invalid flow boundary conditions")?;
            let system = LinearSystem::zeros(assembler.assemble_pattern(&space));
            (system, bcs, MixedState::zeros_for(&space))
        };
        debug!("Resolved flow boundary conditions: {:?}", bcs.matched_nodes());

        let motion = match self.mesh_bcs {
            Some(mesh_bcs) => {
                let space = domain.vector_p1();
                let bcs = mesh_bcs
                    .resolve(&space)
                    .wrap_err("invalid mesh boundary conditions")?;
                debug!("Resolved mesh boundary conditions: {:?}", bcs.matched_nodes());
                let n = 2 * domain.num_vertices();
                Some(MeshMotion {
                    laplace: LaplaceOperator::new()?,
                    system: LinearSystem::zeros(assembler.assemble_pattern(&space)),
                    bcs,
                    solver: self
                        .mesh_solver
                        .unwrap_or_else(|| LinearSolverKind::default().create()),
                    velocity: DVector::zeros(n),
                    mesh_velocity: DVector::zeros(n),
                    increment: DVector::zeros(n),
                    displacement: DVector::zeros(n),
                    num_solves: 0,
                    num_relocations: 0,
                })
            }
            None => None,
        };

        Ok(Simulation {
            operator: NavierStokesOperator::new(self.flow, self.time.dt)?,
            solution: DVector::zeros(state.len()),
            state,
            time: self.time,
            step: 0,
            driver_state: DriverState::Initialized,
            system,
            bcs,
            forcing: self.forcing,
            solver: self
                .solver
                .unwrap_or_else(|| LinearSolverKind::default().create()),
            motion,
            assembler,
            observers: self.observers,
            domain,
        })
    }
}
