//! Serializable parameters of a simulation.
//!
//! Everything that can be expressed as plain data lives here and can be loaded from JSON.
//! Boundary values and forcing terms are closures and are attached in code, see
//! [`experiments`](crate::experiments).
use crate::assembly::operators::{PressureCoupling, ViscousForm};
use crate::mesh::procedural::Diagonal;
use eyre::WrapErr;
use fenris_flow_sparse::{BandedLu, BiCgStab, DenseLu, LinearSolver};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default tolerance of the time loop termination test `t <= T + tolerance`.
pub const DEFAULT_TIME_TOLERANCE: f64 = 1e-9;

/// Largest number of time steps a [`TimeStepping`] may describe.
pub const MAX_NUM_STEPS: usize = u32::MAX as usize;

/// Physical and discretization parameters of the flow equations.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowParameters {
    #[serde(default = "default_density")]
    pub density: f64,
    /// Kinematic viscosity.
    pub viscosity: f64,
    /// Weight of the new time level. `1` gives implicit Euler, `0.5` Crank-Nicolson.
    pub theta: f64,
    #[serde(default)]
    pub coupling: PressureCoupling,
    #[serde(default)]
    pub viscous_form: ViscousForm,
}

fn default_density() -> f64 {
    1.0
}

impl Default for FlowParameters {
    fn default() -> Self {
        Self {
            density: 1.0,
            viscosity: 1.0,
            theta: 0.5,
            coupling: PressureCoupling::default(),
            viscous_form: ViscousForm::default(),
        }
    }
}

/// Fixed-size time stepping on `[0, T]`.
///
/// Step `n` has time `t_n = n dt` and is taken as long as `t_n <= T + tolerance`. Step `0` is
/// the initial state and involves no solve, so a run consists of
/// [`num_steps`](Self::num_steps) solves with times `t_1, ..., t_num_steps`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStepping {
    pub dt: f64,
    pub final_time: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_TIME_TOLERANCE
}

impl TimeStepping {
    pub fn new(dt: f64, final_time: f64) -> Self {
        Self {
            dt,
            final_time,
            tolerance: DEFAULT_TIME_TOLERANCE,
        }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Time of step `n`. Computed by multiplication so that no rounding error accumulates.
    pub fn time_at(&self, n: usize) -> f64 {
        n as f64 * self.dt
    }

    /// Returns `true` if step `n` lies within the horizon.
    pub fn accepts(&self, n: usize) -> bool {
        self.time_at(n) <= self.final_time + self.tolerance
    }

    /// Number of steps taken after the initial state.
    ///
    /// Returns `0` for parameters that fail [`validate`](Self::validate).
    pub fn num_steps(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        let horizon = self.final_time + self.tolerance;
        let mut n = (horizon / self.dt).floor() as usize;
        // The division may be off by one in either direction, the multiplication decides
        while n < MAX_NUM_STEPS && self.accepts(n + 1) {
            n += 1;
        }
        while n > 0 && !self.accepts(n) {
            n -= 1;
        }
        n
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::invalid("dt", self.dt, "must be positive and finite"));
        }
        if !(self.final_time.is_finite() && self.final_time > 0.0) {
            return Err(ConfigError::invalid(
                "final_time",
                self.final_time,
                "must be positive and finite",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                "tolerance",
                self.tolerance,
                "must be non-negative and finite",
            ));
        }
        if (self.final_time + self.tolerance) / self.dt > MAX_NUM_STEPS as f64 {
            return Err(ConfigError::invalid(
                "dt",
                self.dt,
                "is too small for the time horizon, the step count does not fit in 32 bits",
            ));
        }
        Ok(())
    }
}

/// Structured mesh of the unit square.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshParameters {
    /// Number of cells along each side.
    pub resolution: usize,
    #[serde(default)]
    pub diagonal: Diagonal,
}

impl MeshParameters {
    pub fn new(resolution: usize, diagonal: Diagonal) -> Self {
        Self { resolution, diagonal }
    }
}

/// Selects the linear solver used for a system.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// LU factorization with partial pivoting on a bandwidth-reducing reordering.
    BandedLu,
    /// Dense LU factorization. Only suitable for small systems.
    DenseLu,
    /// Jacobi-preconditioned BiCGSTAB.
    BiCgStab { tolerance: f64, max_iterations: usize },
}

impl Default for LinearSolverKind {
    fn default() -> Self {
        Self::BandedLu
    }
}

impl LinearSolverKind {
    pub fn create(&self) -> Box<dyn LinearSolver<f64>> {
        match *self {
            Self::BandedLu => Box::new(BandedLu::new()),
            Self::DenseLu => Box::new(DenseLu),
            Self::BiCgStab {
                tolerance,
                max_iterations,
            } => Box::new(BiCgStab::new(tolerance).with_max_iter(max_iterations)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::BiCgStab {
            tolerance,
            max_iterations,
        } = *self
        {
            if !(tolerance.is_finite() && tolerance > 0.0) {
                return Err(ConfigError::invalid(
                    "solver.tolerance",
                    tolerance,
                    "must be positive and finite",
                ));
            }
            if max_iterations == 0 {
                return Err(ConfigError::invalid("solver.max_iterations", 0.0, "must be positive"));
            }
        }
        Ok(())
    }
}

/// Where and how often the trajectory is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputParameters {
    /// Output directory. No output is written if `None`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Write every `every`-th step. The initial state is always written.
    #[serde(default = "default_output_interval")]
    pub every: usize,
}

fn default_output_interval() -> usize {
    1
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            directory: None,
            every: 1,
        }
    }
}

/// Complete plain-data description of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub mesh: MeshParameters,
    pub flow: FlowParameters,
    pub time: TimeStepping,
    #[serde(default)]
    pub solver: LinearSolverKind,
    /// Solver for the mesh velocity system. Ignored on fixed domains.
    #[serde(default)]
    pub mesh_solver: LinearSolverKind,
    #[serde(default)]
    pub output: OutputParameters,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flow.validate()?;
        self.time.validate()?;
        self.solver.validate()?;
        self.mesh_solver.validate()?;
        if self.mesh.resolution == 0 {
            return Err(ConfigError::invalid("mesh.resolution", 0.0, "must be positive"));
        }
        if self.output.every == 0 {
            return Err(ConfigError::invalid("output.every", 0.0, "must be positive"));
        }
        Ok(())
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(json).wrap_err("failed to parse experiment configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&json).wrap_err_with(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn to_json_string(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FlowParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(ConfigError::invalid("density", self.density, "must be positive and finite"));
        }
        if !(self.viscosity.is_finite() && self.viscosity > 0.0) {
            return Err(ConfigError::invalid(
                "viscosity",
                self.viscosity,
                "must be positive and finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.theta) {
            return Err(ConfigError::invalid("theta", self.theta, "must lie in [0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    parameter: &'static str,
    value: f64,
    reason: &'static str,
}

impl ConfigError {
    fn invalid(parameter: &'static str, value: f64, reason: &'static str) -> Self {
        Self {
            parameter,
            value,
            reason,
        }
    }

    pub fn parameter(&self) -> &str {
        self.parameter
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} = {}: {}", self.parameter, self.value, self.reason)
    }
}

impl Error for ConfigError {}
