//! Dirichlet boundary conditions on named boundary regions.
//!
//! A [`DirichletBcList`] is an ordered list of `(region, subspace, value)` entries. Before it
//! can be applied, the list is resolved against a function space: each region predicate is
//! evaluated once on the boundary nodes of the initial configuration, and the matched nodes are
//! cached. Values are evaluated at the current node positions and an explicitly passed time
//! every time the conditions are applied, so time-dependent data and moving meshes need no
//! shared state.
use crate::assembly::global::LinearSystem;
use crate::space::{BoundaryNode, FunctionSpace, Subspace};
use fenris_flow_sparse::apply_dirichlet_rows;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Half-width of the band used by [`near`].
pub const BOUNDARY_TOLERANCE: f64 = 1e-10;

/// Returns `true` if `a` lies within [`BOUNDARY_TOLERANCE`] of `b`.
pub fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= BOUNDARY_TOLERANCE
}

pub type ScalarFunction = Arc<dyn Fn(&Point2<f64>, f64) -> f64 + Send + Sync>;
pub type VectorFunction = Arc<dyn Fn(&Point2<f64>, f64) -> Vector2<f64> + Send + Sync>;
type Predicate = Arc<dyn Fn(&Point2<f64>) -> bool + Send + Sync>;

/// A named subset of the boundary, given by a predicate on boundary node positions.
#[derive(Clone)]
pub struct BoundaryRegion {
    name: String,
    predicate: Predicate,
}

impl BoundaryRegion {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: 'static + Fn(&Point2<f64>) -> bool + Send + Sync,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// The whole boundary.
    pub fn everywhere() -> Self {
        Self::new("boundary", |_| true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the predicate. Only meaningful for points on the boundary.
    pub fn contains(&self, x: &Point2<f64>) -> bool {
        (self.predicate)(x)
    }
}

impl fmt::Debug for BoundaryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryRegion").field("name", &self.name).finish()
    }
}

/// Value prescribed by a boundary condition.
///
/// Functions receive the current node position and the time explicitly.
#[derive(Clone)]
pub enum BoundaryValue {
    Scalar(f64),
    Vector(Vector2<f64>),
    ScalarFn(ScalarFunction),
    VectorFn(VectorFunction),
}

impl BoundaryValue {
    pub fn scalar_fn<F>(f: F) -> Self
    where
        F: 'static + Fn(&Point2<f64>, f64) -> f64 + Send + Sync,
    {
        Self::ScalarFn(Arc::new(f))
    }

    pub fn vector_fn<F>(f: F) -> Self
    where
        F: 'static + Fn(&Point2<f64>, f64) -> Vector2<f64> + Send + Sync,
    {
        Self::VectorFn(Arc::new(f))
    }

    pub fn zero_vector() -> Self {
        Self::Vector(Vector2::zeros())
    }

    pub fn num_components(&self) -> usize {
        match self {
            Self::Scalar(_) | Self::ScalarFn(_) => 1,
            Self::Vector(_) | Self::VectorFn(_) => 2,
        }
    }

    /// Evaluates the value at `x` and time `t`, appending one entry per component.
    pub fn evaluate_into(&self, output: &mut Vec<f64>, x: &Point2<f64>, t: f64) {
        match self {
            Self::Scalar(value) => output.push(*value),
            Self::Vector(value) => output.extend_from_slice(value.as_slice()),
            Self::ScalarFn(f) => output.push(f(x, t)),
            Self::VectorFn(f) => output.extend_from_slice(f(x, t).as_slice()),
        }
    }
}

impl fmt::Debug for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Self::Vector(value) => f.debug_tuple("Vector").field(value).finish(),
            Self::ScalarFn(_) => f.write_str("ScalarFn(..)"),
            Self::VectorFn(_) => f.write_str("VectorFn(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirichletBc {
    pub subspace: Subspace,
    pub value: BoundaryValue,
    pub region: BoundaryRegion,
}

impl DirichletBc {
    pub fn new(subspace: Subspace, value: BoundaryValue, region: BoundaryRegion) -> Self {
        Self {
            subspace,
            value,
            region,
        }
    }
}

/// How entries of a [`DirichletBcList`] may share boundary nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// No boundary node may be matched by two entries targeting the same subspace.
    Disjoint,
    /// Entries may overlap. Later entries override earlier ones on shared nodes.
    LastWins,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        Self::Disjoint
    }
}

/// Ordered list of Dirichlet boundary conditions.
#[derive(Debug, Clone, Default)]
pub struct DirichletBcList {
    entries: Vec<DirichletBc>,
    policy: OverlapPolicy,
}

/// Boundary points that are not covered exactly once by the entries of a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Indices of points matched by no entry.
    pub unmatched: Vec<usize>,
    /// Indices of points matched by several entries, with the indices of the matching entries.
    pub overlapping: Vec<(usize, Vec<usize>)>,
}

impl PartitionReport {
    pub fn is_partition(&self) -> bool {
        self.unmatched.is_empty() && self.overlapping.is_empty()
    }
}

impl DirichletBcList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: OverlapPolicy) -> Self {
        Self { policy, ..self }
    }

    pub fn with_bc(mut self, bc: DirichletBc) -> Self {
        self.push(bc);
        self
    }

    pub fn push(&mut self, bc: DirichletBc) {
        self.entries.push(bc);
    }

    pub fn entries(&self) -> &[DirichletBc] {
        &self.entries
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reports which of the given (boundary) points are matched by zero or by several entries
    /// targeting `subspace`.
    pub fn partition_report(&self, subspace: Subspace, points: &[Point2<f64>]) -> PartitionReport {
        let mut report = PartitionReport::default();
        for (point_index, x) in points.iter().enumerate() {
            let matches: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, bc)| bc.subspace == subspace && bc.region.contains(x))
                .map(|(entry_index, _)| entry_index)
                .collect();
            match matches.len() {
                0 => report.unmatched.push(point_index),
                1 => {}
                _ => report.overlapping.push((point_index, matches)),
            }
        }
        report
    }

    /// Checks that every given point is matched by exactly one entry targeting `subspace`.
    pub fn check_partition(&self, subspace: Subspace, points: &[Point2<f64>]) -> Result<(), BoundaryConditionError> {
        let report = self.partition_report(subspace, points);
        if report.is_partition() {
            Ok(())
        } else {
            Err(BoundaryConditionError::NotAPartition {
                subspace,
                unmatched: report.unmatched.len(),
                overlapping: report.overlapping.len(),
            })
        }
    }

    /// Validates the list against a function space and caches the boundary nodes matched by
    /// each entry, using the reference configuration of the domain.
    pub fn resolve<S>(&self, space: &S) -> Result<ResolvedDirichletBcs, BoundaryConditionError>
    where
        S: ?Sized + FunctionSpace,
    {
        let reference_positions = space.domain().reference_node_positions();
        let mut entries = Vec::with_capacity(self.entries.len());
        // Maps (subspace, node) to the first entry that matched it
        let mut claimed = BTreeMap::new();

        for (entry_index, bc) in self.entries.iter().enumerate() {
            let candidates = space
                .boundary_dofs(bc.subspace)
                .ok_or_else(|| BoundaryConditionError::UnsupportedSubspace {
                    entry: entry_index,
                    region: bc.region.name().to_string(),
                    subspace: bc.subspace,
                })?;

            let expected = bc.subspace.num_components();
            let actual = bc.value.num_components();
            if expected != actual {
                return Err(BoundaryConditionError::ArityMismatch {
                    entry: entry_index,
                    region: bc.region.name().to_string(),
                    expected,
                    actual,
                });
            }

            let nodes: Vec<BoundaryNode> = candidates
                .into_iter()
                .filter(|boundary_node| bc.region.contains(&reference_positions[boundary_node.node]))
                .collect();

            for boundary_node in &nodes {
                let previous = claimed
                    .entry((bc.subspace, boundary_node.node))
                    .or_insert(entry_index);
                if *previous != entry_index && self.policy == OverlapPolicy::Disjoint {
                    return Err(BoundaryConditionError::Overlap {
                        subspace: bc.subspace,
                        node: boundary_node.node,
                        first: self.entries[*previous].region.name().to_string(),
                        second: bc.region.name().to_string(),
                    });
                }
            }

            entries.push(ResolvedEntry {
                region: bc.region.name().to_string(),
                value: bc.value.clone(),
                nodes,
            });
        }

        Ok(ResolvedDirichletBcs {
            entries,
            num_dofs: space.num_dofs(),
            dofs: Vec::new(),
            values: Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
struct ResolvedEntry {
    region: String,
    value: BoundaryValue,
    nodes: Vec<BoundaryNode>,
}

/// Boundary conditions whose regions have been resolved to boundary nodes of a function space.
#[derive(Debug, Clone)]
pub struct ResolvedDirichletBcs {
    entries: Vec<ResolvedEntry>,
    num_dofs: usize,
    // Buffers reused between applications
    dofs: Vec<usize>,
    values: Vec<f64>,
}

impl ResolvedDirichletBcs {
    /// Number of boundary nodes matched by each entry, in list order, together with the region
    /// name.
    pub fn matched_nodes(&self) -> Vec<(&str, usize)> {
        self.entries
            .iter()
            .map(|entry| (entry.region.as_str(), entry.nodes.len()))
            .collect()
    }

    /// Sorted, deduplicated list of all constrained dofs.
    pub fn constrained_dofs(&self) -> Vec<usize> {
        let mut dofs: Vec<usize> = self
            .entries
            .iter()
            .flat_map(|entry| {
                let num_components = entry.value.num_components();
                entry
                    .nodes
                    .iter()
                    .flat_map(move |node| node.first_dof..node.first_dof + num_components)
            })
            .collect();
        dofs.sort_unstable();
        dofs.dedup();
        dofs
    }

    /// Evaluates every entry in list order at the given node positions and time `t`.
    ///
    /// The result contains one `(dof, value)` pair per constrained component, with later
    /// entries following earlier ones.
    pub fn evaluate(&self, node_positions: &[Point2<f64>], t: f64) -> (Vec<usize>, Vec<f64>) {
        let mut dofs = Vec::new();
        let mut values = Vec::new();
        self.evaluate_into(&mut dofs, &mut values, node_positions, t);
        (dofs, values)
    }

    fn evaluate_into(&self, dofs: &mut Vec<usize>, values: &mut Vec<f64>, node_positions: &[Point2<f64>], t: f64) {
        dofs.clear();
        values.clear();
        for entry in &self.entries {
            let num_components = entry.value.num_components();
            for boundary_node in &entry.nodes {
                entry
                    .value
                    .evaluate_into(values, &node_positions[boundary_node.node], t);
                dofs.extend(boundary_node.first_dof..boundary_node.first_dof + num_components);
            }
        }
    }

    /// Applies the conditions to the system at time `t`, in list order.
    ///
    /// Each constrained row is replaced by the corresponding identity row and the right-hand
    /// side by the prescribed value, so entries later in the list override earlier ones on
    /// shared dofs. Applying the same conditions twice leaves the system unchanged.
    pub fn apply(
        &mut self,
        system: &mut LinearSystem<f64>,
        node_positions: &[Point2<f64>],
        t: f64,
    ) -> Result<(), BoundaryConditionError> {
        if system.dim() != self.num_dofs {
            return Err(BoundaryConditionError::DimensionMismatch {
                expected: self.num_dofs,
                actual: system.dim(),
            });
        }
        let mut dofs = std::mem::take(&mut self.dofs);
        let mut values = std::mem::take(&mut self.values);
        self.evaluate_into(&mut dofs, &mut values, node_positions, t);
        let result = apply_dirichlet_rows(&mut system.matrix, &mut system.rhs, &dofs, &values)
            .map_err(|err| BoundaryConditionError::MissingDiagonal { row: err.row });
        self.dofs = dofs;
        self.values = values;
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoundaryConditionError {
    /// The value has a different number of components than the subspace it targets.
    ArityMismatch {
        entry: usize,
        region: String,
        expected: usize,
        actual: usize,
    },
    /// The function space has no such subspace.
    UnsupportedSubspace {
        entry: usize,
        region: String,
        subspace: Subspace,
    },
    /// Two entries target the same node and subspace under [`OverlapPolicy::Disjoint`].
    Overlap {
        subspace: Subspace,
        node: usize,
        first: String,
        second: String,
    },
    NotAPartition {
        subspace: Subspace,
        unmatched: usize,
        overlapping: usize,
    },
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },
    MissingDiagonal {
        row: usize,
    },
}

impl fmt::Display for BoundaryConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArityMismatch {
                entry,
                region,
                expected,
                actual,
            } => write!(
                f,
                "Boundary condition {} on region \"{}\" has {} components, but its subspace has {}",
                entry, region, actual, expected
            ),
            Self::UnsupportedSubspace {
                entry,
                region,
                subspace,
            } => write!(
                f,
                "Boundary condition {} on region \"{}\" targets {:?}, which the function space does not have",
                entry, region, subspace
            ),
            Self::Overlap {
                subspace,
                node,
                first,
                second,
            } => write!(
                f,
                "Regions \"{}\" and \"{}\" both constrain {:?} at node {}",
                first, second, subspace, node
            ),
            Self::NotAPartition {
                subspace,
                unmatched,
                overlapping,
            } => write!(
                f,
                "Boundary conditions on {:?} do not partition the boundary: \
                 {} points unmatched, {} points matched several times",
                subspace, unmatched, overlapping
            ),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "System has dimension {}, but the boundary conditions were resolved for {}",
                actual, expected
            ),
            Self::MissingDiagonal { row } => {
                write!(f, "Constrained row {} has no diagonal entry in the sparsity pattern", row)
            }
        }
    }
}

impl Error for BoundaryConditionError {}
