//! Function spaces over a (possibly moving) triangle mesh.
//!
//! A [`FlowDomain`] owns the mesh together with the quadratic node layout derived from it.
//! The spaces themselves are cheap views into the domain that only describe how degrees of
//! freedom are numbered:
//!
//! - [`TaylorHoodSpace`]: P2 velocity and P1 pressure. Velocity dof of node `n`, component `c`
//!   is `2 n + c`, pressure dof of vertex `v` is `2 N + v` where `N` is the number of P2 nodes.
//! - [`VectorP1Space`]: vector-valued P1 functions such as the mesh velocity, with dof `2 v + c`.
//! - [`ScalarP1Space`]: scalar P1 functions such as the stream function, with dof `v`.
use crate::assembly::local::ElementConnectivityAssembler;
use crate::connectivity::Connectivity;
use crate::mesh::{Tri6Mesh2d, Tri6Topology, TriangleMesh2d};
use nalgebra::{DVector, DVectorView, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Identifies a component of a (mixed) function space that boundary conditions may target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subspace {
    Velocity,
    Pressure,
}

impl Subspace {
    pub fn num_components(&self) -> usize {
        match self {
            Self::Velocity => 2,
            Self::Pressure => 1,
        }
    }
}

/// A boundary node that carries degrees of freedom of some subspace.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoundaryNode {
    /// Index of the node in [`FlowDomain::node_positions`].
    pub node: usize,
    /// Index of the first degree of freedom. Components are stored contiguously.
    pub first_dof: usize,
}

/// Triangle mesh with cached quadratic node positions and boundary information.
#[derive(Debug, Clone)]
pub struct FlowDomain {
    mesh: TriangleMesh2d<f64>,
    topology: Tri6Topology,
    nodes: Vec<Point2<f64>>,
    reference_nodes: Vec<Point2<f64>>,
    boundary_nodes: Vec<usize>,
    boundary_vertices: Vec<usize>,
}

impl FlowDomain {
    pub fn new(mesh: TriangleMesh2d<f64>) -> Self {
        let topology = Tri6Topology::from_tri3(mesh.vertices().len(), mesh.connectivity());
        let nodes = topology.node_positions(mesh.vertices());
        let boundary_nodes =
            Tri6Mesh2d::from_vertices_and_connectivity(nodes.clone(), topology.connectivity().to_vec())
                .find_boundary_vertices();
        let boundary_vertices = mesh.find_boundary_vertices();

        Self {
            mesh,
            topology,
            reference_nodes: nodes.clone(),
            nodes,
            boundary_nodes,
            boundary_vertices,
        }
    }

    pub fn mesh(&self) -> &TriangleMesh2d<f64> {
        &self.mesh
    }

    pub fn topology(&self) -> &Tri6Topology {
        &self.topology
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        self.mesh.vertices()
    }

    pub fn num_vertices(&self) -> usize {
        self.topology.num_vertices()
    }

    pub fn num_nodes(&self) -> usize {
        self.topology.num_nodes()
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.connectivity().len()
    }

    /// Current positions of all P2 nodes. The first [`num_vertices`](Self::num_vertices) nodes
    /// are the mesh vertices.
    pub fn node_positions(&self) -> &[Point2<f64>] {
        &self.nodes
    }

    /// Positions of all P2 nodes in the initial configuration.
    pub fn reference_node_positions(&self) -> &[Point2<f64>] {
        &self.reference_nodes
    }

    /// Sorted indices of the P2 nodes on the boundary.
    pub fn boundary_nodes(&self) -> &[usize] {
        &self.boundary_nodes
    }

    /// Sorted indices of the mesh vertices on the boundary.
    pub fn boundary_vertices(&self) -> &[usize] {
        &self.boundary_vertices
    }

    /// Moves every vertex `v` by `(increment[2 v], increment[2 v + 1])` and rebuilds the cached
    /// node positions.
    ///
    /// # Panics
    ///
    /// Panics if the length of `increment` is not twice the number of vertices.
    pub fn relocate(&mut self, increment: DVectorView<f64>) {
        assert_eq!(
            increment.len(),
            2 * self.num_vertices(),
            "Increment must have two entries per vertex"
        );
        for (v, vertex) in self.mesh.vertices_mut().iter_mut().enumerate() {
            *vertex += Vector2::new(increment[2 * v], increment[2 * v + 1]);
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.topology
            .populate_node_positions(&mut self.nodes, self.mesh.vertices());
    }

    /// Displacement of every vertex relative to the initial configuration, as a vector P1
    /// function.
    pub fn displacement_from_reference(&self) -> DVector<f64> {
        DVector::from_fn(2 * self.num_vertices(), |i, _| {
            let v = i / 2;
            self.nodes[v][i % 2] - self.reference_nodes[v][i % 2]
        })
    }

    pub fn taylor_hood(&self) -> TaylorHoodSpace<'_> {
        TaylorHoodSpace { domain: self }
    }

    pub fn vector_p1(&self) -> VectorP1Space<'_> {
        VectorP1Space { domain: self }
    }

    pub fn scalar_p1(&self) -> ScalarP1Space<'_> {
        ScalarP1Space { domain: self }
    }
}

/// Dof layout of a function space over a [`FlowDomain`].
pub trait FunctionSpace: ElementConnectivityAssembler {
    fn domain(&self) -> &FlowDomain;

    /// Returns the boundary nodes carrying the given subspace, or `None` if the space has no
    /// such subspace.
    fn boundary_dofs(&self, subspace: Subspace) -> Option<Vec<BoundaryNode>>;
}

/// Taylor-Hood (P2 velocity, P1 pressure) mixed space.
///
/// Element dofs are ordered as the 12 velocity dofs `2 a + i` of the six element nodes,
/// followed by the three pressure dofs of the element vertices.
#[derive(Debug, Copy, Clone)]
pub struct TaylorHoodSpace<'a> {
    domain: &'a FlowDomain,
}

impl<'a> TaylorHoodSpace<'a> {
    pub fn num_velocity_dofs(&self) -> usize {
        2 * self.domain.num_nodes()
    }

    pub fn num_pressure_dofs(&self) -> usize {
        self.domain.num_vertices()
    }

    pub fn velocity_dof(&self, node: usize, component: usize) -> usize {
        2 * node + component
    }

    pub fn pressure_dof(&self, vertex: usize) -> usize {
        self.num_velocity_dofs() + vertex
    }
}

impl<'a> ElementConnectivityAssembler for TaylorHoodSpace<'a> {
    fn num_dofs(&self) -> usize {
        self.num_velocity_dofs() + self.num_pressure_dofs()
    }

    fn num_elements(&self) -> usize {
        self.domain.num_cells()
    }

    fn element_dof_count(&self, _element_index: usize) -> usize {
        15
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        let cell = &self.domain.topology.connectivity()[element_index];
        for (a, &node) in cell.vertex_indices().iter().enumerate() {
            output[2 * a] = self.velocity_dof(node, 0);
            output[2 * a + 1] = self.velocity_dof(node, 1);
        }
        for k in 0..3 {
            output[12 + k] = self.pressure_dof(cell[k]);
        }
    }
}

impl<'a> FunctionSpace for TaylorHoodSpace<'a> {
    fn domain(&self) -> &FlowDomain {
        self.domain
    }

    fn boundary_dofs(&self, subspace: Subspace) -> Option<Vec<BoundaryNode>> {
        let dofs = match subspace {
            Subspace::Velocity => self
                .domain
                .boundary_nodes()
                .iter()
                .map(|&node| BoundaryNode {
                    node,
                    first_dof: self.velocity_dof(node, 0),
                })
                .collect(),
            Subspace::Pressure => self
                .domain
                .boundary_vertices()
                .iter()
                .map(|&vertex| BoundaryNode {
                    node: vertex,
                    first_dof: self.pressure_dof(vertex),
                })
                .collect(),
        };
        Some(dofs)
    }
}

/// Vector-valued P1 space, used for the mesh velocity and displacement.
#[derive(Debug, Copy, Clone)]
pub struct VectorP1Space<'a> {
    domain: &'a FlowDomain,
}

impl<'a> ElementConnectivityAssembler for VectorP1Space<'a> {
    fn num_dofs(&self) -> usize {
        2 * self.domain.num_vertices()
    }

    fn num_elements(&self) -> usize {
        self.domain.num_cells()
    }

    fn element_dof_count(&self, _element_index: usize) -> usize {
        6
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        let cell = &self.domain.mesh.connectivity()[element_index];
        for (a, &vertex) in cell.vertex_indices().iter().enumerate() {
            output[2 * a] = 2 * vertex;
            output[2 * a + 1] = 2 * vertex + 1;
        }
    }
}

impl<'a> FunctionSpace for VectorP1Space<'a> {
    fn domain(&self) -> &FlowDomain {
        self.domain
    }

    fn boundary_dofs(&self, subspace: Subspace) -> Option<Vec<BoundaryNode>> {
        match subspace {
            Subspace::Velocity => Some(
                self.domain
                    .boundary_vertices()
                    .iter()
                    .map(|&vertex| BoundaryNode {
                        node: vertex,
                        first_dof: 2 * vertex,
                    })
                    .collect(),
            ),
            Subspace::Pressure => None,
        }
    }
}

/// Scalar P1 space used for post-processing.
///
/// Boundary condition lists do not target this space, so it reports no boundary dofs.
#[derive(Debug, Copy, Clone)]
pub struct ScalarP1Space<'a> {
    domain: &'a FlowDomain,
}

impl<'a> ElementConnectivityAssembler for ScalarP1Space<'a> {
    fn num_dofs(&self) -> usize {
        self.domain.num_vertices()
    }

    fn num_elements(&self) -> usize {
        self.domain.num_cells()
    }

    fn element_dof_count(&self, _element_index: usize) -> usize {
        3
    }

    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize) {
        let cell = &self.domain.mesh.connectivity()[element_index];
        output.copy_from_slice(cell.vertex_indices());
    }
}

impl<'a> FunctionSpace for ScalarP1Space<'a> {
    fn domain(&self) -> &FlowDomain {
        self.domain
    }

    fn boundary_dofs(&self, _subspace: Subspace) -> Option<Vec<BoundaryNode>> {
        None
    }
}
