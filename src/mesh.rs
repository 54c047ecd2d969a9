use crate::connectivity::{Connectivity, Tri3d2Connectivity, Tri6d2Connectivity};
use crate::Real;
use nalgebra::{Point2, Scalar, Vector2};
use std::collections::BTreeMap;

pub mod procedural;

/// Index-based data structure for conforming two-dimensional meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh2d<T: Scalar, Connectivity> {
    vertices: Vec<Point2<T>>,
    connectivity: Vec<Connectivity>,
}

pub type TriangleMesh2d<T> = Mesh2d<T, Tri3d2Connectivity>;
pub type Tri6Mesh2d<T> = Mesh2d<T, Tri6d2Connectivity>;

impl<T, Connectivity> Mesh2d<T, Connectivity>
where
    T: Scalar,
{
    pub fn vertices_mut(&mut self) -> &mut [Point2<T>] {
        &mut self.vertices
    }

    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity is expected to only reference in-bounds vertex indices. Users of the
    /// mesh are permitted to panic if they encounter indices out of bounds.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point2<T>>, connectivity: Vec<Connectivity>) -> Self {
        Self { vertices, connectivity }
    }
}

impl<T, C> Mesh2d<T, C>
where
    T: Scalar,
    C: Connectivity,
{
    /// Finds faces which are only connected to exactly one cell, along with the connected cell
    /// index and the local index of the face within that cell.
    ///
    /// Faces are returned in the order of their sorted vertex indices.
    pub fn find_boundary_faces(&self) -> Vec<(C::FaceConnectivity, usize, usize)> {
        // Count the number of occurrences of "equivalent" faces (in the sense that they refer
        // to the same vertex indices). Use a BTreeMap to avoid non-determinism due to
        // HashMap's internal randomization.
        let mut face_counts = BTreeMap::new();
        for (cell_idx, cell_conn) in self.connectivity.iter().enumerate() {
            for local_idx in 0..cell_conn.num_faces() {
                if let Some(face_conn) = cell_conn.get_face_connectivity(local_idx) {
                    let mut key = face_conn.vertex_indices().to_vec();
                    key.sort_unstable();
                    face_counts
                        .entry(key)
                        .and_modify(|(_, count)| *count += 1)
                        .or_insert(((face_conn, cell_idx, local_idx), 1));
                }
            }
        }

        // Take only the faces which have a count of 1, which correspond to boundary faces
        face_counts
            .into_values()
            .filter(|(_, count)| *count == 1)
            .map(|(face, _)| face)
            .collect()
    }

    /// Returns a sorted list of vertices that are determined to be on the boundary.
    ///
    /// A vertex is considered to be a part of the boundary if it belongs to a boundary face.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for (connectivity, _, _) in self.find_boundary_faces() {
            indices.extend(connectivity.vertex_indices());
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl<T, C> Mesh2d<T, C>
where
    T: Real,
{
    /// Translates all vertices of the mesh by the given translation vector.
    pub fn translate(&mut self, translation: &Vector2<T>) {
        self.transform_vertices(|p| *p += translation);
    }

    /// Transform all vertices of the mesh by the given transformation function.
    pub fn transform_vertices<F>(&mut self, mut transformation: F)
    where
        F: FnMut(&mut Point2<T>),
    {
        for p in &mut self.vertices {
            transformation(p);
        }
    }
}

/// Quadratic node layout derived from a linear triangle mesh.
///
/// Nodes `0..num_vertices` coincide with the mesh vertices. Every unique edge contributes one
/// additional node, numbered in sorted edge order and located at the edge midpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tri6Topology {
    num_vertices: usize,
    connectivity: Vec<Tri6d2Connectivity>,
    edges: Vec<[usize; 2]>,
}

impl Tri6Topology {
    pub fn from_tri3(num_vertices: usize, cells: &[Tri3d2Connectivity]) -> Self {
        let sorted_edge = |a: usize, b: usize| if a < b { [a, b] } else { [b, a] };

        let mut edge_indices = BTreeMap::new();
        for cell in cells {
            for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                edge_indices.insert(sorted_edge(cell[i], cell[j]), 0);
            }
        }
        for (idx, value) in edge_indices.values_mut().enumerate() {
            *value = num_vertices + idx;
        }

        let connectivity = cells
            .iter()
            .map(|cell| {
                let edge_node = |i: usize, j: usize| edge_indices[&sorted_edge(cell[i], cell[j])];
                Tri6d2Connectivity([
                    cell[0],
                    cell[1],
                    cell[2],
                    edge_node(0, 1),
                    edge_node(1, 2),
                    edge_node(2, 0),
                ])
            })
            .collect();

        Self {
            num_vertices,
            connectivity,
            edges: edge_indices.into_keys().collect(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_nodes(&self) -> usize {
        self.num_vertices + self.edges.len()
    }

    pub fn connectivity(&self) -> &[Tri6d2Connectivity] {
        &self.connectivity
    }

    /// The vertex pair `[a, b]` (with `a < b`) of each edge node, in node order.
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Computes the positions of all quadratic nodes given the mesh vertex positions.
    pub fn node_positions<T: Real>(&self, vertices: &[Point2<T>]) -> Vec<Point2<T>> {
        let mut nodes = Vec::with_capacity(self.num_nodes());
        self.populate_node_positions(&mut nodes, vertices);
        nodes
    }

    /// Overwrites `nodes` with the positions of all quadratic nodes.
    pub fn populate_node_positions<T: Real>(&self, nodes: &mut Vec<Point2<T>>, vertices: &[Point2<T>]) {
        assert_eq!(vertices.len(), self.num_vertices, "Vertex count must match topology");
        nodes.clear();
        nodes.extend_from_slice(vertices);
        nodes.extend(
            self.edges
                .iter()
                .map(|&[a, b]| nalgebra::center(&vertices[a], &vertices[b])),
        );
    }
}

impl<T> TriangleMesh2d<T>
where
    T: Real,
{
    /// Converts the mesh into a quadratic Tri6 mesh with edge nodes at the edge midpoints.
    pub fn to_tri6(&self) -> Tri6Mesh2d<T> {
        let topology = Tri6Topology::from_tri3(self.vertices.len(), &self.connectivity);
        let nodes = topology.node_positions(&self.vertices);
        Tri6Mesh2d::from_vertices_and_connectivity(nodes, topology.connectivity)
    }
}
