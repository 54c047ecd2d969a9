//! Basic procedural mesh generation routines.
use crate::connectivity::Tri3d2Connectivity;
use crate::mesh::TriangleMesh2d;
use crate::Real;
use nalgebra::{Point2, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// How each rectangular cell of a structured grid is split into triangles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagonal {
    /// Two triangles sharing the diagonal from the lower-left to the upper-right corner.
    Right,
    /// Two triangles sharing the diagonal from the lower-right to the upper-left corner.
    Left,
    /// Four triangles meeting in an additional vertex at the cell center.
    Crossed,
}

impl Default for Diagonal {
    fn default() -> Self {
        Self::Right
    }
}

pub fn create_unit_square_uniform_tri_mesh_2d<T>(cells_per_dim: usize, diagonal: Diagonal) -> TriangleMesh2d<T>
where
    T: Real,
{
    create_rectangular_uniform_tri_mesh_2d(
        &Point2::origin(),
        &Point2::new(T::one(), T::one()),
        cells_per_dim,
        cells_per_dim,
        diagonal,
    )
}

/// Generates an axis-aligned rectangular uniform triangle mesh spanning `[min, max]`.
///
/// Grid vertices are numbered row by row, starting at `min`. For [`Diagonal::Crossed`] the
/// cell centers follow after all grid vertices. All triangles are oriented counter-clockwise.
/// An empty mesh is returned if either resolution is zero.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn create_rectangular_uniform_tri_mesh_2d<T>(
    min: &Point2<T>,
    max: &Point2<T>,
    cells_x: usize,
    cells_y: usize,
    diagonal: Diagonal,
) -> TriangleMesh2d<T>
where
    T: Real,
{
    if cells_x == 0 || cells_y == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let extents = max - min;
    let cell_size = Vector2::new(
        extents.x / T::from_usize(cells_x).expect("Must be able to fit usize in T"),
        extents.y / T::from_usize(cells_y).expect("Must be able to fit usize in T"),
    );
    let grid_point = |i: usize, j: usize| {
        let i_as_t = T::from_usize(i).expect("Must be able to fit usize in T");
        let j_as_t = T::from_usize(j).expect("Must be able to fit usize in T");
        min + Vector2::new(i_as_t * cell_size.x, j_as_t * cell_size.y)
    };

    let mut vertices = Vec::new();
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            vertices.push(grid_point(i, j));
        }
    }

    let to_global_vertex_index = |i, j| (cells_x + 1) * j + i;
    let mut cells = Vec::new();
    for j in 0..cells_y {
        for i in 0..cells_x {
            let v0 = to_global_vertex_index(i, j);
            let v1 = to_global_vertex_index(i + 1, j);
            let v2 = to_global_vertex_index(i, j + 1);
            let v3 = to_global_vertex_index(i + 1, j + 1);
            match diagonal {
                Diagonal::Right => {
                    cells.push(Tri3d2Connectivity([v0, v1, v3]));
                    cells.push(Tri3d2Connectivity([v0, v3, v2]));
                }
                Diagonal::Left => {
                    cells.push(Tri3d2Connectivity([v0, v1, v2]));
                    cells.push(Tri3d2Connectivity([v1, v3, v2]));
                }
                Diagonal::Crossed => {
                    let center = vertices.len();
                    vertices.push(grid_point(i, j) + cell_size * 0.5);
                    cells.push(Tri3d2Connectivity([v0, v1, center]));
                    cells.push(Tri3d2Connectivity([v1, v3, center]));
                    cells.push(Tri3d2Connectivity([v3, v2, center]));
                    cells.push(Tri3d2Connectivity([v2, v0, center]));
                }
            }
        }
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, cells)
}
