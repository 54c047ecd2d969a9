use crate::export_mesh_vtk;
use fenris_flow::connectivity::{Connectivity, Tri3d2Connectivity};
use fenris_flow::mesh::procedural::{
    create_rectangular_uniform_tri_mesh_2d, create_unit_square_uniform_tri_mesh_2d, Diagonal,
};
use fenris_flow::mesh::{Tri6Topology, TriangleMesh2d};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Vector2};
use proptest::prelude::*;

fn signed_area(mesh: &TriangleMesh2d<f64>, cell: &Tri3d2Connectivity) -> f64 {
    let [a, b, c] = cell.0.map(|i| mesh.vertices()[i]);
    0.5 * (b - a).perp(&(c - a))
}

fn diagonal_strategy() -> impl Strategy<Value = Diagonal> {
    prop_oneof![Just(Diagonal::Right), Just(Diagonal::Left), Just(Diagonal::Crossed)]
}

#[test]
fn unit_square_right_diagonal_layout() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1, Diagonal::Right);
    assert_eq!(
        mesh.vertices(),
        &[
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0)
        ]
    );
    assert_eq!(
        mesh.connectivity(),
        &[Tri3d2Connectivity([0, 1, 3]), Tri3d2Connectivity([0, 3, 2])]
    );
}

#[test]
fn unit_square_crossed_has_cell_centers() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2, Diagonal::Crossed);
    assert_eq!(mesh.vertices().len(), 9 + 4);
    assert_eq!(mesh.connectivity().len(), 16);
    // The first cell center follows the grid vertices
    assert_eq!(mesh.vertices()[9], Point2::new(0.25, 0.25));
    assert!(mesh.connectivity().iter().all(|cell| cell[2] >= 9));

    export_mesh_vtk("unit_square_crossed_has_cell_centers", "crossed_2x2", &mesh);
}

#[test]
fn zero_resolution_gives_empty_mesh() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(0, Diagonal::Crossed);
    assert!(mesh.vertices().is_empty());
    assert!(mesh.connectivity().is_empty());
}

#[test]
fn rectangular_mesh_spans_given_box() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(
        &Point2::new(-1.0, 2.0),
        &Point2::new(3.0, 3.0),
        4,
        2,
        Diagonal::Left,
    );
    assert_eq!(mesh.vertices().len(), 15);
    assert_eq!(mesh.connectivity().len(), 16);
    assert_eq!(mesh.vertices()[0], Point2::new(-1.0, 2.0));
    assert_eq!(mesh.vertices()[14], Point2::new(3.0, 3.0));
    let area: f64 = mesh
        .connectivity()
        .iter()
        .map(|cell| signed_area(&mesh, cell))
        .sum();
    assert_scalar_eq!(area, 4.0, comp = abs, tol = 1e-12);
}

#[test]
fn find_boundary_vertices_of_unit_square() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2, Diagonal::Right);
    assert_eq!(mesh.find_boundary_vertices(), vec![0, 1, 2, 3, 5, 6, 7, 8]);

    let crossed = create_unit_square_uniform_tri_mesh_2d::<f64>(1, Diagonal::Crossed);
    assert_eq!(crossed.find_boundary_vertices(), vec![0, 1, 2, 3]);
}

#[test]
fn find_boundary_faces_of_single_triangle() {
    let mesh = TriangleMesh2d::from_vertices_and_connectivity(
        vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)],
        vec![Tri3d2Connectivity([0, 1, 2])],
    );
    let faces = mesh.find_boundary_faces();
    assert_eq!(faces.len(), 3);
    let mut local_indices: Vec<_> = faces.iter().map(|(_, cell, local)| (*cell, *local)).collect();
    local_indices.sort();
    assert_eq!(local_indices, vec![(0, 0), (0, 1), (0, 2)]);
}

#[test]
fn translate_moves_all_vertices() {
    let mut mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1, Diagonal::Right);
    mesh.translate(&Vector2::new(1.0, -2.0));
    assert_eq!(mesh.vertices()[0], Point2::new(1.0, -2.0));
    assert_eq!(mesh.vertices()[3], Point2::new(2.0, -1.0));
}

#[test]
fn tri6_topology_of_single_triangle() {
    let cells = [Tri3d2Connectivity([2, 0, 1])];
    let topology = Tri6Topology::from_tri3(3, &cells);
    assert_eq!(topology.num_nodes(), 6);
    assert_eq!(topology.edges(), &[[0, 1], [0, 2], [1, 2]]);
    // Edges of the cell are (2, 0), (0, 1) and (1, 2)
    assert_eq!(topology.connectivity()[0].vertex_indices(), &[2, 0, 1, 4, 3, 5]);

    let vertices = [Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(0.0, 2.0)];
    let nodes = topology.node_positions(&vertices);
    assert_eq!(&nodes[..3], &vertices);
    assert_eq!(nodes[3], Point2::new(1.0, 0.0));
    assert_eq!(nodes[4], Point2::new(0.0, 1.0));
    assert_eq!(nodes[5], Point2::new(1.0, 1.0));
}

#[test]
fn tri6_topology_shares_edge_nodes_between_cells() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1, Diagonal::Right);
    let tri6 = mesh.to_tri6();
    assert_eq!(tri6.vertices().len(), 4 + 5);
    let [first, second] = [&tri6.connectivity()[0], &tri6.connectivity()[1]];
    // The diagonal (0, 3) is edge (2, 0) of the first cell and edge (0, 1) of the second
    assert_eq!(first[5], second[3]);
    assert_eq!(tri6.vertices()[first[5]], Point2::new(0.5, 0.5));
    assert_eq!(tri6.find_boundary_vertices().len(), 8);
}

#[test]
fn crossed_cavity_mesh_has_expected_node_count() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(16, Diagonal::Crossed);
    let topology = Tri6Topology::from_tri3(mesh.vertices().len(), mesh.connectivity());
    assert_eq!(topology.num_vertices(), 545);
    assert_eq!(topology.edges().len(), 1568);
    assert_eq!(topology.num_nodes(), 2113);
}

proptest! {
    #[test]
    fn unit_square_meshes_are_counter_clockwise_and_cover_the_square(
        resolution in 1usize..8,
        diagonal in diagonal_strategy()
    ) {
        let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(resolution, diagonal);
        let mut total_area = 0.0;
        for cell in mesh.connectivity() {
            let area = signed_area(&mesh, cell);
            prop_assert!(area > 0.0);
            total_area += area;
        }
        prop_assert!((total_area - 1.0).abs() < 1e-12);

        // Euler's formula for a simply connected triangulation
        let topology = Tri6Topology::from_tri3(mesh.vertices().len(), mesh.connectivity());
        prop_assert_eq!(
            topology.edges().len() + 1,
            mesh.vertices().len() + mesh.connectivity().len()
        );
        prop_assert_eq!(mesh.find_boundary_vertices().len(), 4 * resolution);
    }
}
