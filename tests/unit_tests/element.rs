use fenris_flow::element::{
    physical_gradients, FiniteElement, FixedNodesReferenceFiniteElement, Tri3d2Element, Tri6d2Element,
};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix2, Point2, Vector2};
use proptest::prelude::*;

fn reference_tri6_nodes() -> [Point2<f64>; 6] {
    [
        Point2::new(-1.0, -1.0),
        Point2::new(1.0, -1.0),
        Point2::new(-1.0, 1.0),
        Point2::new(0.0, -1.0),
        Point2::new(0.0, 0.0),
        Point2::new(-1.0, 0.0),
    ]
}

fn physical_triangle() -> Tri3d2Element<f64> {
    Tri3d2Element::from_vertices([Point2::new(0.5, 0.2), Point2::new(2.0, 0.6), Point2::new(0.9, 1.7)])
}

/// Points inside the reference triangle.
fn reference_point() -> impl Strategy<Value = Point2<f64>> {
    (0.0..1.0, 0.0..1.0).prop_map(|(a, b): (f64, f64)| {
        let (a, b) = if a + b > 1.0 { (1.0 - a, 1.0 - b) } else { (a, b) };
        Point2::new(-1.0 + 2.0 * a, -1.0 + 2.0 * b)
    })
}

#[test]
fn tri3_basis_is_nodal() {
    let element = Tri3d2Element::<f64>::reference();
    for (i, xi) in element.vertices().iter().enumerate() {
        let phi = element.evaluate_basis(xi);
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_scalar_eq!(phi[j], expected, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn tri6_basis_is_nodal() {
    let element = Tri6d2Element::<f64>::reference();
    for (i, xi) in reference_tri6_nodes().iter().enumerate() {
        assert_eq!(&element.vertices()[i], xi);
        let phi = element.evaluate_basis(xi);
        for j in 0..6 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_scalar_eq!(phi[j], expected, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn tri6_from_tri3_places_edge_nodes_at_midpoints() {
    let tri3 = physical_triangle();
    let tri6 = Tri6d2Element::from(&tri3);
    let [a, b, c] = *tri3.vertices();
    assert_eq!(tri6.vertices()[3], nalgebra::center(&a, &b));
    assert_eq!(tri6.vertices()[4], nalgebra::center(&b, &c));
    assert_eq!(tri6.vertices()[5], nalgebra::center(&c, &a));
    assert_eq!(tri6.tri3(), &tri3);
}

#[test]
fn tri3_jacobian_and_map_of_physical_triangle() {
    let element = physical_triangle();
    let xi = Point2::new(-0.2, 0.1);
    let j = element.reference_jacobian(&xi);
    #[rustfmt::skip]
    let expected = Matrix2::new(
        0.75, 0.2,
        0.2, 0.75);
    assert_matrix_eq!(j, expected, comp = abs, tol = 1e-14);

    // The reference vertices map to the physical vertices
    for (xi, x) in Tri3d2Element::<f64>::reference().vertices().iter().zip(element.vertices()) {
        let mapped = element.map_reference_coords(xi);
        assert_matrix_eq!(mapped.coords, x.coords, comp = abs, tol = 1e-14);
    }
}

#[test]
fn diameter_is_longest_edge() {
    let element = Tri3d2Element::from_vertices([Point2::new(0.0, 0.0), Point2::new(3.0, 0.0), Point2::new(0.0, 4.0)]);
    assert_scalar_eq!(element.diameter(), 5.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(Tri6d2Element::from(&element).diameter(), 5.0, comp = abs, tol = 1e-14);
}

#[test]
fn physical_gradients_of_degenerate_element_are_none() {
    let element = Tri3d2Element::from_vertices([Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)]);
    let xi = Point2::new(-0.5, -0.5);
    let jacobian = element.reference_jacobian(&xi);
    assert!(physical_gradients(&jacobian, &element.gradients(&xi)).is_none());
}

proptest! {
    #[test]
    fn tri3_and_tri6_bases_are_partitions_of_unity(xi in reference_point()) {
        let phi3 = Tri3d2Element::<f64>::reference().evaluate_basis(&xi);
        let phi6 = Tri6d2Element::<f64>::reference().evaluate_basis(&xi);
        prop_assert!((phi3.sum() - 1.0).abs() < 1e-12);
        prop_assert!((phi6.sum() - 1.0).abs() < 1e-12);

        let grad3 = Tri3d2Element::<f64>::reference().gradients(&xi);
        let grad6 = Tri6d2Element::<f64>::reference().gradients(&xi);
        prop_assert!(grad3.column_sum().norm() < 1e-12);
        prop_assert!(grad6.column_sum().norm() < 1e-12);
    }

    #[test]
    fn tri6_reproduces_gradients_of_quadratic_functions(xi in reference_point()) {
        // u(x, y) = x^2 - 3 x y + 2 y + 1 on a physical element
        let u = |x: &Point2<f64>| x.x * x.x - 3.0 * x.x * x.y + 2.0 * x.y + 1.0;
        let grad_u = |x: &Point2<f64>| Vector2::new(2.0 * x.x - 3.0 * x.y, -3.0 * x.x + 2.0);

        let element = Tri6d2Element::from(&physical_triangle());
        let jacobian = element.reference_jacobian(&xi);
        let gradients = physical_gradients(&jacobian, &element.gradients(&xi)).unwrap();
        let phi = element.evaluate_basis(&xi);

        let mut u_h = 0.0;
        let mut grad_u_h = Vector2::zeros();
        for (a, node) in element.vertices().iter().enumerate() {
            u_h += u(node) * phi[a];
            grad_u_h += gradients.column(a) * u(node);
        }
        let x = element.map_reference_coords(&xi);
        prop_assert!((u_h - u(&x)).abs() < 1e-10);
        prop_assert!((grad_u_h - grad_u(&x)).norm() < 1e-10);
    }
}
