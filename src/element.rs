use crate::Real;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Matrix2, OMatrix, Point2, Scalar, U1, U2};

mod triangle;

pub use triangle::*;

/// Reference finite elements with a number of nodes fixed at compile-time.
pub trait FixedNodesReferenceFiniteElement<T>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, U1, Self::NodalDim> + Allocator<T, U2, Self::NodalDim>,
{
    type NodalDim: DimName;

    /// Evaluates each basis function at the given reference coordinates. The result is given
    /// in a row vector where each entry is the value of the corresponding basis function.
    fn evaluate_basis(&self, reference_coords: &Point2<T>) -> OMatrix<T, U1, Self::NodalDim>;

    /// Constructs a matrix whose columns are the gradients of each shape function
    /// with respect to the reference coordinates.
    fn gradients(&self, reference_coords: &Point2<T>) -> OMatrix<T, U2, Self::NodalDim>;
}

pub trait FiniteElement<T>: FixedNodesReferenceFiniteElement<T>
where
    T: Real,
    DefaultAllocator: Allocator<T, U1, Self::NodalDim> + Allocator<T, U2, Self::NodalDim>,
{
    /// Compute the Jacobian of the transformation from the reference element to the given
    /// element at the given reference coordinates.
    fn reference_jacobian(&self, reference_coords: &Point2<T>) -> Matrix2<T>;

    /// Maps reference coordinates to physical coordinates in the element.
    fn map_reference_coords(&self, reference_coords: &Point2<T>) -> Point2<T>;

    /// The diameter of the finite element.
    ///
    /// The diameter of a finite element is defined as the largest distance between any two
    /// points in the element.
    fn diameter(&self) -> T;
}

/// Maps reference gradients (columns of `reference_gradients`) to physical gradients.
///
/// Returns `None` if the Jacobian is singular.
#[allow(non_snake_case)]
pub fn physical_gradients<T, N>(
    jacobian: &Matrix2<T>,
    reference_gradients: &OMatrix<T, U2, N>,
) -> Option<OMatrix<T, U2, N>>
where
    T: Real,
    N: DimName,
    DefaultAllocator: Allocator<T, U2, N>,
{
    let J_inv_t = jacobian.try_inverse()?.transpose();
    Some(J_inv_t * reference_gradients)
}
