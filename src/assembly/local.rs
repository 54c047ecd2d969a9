use crate::quadrature::QuadratureError;
use nalgebra::{DMatrixViewMut, DVectorViewMut, Scalar};
use std::error::Error;
use std::fmt;

/// Describes which global degrees of freedom each element couples.
pub trait ElementConnectivityAssembler {
    /// Total number of degrees of freedom, i.e. the dimension of the assembled system.
    fn num_dofs(&self) -> usize;

    fn num_elements(&self) -> usize;

    fn element_dof_count(&self, element_index: usize) -> usize;

    /// Writes the global indices of the element's degrees of freedom, in local order.
    fn populate_element_dofs(&self, output: &mut [usize], element_index: usize);
}

/// Assembles the local matrix and right-hand side of a single element.
pub trait ElementSystemAssembler<T: Scalar>: ElementConnectivityAssembler {
    /// Adds the element contributions to `matrix` and `rhs`, which are zero on entry and
    /// sized according to [`element_dof_count`](ElementConnectivityAssembler::element_dof_count).
    fn assemble_element_system_into(
        &self,
        element_index: usize,
        matrix: DMatrixViewMut<T>,
        rhs: DVectorViewMut<T>,
    ) -> Result<(), AssemblyError>;
}

/// Assembles the local load vector of a single element.
pub trait ElementVectorAssembler<T: Scalar>: ElementConnectivityAssembler {
    /// Adds the element contributions to `output`, which is zero on entry.
    fn assemble_element_vector_into(&self, element_index: usize, output: DVectorViewMut<T>) -> Result<(), AssemblyError>;
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssemblyError {
    /// The element has (numerically) zero area, so its reference map is not invertible.
    DegenerateElement { element_index: usize, jacobian_determinant: f64 },
    /// The element connectivity references a node that does not exist.
    InvalidConnectivity { element_index: usize },
    /// An element couples two dofs that are not part of the sparsity pattern.
    MissingPatternEntry { row: usize, col: usize },
    /// The system does not have the dimensions expected by the element assembler.
    DimensionMismatch { expected: usize, actual: usize },
    Quadrature(QuadratureError),
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateElement {
                element_index,
                jacobian_determinant,
            } => write!(
                f,
                "Element {} is degenerate (Jacobian determinant {:e})",
                element_index, jacobian_determinant
            ),
            Self::InvalidConnectivity { element_index } => {
                write!(f, "Element {} references nodes out of bounds", element_index)
            }
            Self::MissingPatternEntry { row, col } => {
                write!(f, "Entry ({}, {}) is not part of the sparsity pattern", row, col)
            }
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "System has dimension {}, but the assembler expects {}",
                actual, expected
            ),
            Self::Quadrature(err) => write!(f, "Quadrature unavailable: {}", err),
        }
    }
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Quadrature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuadratureError> for AssemblyError {
    fn from(err: QuadratureError) -> Self {
        Self::Quadrature(err)
    }
}
