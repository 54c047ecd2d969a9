use crate::space::TaylorHoodSpace;
use nalgebra::{DVector, DVectorView, Vector2};

/// Velocity/pressure state stored in a single buffer.
///
/// The velocity block comes first, followed by the pressure block, matching the dof numbering
/// of [`TaylorHoodSpace`]. The blocks are exposed as views into the same buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedState {
    data: DVector<f64>,
    num_velocity_dofs: usize,
}

impl MixedState {
    pub fn zeros(num_velocity_dofs: usize, num_pressure_dofs: usize) -> Self {
        Self {
            data: DVector::zeros(num_velocity_dofs + num_pressure_dofs),
            num_velocity_dofs,
        }
    }

    pub fn zeros_for(space: &TaylorHoodSpace) -> Self {
        Self::zeros(space.num_velocity_dofs(), space.num_pressure_dofs())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.data
    }

    pub fn velocity(&self) -> DVectorView<f64> {
        self.data.rows(0, self.num_velocity_dofs)
    }

    pub fn pressure(&self) -> DVectorView<f64> {
        let num_pressure_dofs = self.data.len() - self.num_velocity_dofs;
        self.data.rows(self.num_velocity_dofs, num_pressure_dofs)
    }

    pub fn velocity_at_node(&self, node: usize) -> Vector2<f64> {
        Vector2::new(self.data[2 * node], self.data[2 * node + 1])
    }

    pub fn pressure_at_vertex(&self, vertex: usize) -> f64 {
        self.data[self.num_velocity_dofs + vertex]
    }

    /// Replaces the whole state with the given solution vector.
    ///
    /// # Panics
    ///
    /// Panics if the length of `solution` does not match the state.
    pub fn assign(&mut self, solution: DVectorView<f64>) {
        assert_eq!(solution.len(), self.data.len(), "Solution must match the state layout");
        self.data.copy_from(&solution);
    }

    /// Largest velocity magnitude over all velocity nodes.
    pub fn max_velocity_magnitude(&self) -> f64 {
        (0..self.num_velocity_dofs / 2)
            .map(|node| self.velocity_at_node(node).norm())
            .fold(0.0, f64::max)
    }

    /// Smallest and largest pressure value, or `None` if there are no pressure dofs.
    pub fn pressure_range(&self) -> Option<(f64, f64)> {
        let pressure = self.pressure();
        if pressure.is_empty() {
            None
        } else {
            Some((pressure.min(), pressure.max()))
        }
    }
}
