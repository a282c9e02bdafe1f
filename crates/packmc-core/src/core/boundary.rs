//! # Boundary Conditions
//!
//! Maps positions and displacements onto periodic images of a [`TriclinicBox`]. The packing
//! consumes this only through the [`BoundaryConditions`] trait, so a fixed-translation double or a
//! non-periodic variant can be swapped in without touching the container.

use crate::core::models::triclinic_box::TriclinicBox;
use nalgebra::Vector3;

pub trait BoundaryConditions: Send + Sync {
    /// Informs the boundary conditions about a new simulation box.
    fn set_box(&mut self, simulation_box: &TriclinicBox);

    /// The vector which, added to `position`, brings it back into the primary image.
    fn correction(&self, position: &Vector3<f64>) -> Vector3<f64>;

    /// The vector which, added to `position2`, yields its image nearest to `position1`.
    fn translation(&self, position1: &Vector3<f64>, position2: &Vector3<f64>) -> Vector3<f64>;

    /// Squared distance between `position1` and the nearest image of `position2`.
    fn distance2(&self, position1: &Vector3<f64>, position2: &Vector3<f64>) -> f64 {
        (position2 + self.translation(position1, position2) - position1).norm_squared()
    }
}

/// Periodic boundary conditions for an arbitrary triclinic box.
///
/// Images are resolved in relative coordinates, so the nearest image is exact for boxes whose
/// shear is small compared to their heights.
#[derive(Debug, Clone, Default)]
pub struct PeriodicBoundaryConditions {
    simulation_box: TriclinicBox,
}

impl PeriodicBoundaryConditions {
    pub fn new(simulation_box: TriclinicBox) -> Self {
        Self { simulation_box }
    }

    pub fn simulation_box(&self) -> &TriclinicBox {
        &self.simulation_box
    }
}

impl BoundaryConditions for PeriodicBoundaryConditions {
    fn set_box(&mut self, simulation_box: &TriclinicBox) {
        self.simulation_box = *simulation_box;
    }

    fn correction(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let relative = self.simulation_box.absolute_to_relative(position);
        let shift = relative.map(|r| -r.floor());
        self.simulation_box.relative_to_absolute(&shift)
    }

    fn translation(&self, position1: &Vector3<f64>, position2: &Vector3<f64>) -> Vector3<f64> {
        let relative = self.simulation_box.absolute_to_relative(&(position2 - position1));
        let shift = relative.map(|r| -r.round());
        self.simulation_box.relative_to_absolute(&shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn vectors_approx_equal(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < TOLERANCE
    }

    #[test]
    fn correction_wraps_into_primary_cell() {
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let position = Vector3::new(-1.0, 12.0, 5.0);
        let corrected = position + bc.correction(&position);
        assert!(vectors_approx_equal(&corrected, &Vector3::new(9.0, 2.0, 5.0)));
    }

    #[test]
    fn correction_inside_box_is_zero() {
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cuboid([3.0, 4.0, 5.0]));
        assert!(vectors_approx_equal(&bc.correction(&Vector3::new(1.0, 2.0, 3.0)), &Vector3::zeros()));
    }

    #[test]
    fn translation_picks_nearest_image() {
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let p1 = Vector3::new(0.5, 5.0, 9.5);
        let p2 = Vector3::new(9.5, 5.0, 0.5);
        let translation = bc.translation(&p1, &p2);
        assert!(vectors_approx_equal(&translation, &Vector3::new(-10.0, 0.0, 10.0)));
        assert!((bc.distance2(&p1, &p2) - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn sheared_box_correction_uses_edge_vectors() {
        let simulation_box = TriclinicBox::from_sides([
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(2.0, 4.0, 0.0),
            Vector3::new(0.0, 0.0, 4.0),
        ]);
        let bc = PeriodicBoundaryConditions::new(simulation_box);
        let position = Vector3::new(3.0, 5.0, 1.0);
        let corrected = position + bc.correction(&position);
        assert!(vectors_approx_equal(&corrected, &Vector3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn set_box_updates_periodicity() {
        let mut bc = PeriodicBoundaryConditions::default();
        bc.set_box(&TriclinicBox::cubic(2.0));
        let position = Vector3::new(2.5, 0.5, 0.5);
        assert!(vectors_approx_equal(&(position + bc.correction(&position)), &Vector3::new(0.5, 0.5, 0.5)));
    }
}
