//! # Interactions
//!
//! The [`Interaction`] trait is the capability through which the packing asks "do these two
//! particles overlap?" and "what is their energy?". The container never looks inside particle
//! payloads or geometry; it hands the interaction an [`InteractionSite`] per particle (or per
//! interaction centre of a multi-site particle) and acts on the answer.
//!
//! ## Implementations
//!
//! - [`hard_sphere`] - Mono- and polydisperse hard spheres with hard walls
//! - [`central`] - Soft isotropic pair potentials, optionally installed on several centres
//! - [`compound`] - Decorator combining a main and a helper interaction
//! - [`xeno_collide`] - Hard convex bodies tested with the collision kernel

use crate::core::boundary::BoundaryConditions;
use crate::core::models::shape::Shape;
use crate::core::models::shape_data::ShapeData;
use nalgebra::{Matrix3, Vector3};

pub mod central;
pub mod compound;
pub mod hard_sphere;
pub mod xeno_collide;

/// One particle, or one interaction centre of a particle, as seen by an [`Interaction`].
///
/// `position` is the absolute position of the site, which for a multi-site particle already
/// includes the rotated centre offset.
#[derive(Debug, Clone, Copy)]
pub struct InteractionSite<'a> {
    pub position: Vector3<f64>,
    pub orientation: &'a Matrix3<f64>,
    pub data: &'a ShapeData,
    pub centre: usize,
}

impl<'a> InteractionSite<'a> {
    pub fn new(position: Vector3<f64>, orientation: &'a Matrix3<f64>, data: &'a ShapeData, centre: usize) -> Self {
        Self {
            position,
            orientation,
            data,
            centre,
        }
    }

    /// The site of a single-centre particle.
    pub fn of_shape(shape: &'a Shape) -> Self {
        Self::new(*shape.position(), shape.orientation(), shape.data(), 0)
    }
}

pub trait Interaction: Send + Sync {
    fn has_hard_part(&self) -> bool;

    fn has_soft_part(&self) -> bool;

    fn has_wall_part(&self) -> bool {
        false
    }

    /// Whether the hard part is convex, i.e. uniform dilation of the box can never create an overlap.
    fn is_convex(&self) -> bool {
        false
    }

    /// Largest centre-to-centre distance at which two sites can still interact.
    fn range_radius(&self, data: &ShapeData) -> f64;

    /// Rigid offsets, in the particle's local frame, of the points at which pair terms are
    /// evaluated. Empty for single-site particles.
    fn interaction_centres(&self, _data: &ShapeData) -> Vec<Vector3<f64>> {
        Vec::new()
    }

    /// Largest particle-to-particle distance at which two particles can still interact.
    fn total_range_radius(&self, data: &ShapeData) -> f64 {
        let range = self.range_radius(data);
        let centres = self.interaction_centres(data);
        if centres.is_empty() {
            return range;
        }
        let max_norm = centres.iter().map(|c| c.norm()).fold(0.0, f64::max);
        2.0 * max_norm + range
    }

    /// Number of bytes of the per-particle payload this interaction reads.
    fn shape_data_size(&self) -> usize {
        0
    }

    fn calculate_energy_between(
        &self,
        _first: InteractionSite<'_>,
        _second: InteractionSite<'_>,
        _bc: &dyn BoundaryConditions,
    ) -> f64 {
        0.0
    }

    fn overlap_between(
        &self,
        _first: InteractionSite<'_>,
        _second: InteractionSite<'_>,
        _bc: &dyn BoundaryConditions,
    ) -> bool {
        false
    }

    /// Tests a site against the half-space wall through `wall_origin` whose inward unit normal is
    /// `wall_normal`.
    fn overlap_with_wall(
        &self,
        _site: InteractionSite<'_>,
        _wall_origin: &Vector3<f64>,
        _wall_normal: &Vector3<f64>,
    ) -> bool {
        false
    }

    /// Total energy between two whole particles, summed over all pairs of their centres.
    fn energy_between_shapes(&self, shape1: &Shape, shape2: &Shape, bc: &dyn BoundaryConditions) -> f64 {
        let centres1 = self.interaction_centres(shape1.data());
        let centres2 = self.interaction_centres(shape2.data());
        if centres1.is_empty() {
            return self.calculate_energy_between(InteractionSite::of_shape(shape1), InteractionSite::of_shape(shape2), bc);
        }

        let mut energy = 0.0;
        for (i, c1) in centres1.iter().enumerate() {
            let site1 = centre_site(shape1, c1, i);
            for (j, c2) in centres2.iter().enumerate() {
                energy += self.calculate_energy_between(site1, centre_site(shape2, c2, j), bc);
            }
        }
        energy
    }

    fn overlap_between_shapes(&self, shape1: &Shape, shape2: &Shape, bc: &dyn BoundaryConditions) -> bool {
        let centres1 = self.interaction_centres(shape1.data());
        let centres2 = self.interaction_centres(shape2.data());
        if centres1.is_empty() {
            return self.overlap_between(InteractionSite::of_shape(shape1), InteractionSite::of_shape(shape2), bc);
        }

        centres1.iter().enumerate().any(|(i, c1)| {
            let site1 = centre_site(shape1, c1, i);
            centres2
                .iter()
                .enumerate()
                .any(|(j, c2)| self.overlap_between(site1, centre_site(shape2, c2, j), bc))
        })
    }
}

fn centre_site<'a>(shape: &'a Shape, centre: &Vector3<f64>, index: usize) -> InteractionSite<'a> {
    InteractionSite::new(
        shape.position() + shape.orientation() * centre,
        shape.orientation(),
        shape.data(),
        index,
    )
}

impl<T: Interaction + ?Sized> Interaction for &T {
    fn has_hard_part(&self) -> bool {
        (**self).has_hard_part()
    }
    fn has_soft_part(&self) -> bool {
        (**self).has_soft_part()
    }
    fn has_wall_part(&self) -> bool {
        (**self).has_wall_part()
    }
    fn is_convex(&self) -> bool {
        (**self).is_convex()
    }
    fn range_radius(&self, data: &ShapeData) -> f64 {
        (**self).range_radius(data)
    }
    fn interaction_centres(&self, data: &ShapeData) -> Vec<Vector3<f64>> {
        (**self).interaction_centres(data)
    }
    fn total_range_radius(&self, data: &ShapeData) -> f64 {
        (**self).total_range_radius(data)
    }
    fn shape_data_size(&self) -> usize {
        (**self).shape_data_size()
    }
    fn calculate_energy_between(
        &self,
        first: InteractionSite<'_>,
        second: InteractionSite<'_>,
        bc: &dyn BoundaryConditions,
    ) -> f64 {
        (**self).calculate_energy_between(first, second, bc)
    }
    fn overlap_between(&self, first: InteractionSite<'_>, second: InteractionSite<'_>, bc: &dyn BoundaryConditions) -> bool {
        (**self).overlap_between(first, second, bc)
    }
    fn overlap_with_wall(&self, site: InteractionSite<'_>, wall_origin: &Vector3<f64>, wall_normal: &Vector3<f64>) -> bool {
        (**self).overlap_with_wall(site, wall_origin, wall_normal)
    }
}

#[cfg(test)]
mod tests {
    use super::central::{CentralInteraction, LennardJones};
    use super::hard_sphere::HardSphere;
    use super::*;
    use crate::core::boundary::PeriodicBoundaryConditions;
    use crate::core::models::triclinic_box::TriclinicBox;

    #[test]
    fn total_range_of_single_site_interaction_equals_range() {
        let spheres = HardSphere::new(0.5);
        assert_eq!(spheres.total_range_radius(&ShapeData::empty()), 1.0);
    }

    #[test]
    fn total_range_accounts_for_farthest_centre() {
        let lj = CentralInteraction::installed_on_centres(
            LennardJones::new(1.0, 1.0, 2.5),
            vec![Vector3::new(-0.5, 0.0, 0.0), Vector3::new(1.5, 0.0, 0.0)],
        );
        assert!((lj.total_range_radius(&ShapeData::empty()) - 5.5).abs() < 1e-12);
    }

    #[test]
    fn overlap_between_shapes_checks_every_centre_pair() {
        let dimers = HardSphere::new(0.5).installed_on_centres(vec![Vector3::new(-1.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)]);
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(20.0));
        let shape1 = Shape::new(Vector3::new(5.0, 5.0, 5.0));
        let touching = Shape::new(Vector3::new(7.9, 5.0, 5.0));
        let apart = Shape::new(Vector3::new(8.1, 5.0, 5.0));

        assert!(dimers.overlap_between_shapes(&shape1, &touching, &bc));
        assert!(!dimers.overlap_between_shapes(&shape1, &apart, &bc));
    }

    #[test]
    fn blanket_reference_impl_forwards() {
        let spheres = HardSphere::new(1.0);
        let by_ref: &dyn Interaction = &spheres;
        assert!(by_ref.has_hard_part());
        assert!(by_ref.is_convex());
        assert_eq!(by_ref.range_radius(&ShapeData::empty()), 2.0);
    }
}
