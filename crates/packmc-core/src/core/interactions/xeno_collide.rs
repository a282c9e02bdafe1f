use super::{Interaction, InteractionSite};
use crate::core::boundary::BoundaryConditions;
use crate::core::geometry::xenocollide::{CollideGeometry, intersect};
use crate::core::models::shape_data::ShapeData;
use nalgebra::Vector3;

const DEFAULT_TOLERANCE: f64 = 1e-12;

/// Hard convex bodies of a single geometry, tested with the XenoCollide kernel.
#[derive(Debug, Clone)]
pub struct XenoCollideInteraction<G> {
    geometry: G,
    tolerance: f64,
}

impl<G: CollideGeometry> XenoCollideInteraction<G> {
    pub fn new(geometry: G) -> Self {
        Self::with_tolerance(geometry, DEFAULT_TOLERANCE)
    }

    pub fn with_tolerance(geometry: G, tolerance: f64) -> Self {
        Self { geometry, tolerance }
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }
}

impl<G: CollideGeometry> Interaction for XenoCollideInteraction<G> {
    fn has_hard_part(&self) -> bool {
        true
    }

    fn has_soft_part(&self) -> bool {
        false
    }

    fn has_wall_part(&self) -> bool {
        true
    }

    fn is_convex(&self) -> bool {
        true
    }

    fn range_radius(&self, _data: &ShapeData) -> f64 {
        2.0 * self.geometry.circumsphere_radius()
    }

    fn overlap_between(&self, first: InteractionSite<'_>, second: InteractionSite<'_>, bc: &dyn BoundaryConditions) -> bool {
        let second_position = second.position + bc.translation(&first.position, &second.position);
        intersect(
            &self.geometry,
            first.orientation,
            &first.position,
            &self.geometry,
            second.orientation,
            &second_position,
            self.tolerance,
        )
    }

    fn overlap_with_wall(&self, site: InteractionSite<'_>, wall_origin: &Vector3<f64>, wall_normal: &Vector3<f64>) -> bool {
        let local_direction = site.orientation.transpose() * -wall_normal;
        let deepest = site.position + site.orientation * self.geometry.support_point(&local_direction);
        (deepest - wall_origin).dot(wall_normal) < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::PeriodicBoundaryConditions;
    use crate::core::geometry::rotation_from_axis_angle;
    use crate::core::geometry::xenocollide::primitives::{CollideCuboid, CollideSphere};
    use crate::core::models::shape::Shape;
    use crate::core::models::triclinic_box::TriclinicBox;
    use nalgebra::Matrix3;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn spheres_agree_with_analytic_contact() {
        let interaction = XenoCollideInteraction::new(CollideSphere::new(0.5));
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let a = Shape::new(Vector3::new(0.3, 5.0, 5.0));

        assert!(interaction.overlap_between_shapes(&a, &Shape::new(Vector3::new(9.4, 5.0, 5.0)), &bc));
        assert!(!interaction.overlap_between_shapes(&a, &Shape::new(Vector3::new(9.2, 5.0, 5.0)), &bc));
        assert_eq!(interaction.range_radius(&ShapeData::empty()), 1.0);
    }

    #[test]
    fn rotated_cube_reaches_farther() {
        let interaction = XenoCollideInteraction::new(CollideCuboid::new(Vector3::new(0.5, 0.5, 0.5)));
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let a = Shape::new(Vector3::new(5.0, 5.0, 5.0));
        let b = Shape::new(Vector3::new(6.15, 5.0, 5.0));
        assert!(!interaction.overlap_between_shapes(&a, &b, &bc));

        let rotated = Shape::with_orientation(Vector3::new(6.15, 5.0, 5.0), rotation_from_axis_angle(&Vector3::z(), FRAC_PI_4));
        assert!(interaction.overlap_between_shapes(&a, &rotated, &bc));
    }

    #[test]
    fn wall_overlap_uses_deepest_support_point() {
        let interaction = XenoCollideInteraction::new(CollideCuboid::new(Vector3::new(0.5, 0.5, 0.5)));
        let empty = ShapeData::empty();
        let identity = Matrix3::identity();
        let tilted = rotation_from_axis_angle(&Vector3::x(), FRAC_PI_4);
        let origin = Vector3::zeros();
        let normal = Vector3::z();

        let position = Vector3::new(2.0, 2.0, 0.6);
        let upright = InteractionSite::new(position, &identity, &empty, 0);
        let on_edge = InteractionSite::new(position, &tilted, &empty, 0);
        assert!(!interaction.overlap_with_wall(upright, &origin, &normal));
        assert!(interaction.overlap_with_wall(on_edge, &origin, &normal));
    }
}
