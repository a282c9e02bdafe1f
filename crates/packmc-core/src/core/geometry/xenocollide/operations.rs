use super::CollideGeometry;
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;

/// An operand of a composite body: a shared geometry moved by a rotation and a translation.
#[derive(Clone)]
pub struct Operand {
    geometry: Arc<dyn CollideGeometry>,
    rotation: Matrix3<f64>,
    position: Vector3<f64>,
}

impl Operand {
    pub fn new(geometry: Arc<dyn CollideGeometry>, rotation: Matrix3<f64>, position: Vector3<f64>) -> Self {
        Self {
            geometry,
            rotation,
            position,
        }
    }

    /// An operand with identity orientation.
    pub fn translated(geometry: Arc<dyn CollideGeometry>, position: Vector3<f64>) -> Self {
        Self::new(geometry, Matrix3::identity(), position)
    }

    /// An operand with identity orientation at the origin.
    pub fn at_origin(geometry: Arc<dyn CollideGeometry>) -> Self {
        Self::translated(geometry, Vector3::zeros())
    }

    fn support(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * self.geometry.support_point(&(self.rotation.transpose() * n)) + self.position
    }

    fn center(&self) -> Vector3<f64> {
        self.rotation * self.geometry.center() + self.position
    }
}

impl std::fmt::Debug for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operand")
            .field("circumsphere_radius", &self.geometry.circumsphere_radius())
            .field("rotation", &self.rotation)
            .field("position", &self.position)
            .finish()
    }
}

/// Minkowski sum `A + B`.
#[derive(Debug, Clone)]
pub struct CollideSum {
    first: Operand,
    second: Operand,
    circumsphere_radius: f64,
}

impl CollideSum {
    pub fn new(first: Operand, second: Operand) -> Self {
        let circumsphere_radius = (first.position + second.position).norm()
            + first.geometry.circumsphere_radius()
            + second.geometry.circumsphere_radius();
        Self {
            first,
            second,
            circumsphere_radius,
        }
    }
}

impl CollideGeometry for CollideSum {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.first.support(n) + self.second.support(n)
    }

    fn center(&self) -> Vector3<f64> {
        self.first.center() + self.second.center()
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

/// Minkowski difference `A - B`.
#[derive(Debug, Clone)]
pub struct CollideDiff {
    first: Operand,
    second: Operand,
    circumsphere_radius: f64,
}

impl CollideDiff {
    pub fn new(first: Operand, second: Operand) -> Self {
        let circumsphere_radius = (first.position - second.position).norm()
            + first.geometry.circumsphere_radius()
            + second.geometry.circumsphere_radius();
        Self {
            first,
            second,
            circumsphere_radius,
        }
    }
}

impl CollideGeometry for CollideDiff {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.first.support(n) - self.second.support(&-n)
    }

    fn center(&self) -> Vector3<f64> {
        self.first.center() - self.second.center()
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

/// Convex hull of the union of two bodies.
#[derive(Debug, Clone)]
pub struct CollideMax {
    first: Operand,
    second: Operand,
    circumsphere_radius: f64,
}

impl CollideMax {
    pub fn new(first: Operand, second: Operand) -> Self {
        let reach1 = first.position.norm() + first.geometry.circumsphere_radius();
        let reach2 = second.position.norm() + second.geometry.circumsphere_radius();
        Self {
            first,
            second,
            circumsphere_radius: reach1.max(reach2),
        }
    }
}

impl CollideGeometry for CollideMax {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        let v1 = self.first.support(n);
        let v2 = self.second.support(n);
        if (v2 - v1).dot(n) > 0.0 { v2 } else { v1 }
    }

    fn center(&self) -> Vector3<f64> {
        0.5 * (self.first.center() + self.second.center())
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

#[cfg(test)]
mod tests {
    use super::super::intersect;
    use super::super::primitives::{CollideCuboid, CollideSegment, CollideSphere};
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    fn sphere(radius: f64) -> Arc<dyn CollideGeometry> {
        Arc::new(CollideSphere::new(radius))
    }

    #[test]
    fn sum_of_segment_and_sphere_is_a_spherocylinder() {
        let segment: Arc<dyn CollideGeometry> = Arc::new(CollideSegment::new(1.0));
        let spherocylinder = CollideSum::new(Operand::at_origin(segment), Operand::at_origin(sphere(0.5)));

        let tip = spherocylinder.support_point(&Vector3::x());
        assert!((tip - Vector3::new(1.5, 0.0, 0.0)).norm() < TOLERANCE);
        let side = spherocylinder.support_point(&Vector3::new(0.1, 1.0, 0.0));
        assert!((side.y - 0.5 / 1.01f64.sqrt()).abs() < TOLERANCE);
        assert!((spherocylinder.circumsphere_radius() - 1.5).abs() < TOLERANCE);
    }

    #[test]
    fn difference_support_mirrors_second_operand() {
        let cube: Arc<dyn CollideGeometry> = Arc::new(CollideCuboid::new(Vector3::new(1.0, 1.0, 1.0)));
        let diff = CollideDiff::new(
            Operand::translated(cube.clone(), Vector3::new(3.0, 0.0, 0.0)),
            Operand::at_origin(cube),
        );

        let support = diff.support_point(&Vector3::new(1.0, 1.0, 1.0));
        assert!((support - Vector3::new(5.0, 2.0, 2.0)).norm() < TOLERANCE);
        assert!((diff.center() - Vector3::new(3.0, 0.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn max_picks_farther_operand_along_direction() {
        let hull = CollideMax::new(
            Operand::translated(sphere(1.0), Vector3::new(-2.0, 0.0, 0.0)),
            Operand::translated(sphere(1.0), Vector3::new(2.0, 0.0, 0.0)),
        );

        assert!((hull.support_point(&Vector3::x()) - Vector3::new(3.0, 0.0, 0.0)).norm() < TOLERANCE);
        assert!((hull.support_point(&-Vector3::x()) - Vector3::new(-3.0, 0.0, 0.0)).norm() < TOLERANCE);
        assert!(hull.center().norm() < TOLERANCE);
        assert!((hull.circumsphere_radius() - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn hull_of_two_spheres_covers_the_gap_between_them() {
        let dumbbell = CollideMax::new(
            Operand::translated(sphere(0.5), Vector3::new(-2.0, 0.0, 0.0)),
            Operand::translated(sphere(0.5), Vector3::new(2.0, 0.0, 0.0)),
        );
        let probe = CollideSphere::new(0.2);
        let identity = Matrix3::identity();

        assert!(intersect(&dumbbell, &identity, &Vector3::zeros(), &probe, &identity, &Vector3::new(0.0, 0.6, 0.0), 1e-12));
        assert!(!intersect(&dumbbell, &identity, &Vector3::zeros(), &probe, &identity, &Vector3::new(0.0, 0.8, 0.0), 1e-12));
    }
}
