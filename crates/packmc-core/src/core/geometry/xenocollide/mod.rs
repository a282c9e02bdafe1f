//! # Convex Collision Kernel
//!
//! An implementation of the XenoCollide (Minkowski Portal Refinement) intersection test for
//! arbitrary convex bodies. A body takes part in the test only through its support function, its
//! center and the radius of a sphere around its local origin that encloses it.
//!
//! The kernel is used by concrete interactions (see
//! [`XenoCollideInteraction`](crate::core::interactions::xeno_collide::XenoCollideInteraction)),
//! never directly by the particle container.
//!
//! Bodies compose: [`operations`] provides Minkowski sums, Minkowski differences and convex hulls
//! whose results implement [`CollideGeometry`] again, so constructions of any depth can be fed to
//! [`intersect`].

use super::is_vector_zero;
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;

pub mod operations;
pub mod primitives;

/// Upper bound on portal updates in either phase before giving up and reporting contact.
const MAX_PORTAL_ITERATIONS: usize = 1000;

/// A convex body described by its support function.
pub trait CollideGeometry: Send + Sync {
    /// The point of the body farthest along direction `n`, in the body's local frame.
    ///
    /// `n` does not have to be normalized.
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64>;

    /// Any point strictly inside the body. Defaults to the local origin.
    fn center(&self) -> Vector3<f64> {
        Vector3::zeros()
    }

    /// Radius of a sphere centred at the local origin that encloses the whole body.
    fn circumsphere_radius(&self) -> f64;
}

impl<T: CollideGeometry + ?Sized> CollideGeometry for &T {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        (**self).support_point(n)
    }

    fn center(&self) -> Vector3<f64> {
        (**self).center()
    }

    fn circumsphere_radius(&self) -> f64 {
        (**self).circumsphere_radius()
    }
}

impl<T: CollideGeometry + ?Sized> CollideGeometry for Box<T> {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        (**self).support_point(n)
    }

    fn center(&self) -> Vector3<f64> {
        (**self).center()
    }

    fn circumsphere_radius(&self) -> f64 {
        (**self).circumsphere_radius()
    }
}

impl<T: CollideGeometry + ?Sized> CollideGeometry for Arc<T> {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        (**self).support_point(n)
    }

    fn center(&self) -> Vector3<f64> {
        (**self).center()
    }

    fn circumsphere_radius(&self) -> f64 {
        (**self).circumsphere_radius()
    }
}

/// A body placed in the world frame by a rotation and a translation.
struct Placed<'a, G: ?Sized> {
    geometry: &'a G,
    rotation: &'a Matrix3<f64>,
    position: &'a Vector3<f64>,
}

impl<G: CollideGeometry + ?Sized> Placed<'_, G> {
    #[inline]
    fn support(&self, n: &Vector3<f64>) -> Vector3<f64> {
        let local_normal = self.rotation.transpose() * n;
        self.rotation * self.geometry.support_point(&local_normal) + self.position
    }

    #[inline]
    fn center(&self) -> Vector3<f64> {
        self.rotation * self.geometry.center() + self.position
    }
}

#[inline]
fn minkowski_support<G1, G2>(body1: &Placed<G1>, body2: &Placed<G2>, n: &Vector3<f64>) -> Vector3<f64>
where
    G1: CollideGeometry + ?Sized,
    G2: CollideGeometry + ?Sized,
{
    body2.support(n) - body1.support(&-n)
}

/// Returns `true` if the two placed convex bodies intersect.
///
/// `tolerance` is the distance below which the refined portal is considered to lie on the
/// boundary of the Minkowski difference; touching bodies closer than that are reported as disjoint.
pub fn intersect<G1, G2>(
    geometry1: &G1,
    rotation1: &Matrix3<f64>,
    position1: &Vector3<f64>,
    geometry2: &G2,
    rotation2: &Matrix3<f64>,
    position2: &Vector3<f64>,
    tolerance: f64,
) -> bool
where
    G1: CollideGeometry + ?Sized,
    G2: CollideGeometry + ?Sized,
{
    let max_distance = geometry1.circumsphere_radius() + geometry2.circumsphere_radius();
    if (position2 - position1).norm_squared() > max_distance * max_distance {
        return false;
    }

    let body1 = Placed {
        geometry: geometry1,
        rotation: rotation1,
        position: position1,
    };
    let body2 = Placed {
        geometry: geometry2,
        rotation: rotation2,
        position: position2,
    };

    // v0: interior point of the Minkowski difference
    let v0 = body2.center() - body1.center();
    if is_vector_zero(&v0) {
        return true;
    }

    // v1: support towards the origin
    let mut n = -v0;
    let mut v1 = minkowski_support(&body1, &body2, &n);
    if v1.dot(&n) <= 0.0 {
        return false;
    }

    // v2: support perpendicular to the plane of the origin, v0 and v1
    n = v1.cross(&v0);
    if is_vector_zero(&n) {
        // origin lies on the v0-v1 segment
        return true;
    }
    let mut v2 = minkowski_support(&body1, &body2, &n);
    if v2.dot(&n) <= 0.0 {
        return false;
    }

    n = (v1 - v0).cross(&(v2 - v0));
    if n.dot(&v0) > 0.0 {
        std::mem::swap(&mut v1, &mut v2);
        n = -n;
    }

    // Phase one: find a portal the origin ray passes through
    for _ in 0..MAX_PORTAL_ITERATIONS {
        let v3 = minkowski_support(&body1, &body2, &n);
        if v3.dot(&n) <= 0.0 {
            return false;
        }

        if v1.cross(&v3).dot(&v0) < 0.0 {
            v2 = v3;
            n = (v1 - v0).cross(&(v3 - v0));
            continue;
        }

        if v3.cross(&v2).dot(&v0) < 0.0 {
            v1 = v3;
            n = (v3 - v0).cross(&(v2 - v0));
            continue;
        }

        return refine_portal(&body1, &body2, v0, v1, v2, v3, tolerance);
    }

    true
}

/// Phase two: move the portal towards the boundary of the Minkowski difference until the origin is
/// known to be inside or outside.
fn refine_portal<G1, G2>(
    body1: &Placed<G1>,
    body2: &Placed<G2>,
    v0: Vector3<f64>,
    mut v1: Vector3<f64>,
    mut v2: Vector3<f64>,
    mut v3: Vector3<f64>,
    tolerance: f64,
) -> bool
where
    G1: CollideGeometry + ?Sized,
    G2: CollideGeometry + ?Sized,
{
    for _ in 0..MAX_PORTAL_ITERATIONS {
        let n = (v2 - v1).cross(&(v3 - v1));
        if n.dot(&v1) >= 0.0 {
            return true;
        }

        let v4 = minkowski_support(body1, body2, &n);
        let n = n.normalize();
        if v4.dot(&n) <= 0.0 || (v4 - v3).dot(&n) <= tolerance {
            return false;
        }

        // (vi x v4) . v0 == vi . (v4 x v0) > 0 if the origin is inside (vi, v4, v0)
        let cross = v4.cross(&v0);
        if v1.dot(&cross) > 0.0 {
            if v2.dot(&cross) > 0.0 {
                v1 = v4;
            } else {
                v3 = v4;
            }
        } else if v3.dot(&cross) > 0.0 {
            v2 = v4;
        } else {
            v1 = v4;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::primitives::{CollideCuboid, CollidePoint, CollideSegment, CollideSphere};
    use super::*;
    use crate::core::geometry::rotation_from_axis_angle;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f64 = 1e-12;

    fn identity() -> Matrix3<f64> {
        Matrix3::identity()
    }

    fn spheres_intersect(r1: f64, r2: f64, distance: f64) -> bool {
        let s1 = CollideSphere::new(r1);
        let s2 = CollideSphere::new(r2);
        intersect(
            &s1,
            &identity(),
            &Vector3::new(0.3, -0.2, 0.1),
            &s2,
            &rotation_from_axis_angle(&Vector3::new(1.0, 1.0, 0.0), 0.4),
            &(Vector3::new(0.3, -0.2, 0.1) + Vector3::new(1.0, 2.0, -0.5).normalize() * distance),
            TOLERANCE,
        )
    }

    #[test]
    fn spheres_intersect_iff_closer_than_sum_of_radii() {
        assert!(spheres_intersect(0.5, 0.7, 1.19));
        assert!(spheres_intersect(0.5, 0.7, 0.3));
        assert!(!spheres_intersect(0.5, 0.7, 1.21));
        assert!(!spheres_intersect(0.5, 0.7, 5.0));
    }

    #[test]
    fn concentric_bodies_intersect() {
        assert!(spheres_intersect(0.5, 0.5, 0.0));
    }

    #[test]
    fn point_intersects_sphere_only_when_inside() {
        let sphere = CollideSphere::new(1.0);
        let point = CollidePoint::new(Vector3::zeros());
        let inside = Vector3::new(0.5, 0.4, -0.3);
        let outside = Vector3::new(0.8, 0.7, 0.1);

        assert!(intersect(&sphere, &identity(), &Vector3::zeros(), &point, &identity(), &inside, TOLERANCE));
        assert!(!intersect(&sphere, &identity(), &Vector3::zeros(), &point, &identity(), &outside, TOLERANCE));
    }

    #[test]
    fn colinear_degenerate_portal_is_reported_as_hit() {
        // Two segments lying on the same line and overlapping: v0, v1 and the origin are colinear
        let segment = CollideSegment::new(1.0);
        assert!(intersect(
            &segment,
            &identity(),
            &Vector3::zeros(),
            &segment,
            &identity(),
            &Vector3::new(1.5, 0.0, 0.0),
            TOLERANCE
        ));
        assert!(!intersect(
            &segment,
            &identity(),
            &Vector3::zeros(),
            &segment,
            &identity(),
            &Vector3::new(2.5, 0.0, 0.0),
            TOLERANCE
        ));
    }

    #[test]
    fn rotated_cuboids_respect_orientation() {
        let cuboid = CollideCuboid::new(Vector3::new(1.0, 0.1, 0.1));
        let position2 = Vector3::new(0.0, 0.8, 0.0);

        // Parallel thin plates separated along y do not touch
        assert!(!intersect(&cuboid, &identity(), &Vector3::zeros(), &cuboid, &identity(), &position2, TOLERANCE));

        // Rotating the second one by 90 degrees around z makes it reach down to the first one
        let rot = rotation_from_axis_angle(&Vector3::z(), std::f64::consts::FRAC_PI_2);
        assert!(intersect(&cuboid, &identity(), &Vector3::zeros(), &cuboid, &rot, &position2, TOLERANCE));
    }

    #[test]
    fn intersection_is_symmetric_for_random_cuboid_pairs() {
        let mut rng = StdRng::seed_from_u64(1234);
        let cuboid1 = CollideCuboid::new(Vector3::new(0.5, 0.3, 0.2));
        let cuboid2 = CollideCuboid::new(Vector3::new(0.2, 0.6, 0.4));

        for _ in 0..500 {
            let axis1 = Vector3::new(rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5);
            let axis2 = Vector3::new(rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5);
            let rot1 = rotation_from_axis_angle(&axis1, rng.gen_range(0.0..6.28));
            let rot2 = rotation_from_axis_angle(&axis2, rng.gen_range(0.0..6.28));
            let pos1 = Vector3::new(rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>());
            let pos2 = Vector3::new(rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>()) * 1.5;

            let ab = intersect(&cuboid1, &rot1, &pos1, &cuboid2, &rot2, &pos2, TOLERANCE);
            let ba = intersect(&cuboid2, &rot2, &pos2, &cuboid1, &rot1, &pos1, TOLERANCE);
            assert_eq!(ab, ba, "asymmetric result for pos1 = {pos1:?}, pos2 = {pos2:?}");
        }
    }

    #[test]
    fn works_through_shared_pointers() {
        let sphere: Arc<dyn CollideGeometry> = Arc::new(CollideSphere::new(0.5));
        assert!(intersect(
            &sphere,
            &identity(),
            &Vector3::zeros(),
            &sphere,
            &identity(),
            &Vector3::new(0.9, 0.0, 0.0),
            TOLERANCE
        ));
    }
}
