use super::CollideGeometry;
use crate::core::geometry::is_vector_zero;
use nalgebra::Vector3;

/// A single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollidePoint {
    position: Vector3<f64>,
}

impl CollidePoint {
    pub fn new(position: Vector3<f64>) -> Self {
        Self { position }
    }
}

impl CollideGeometry for CollidePoint {
    fn support_point(&self, _n: &Vector3<f64>) -> Vector3<f64> {
        self.position
    }

    fn center(&self) -> Vector3<f64> {
        self.position
    }

    fn circumsphere_radius(&self) -> f64 {
        self.position.norm()
    }
}

/// A segment between `{-half_length, 0, 0}` and `{half_length, 0, 0}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideSegment {
    half_length: f64,
}

impl CollideSegment {
    /// # Panics
    ///
    /// Panics if `half_length` is not positive.
    pub fn new(half_length: f64) -> Self {
        assert!(half_length > 0.0, "segment half length must be positive");
        Self { half_length }
    }
}

impl CollideGeometry for CollideSegment {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(self.half_length.copysign(n.x), 0.0, 0.0)
    }

    fn circumsphere_radius(&self) -> f64 {
        self.half_length
    }
}

/// An axis-aligned rectangle in the XY plane centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideRectangle {
    half_sides: Vector3<f64>,
    half_diagonal: f64,
}

impl CollideRectangle {
    /// # Panics
    ///
    /// Panics if either half side is not positive.
    pub fn new(half_side_x: f64, half_side_y: f64) -> Self {
        assert!(
            half_side_x > 0.0 && half_side_y > 0.0,
            "rectangle half sides must be positive"
        );
        let half_sides = Vector3::new(half_side_x, half_side_y, 0.0);
        Self {
            half_sides,
            half_diagonal: half_sides.norm(),
        }
    }
}

impl CollideGeometry for CollideRectangle {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            self.half_sides.x.copysign(n.x),
            self.half_sides.y.copysign(n.y),
            0.0,
        )
    }

    fn circumsphere_radius(&self) -> f64 {
        self.half_diagonal
    }
}

/// An axis-aligned cuboid centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideCuboid {
    half_sides: Vector3<f64>,
    half_diagonal: f64,
}

impl CollideCuboid {
    /// # Panics
    ///
    /// Panics if any half side is not positive.
    pub fn new(half_sides: Vector3<f64>) -> Self {
        assert!(
            half_sides.iter().all(|&s| s > 0.0),
            "cuboid half sides must be positive"
        );
        Self {
            half_sides,
            half_diagonal: half_sides.norm(),
        }
    }
}

impl CollideGeometry for CollideCuboid {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.half_sides.zip_map(n, |side, dir| side.copysign(dir))
    }

    fn circumsphere_radius(&self) -> f64 {
        self.half_diagonal
    }
}

/// A disk of a given radius in the XY plane centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideDisk {
    radius: f64,
}

impl CollideDisk {
    /// # Panics
    ///
    /// Panics if `radius` is not positive.
    pub fn new(radius: f64) -> Self {
        assert!(radius > 0.0, "disk radius must be positive");
        Self { radius }
    }
}

impl CollideGeometry for CollideDisk {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        let in_plane = Vector3::new(n.x, n.y, 0.0);
        if is_vector_zero(&in_plane) {
            return Vector3::zeros();
        }
        self.radius * in_plane.normalize()
    }

    fn circumsphere_radius(&self) -> f64 {
        self.radius
    }
}

/// A sphere centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideSphere {
    radius: f64,
}

impl CollideSphere {
    /// # Panics
    ///
    /// Panics if `radius` is not positive.
    pub fn new(radius: f64) -> Self {
        assert!(radius > 0.0, "sphere radius must be positive");
        Self { radius }
    }
}

impl CollideGeometry for CollideSphere {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        if is_vector_zero(n) {
            return Vector3::zeros();
        }
        self.radius * n.normalize()
    }

    fn circumsphere_radius(&self) -> f64 {
        self.radius
    }
}

/// An ellipse in the XY plane with semi-axes along X and Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideEllipse {
    semi_axes: Vector3<f64>,
    circumsphere_radius: f64,
}

impl CollideEllipse {
    /// # Panics
    ///
    /// Panics if either semi-axis is not positive.
    pub fn new(semi_axis_x: f64, semi_axis_y: f64) -> Self {
        assert!(
            semi_axis_x > 0.0 && semi_axis_y > 0.0,
            "ellipse semi-axes must be positive"
        );
        Self {
            semi_axes: Vector3::new(semi_axis_x, semi_axis_y, 0.0),
            circumsphere_radius: semi_axis_x.max(semi_axis_y),
        }
    }
}

impl CollideGeometry for CollideEllipse {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        let scaled = self.semi_axes.component_mul(n);
        if is_vector_zero(&scaled) {
            return Vector3::zeros();
        }
        scaled.normalize().component_mul(&self.semi_axes)
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

/// An axis-aligned ellipsoid centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideEllipsoid {
    semi_axes: Vector3<f64>,
    circumsphere_radius: f64,
}

impl CollideEllipsoid {
    /// # Panics
    ///
    /// Panics if any semi-axis is not positive.
    pub fn new(semi_axes: Vector3<f64>) -> Self {
        assert!(
            semi_axes.iter().all(|&a| a > 0.0),
            "ellipsoid semi-axes must be positive"
        );
        Self {
            semi_axes,
            circumsphere_radius: semi_axes.max(),
        }
    }
}

impl CollideGeometry for CollideEllipsoid {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        let scaled = self.semi_axes.component_mul(n);
        if is_vector_zero(&scaled) {
            return Vector3::zeros();
        }
        scaled.normalize().component_mul(&self.semi_axes)
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

/// Support point of a lens obtained by revolving a circular arc spanning `{-h, 0, 0}`..`{h, 0, 0}`
/// with sagitta `r1` around the X axis.
fn lens_support(n: &Vector3<f64>, h: f64, r1: f64) -> Vector3<f64> {
    let curvature_radius = 0.5 * (h * h / r1 + r1);

    let n_unit = n.normalize();
    if n_unit.x * curvature_radius < -h {
        return Vector3::new(-h, 0.0, 0.0);
    }
    if n_unit.x * curvature_radius > h {
        return Vector3::new(h, 0.0, 0.0);
    }

    let radial = Vector3::new(0.0, n.y, n.z);
    if is_vector_zero(&radial) {
        return n_unit * curvature_radius;
    }
    -radial.normalize() * (curvature_radius - r1) + n_unit * curvature_radius
}

/// A rugby ball: a circular arc between `{-length, 0, 0}` and `{length, 0, 0}` with height
/// `radius`, revolved around the X axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideFootball {
    length: f64,
    radius: f64,
}

impl CollideFootball {
    /// # Panics
    ///
    /// Panics if `radius` is not positive or `length` is smaller than `radius`.
    pub fn new(length: f64, radius: f64) -> Self {
        assert!(radius > 0.0, "football radius must be positive");
        assert!(length >= radius, "football length must not be smaller than its radius");
        Self { length, radius }
    }
}

impl CollideGeometry for CollideFootball {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        if is_vector_zero(n) {
            return Vector3::zeros();
        }
        lens_support(n, self.length, self.radius)
    }

    fn circumsphere_radius(&self) -> f64 {
        self.length
    }
}

/// A pistol bullet: half of a [`CollideFootball`] with tip length `length_tip` spanning the negative
/// X half-space glued to a cylinder of length `length_tail` spanning the positive one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideBullet {
    length_tip: f64,
    length_tail: f64,
    radius: f64,
    circumsphere_radius: f64,
}

impl CollideBullet {
    /// # Panics
    ///
    /// Panics if `radius` or `length_tail` is not positive, or if `length_tip` is shorter than
    /// `radius`.
    pub fn new(length_tip: f64, length_tail: f64, radius: f64) -> Self {
        assert!(radius > 0.0, "bullet radius must be positive");
        assert!(length_tail > 0.0, "bullet tail length must be positive");
        assert!(length_tip >= radius, "bullet tip must not be shorter than its radius");
        Self {
            length_tip,
            length_tail,
            radius,
            circumsphere_radius: length_tip.max((length_tail * length_tail + radius * radius).sqrt()),
        }
    }
}

impl CollideGeometry for CollideBullet {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        if n.x < 0.0 {
            return lens_support(n, self.length_tip, self.radius);
        }

        let radial = Vector3::new(0.0, n.y, n.z);
        let tail = Vector3::new(self.length_tail, 0.0, 0.0);
        if is_vector_zero(&radial) {
            return tail;
        }
        self.radius * radial.normalize() + tail
    }

    fn center(&self) -> Vector3<f64> {
        Vector3::new(0.5 * (self.length_tail - self.length_tip), 0.0, 0.0)
    }

    fn circumsphere_radius(&self) -> f64 {
        self.circumsphere_radius
    }
}

/// A saucer: a circular arc between `{0, 0, -radius}` and `{0, 0, radius}` with height
/// `half_thickness` along X, revolved around the X axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideSaucer {
    radius: f64,
    half_thickness: f64,
}

impl CollideSaucer {
    /// # Panics
    ///
    /// Panics unless `0 < half_thickness <= radius`.
    pub fn new(radius: f64, half_thickness: f64) -> Self {
        assert!(radius > 0.0, "saucer radius must be positive");
        assert!(
            half_thickness > 0.0 && half_thickness <= radius,
            "saucer half thickness must be in (0, radius]"
        );
        Self {
            radius,
            half_thickness,
        }
    }
}

impl CollideGeometry for CollideSaucer {
    fn support_point(&self, n: &Vector3<f64>) -> Vector3<f64> {
        if is_vector_zero(n) {
            return Vector3::zeros();
        }

        let t = self.half_thickness;
        let h = self.radius;
        let curvature_radius = 0.5 * (h * h / t + t);

        let n_unit = n.normalize();
        let radial = Vector3::new(0.0, n.y, n.z);
        if !is_vector_zero(&radial) {
            let radial_share = n_unit.y * n_unit.y + n_unit.z * n_unit.z;
            if radial_share * curvature_radius * curvature_radius > h * h {
                return h * radial.normalize();
            }
        }

        let axis = if n.x < 0.0 { -Vector3::x() } else { Vector3::x() };
        -axis * (curvature_radius - t) + n_unit * curvature_radius
    }

    fn circumsphere_radius(&self) -> f64 {
        self.radius
    }
}
