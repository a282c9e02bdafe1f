use super::shape_data::ShapeData;
use crate::core::boundary::BoundaryConditions;
use nalgebra::{Matrix3, Vector3};
use std::fmt;

/// A single particle: absolute position, orientation and its opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    position: Vector3<f64>,
    orientation: Matrix3<f64>,
    data: ShapeData,
}

impl Shape {
    pub fn new(position: Vector3<f64>) -> Self {
        Self::with_orientation(position, Matrix3::identity())
    }

    pub fn with_orientation(position: Vector3<f64>, orientation: Matrix3<f64>) -> Self {
        Self::with_data(position, orientation, ShapeData::empty())
    }

    pub fn with_data(position: Vector3<f64>, orientation: Matrix3<f64>, data: ShapeData) -> Self {
        Self {
            position,
            orientation,
            data,
        }
    }

    #[inline]
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    #[inline]
    pub fn orientation(&self) -> &Matrix3<f64> {
        &self.orientation
    }

    #[inline]
    pub fn data(&self) -> &ShapeData {
        &self.data
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    pub fn set_orientation(&mut self, orientation: Matrix3<f64>) {
        self.orientation = orientation;
    }

    pub fn set_data(&mut self, data: ShapeData) {
        self.data = data;
    }

    /// Translates the shape and wraps it back into the primary image.
    pub fn translate(&mut self, translation: &Vector3<f64>, bc: &dyn BoundaryConditions) {
        self.position += translation;
        self.apply_bc(bc);
    }

    /// Left-multiplies the orientation by `rotation`.
    pub fn rotate(&mut self, rotation: &Matrix3<f64>) {
        self.orientation = rotation * self.orientation;
    }

    pub fn apply_bc(&mut self, bc: &dyn BoundaryConditions) {
        self.position += bc.correction(&self.position);
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        write!(f, "Shape{{pos: [{}, {}, {}], rot: [", p.x, p.y, p.z)?;
        for (i, value) in self.orientation.transpose().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "], data: {:?}}}", self.data.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::PeriodicBoundaryConditions;
    use crate::core::geometry::rotation_from_axis_angle;
    use crate::core::models::triclinic_box::TriclinicBox;
    use std::f64::consts::FRAC_PI_2;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn translate_applies_periodic_correction() {
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(5.0));
        let mut shape = Shape::new(Vector3::new(4.5, 1.0, 1.0));
        shape.translate(&Vector3::new(1.0, 0.0, -2.0), &bc);
        assert!((shape.position() - Vector3::new(0.5, 1.0, 4.0)).norm() < TOLERANCE);
    }

    #[test]
    fn rotate_composes_from_the_left() {
        let mut shape = Shape::new(Vector3::zeros());
        let quarter = rotation_from_axis_angle(&Vector3::z(), FRAC_PI_2);
        shape.rotate(&quarter);
        shape.rotate(&quarter);
        assert!((shape.orientation() * Vector3::x() + Vector3::x()).norm() < TOLERANCE);
    }

    #[test]
    fn display_lists_position_and_payload() {
        let shape = Shape::with_data(Vector3::new(1.0, 2.0, 3.0), Matrix3::identity(), ShapeData::new(vec![9]));
        let text = shape.to_string();
        assert!(text.starts_with("Shape{pos: [1, 2, 3], rot: [1, 0, 0"));
        assert!(text.ends_with("data: [9]}"));
    }
}
