use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A periodic simulation cell spanned by three arbitrary edge vectors.
///
/// The edge vectors are stored as the columns of [`dimensions`](Self::dimensions), so relative
/// coordinates `r ∈ [0, 1)³` map to absolute ones through `dimensions * r`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Matrix3<f64>", into = "Matrix3<f64>")]
pub struct TriclinicBox {
    dimensions: Matrix3<f64>,
    inverse_dimensions: Matrix3<f64>,
}

impl TriclinicBox {
    /// Builds a box whose columns are the edge vectors.
    ///
    /// A singular matrix is accepted here; such a box reports [`is_degenerate`](Self::is_degenerate)
    /// and callers that need a proper volume must reject it.
    pub fn from_matrix(dimensions: Matrix3<f64>) -> Self {
        Self {
            dimensions,
            inverse_dimensions: dimensions.try_inverse().unwrap_or_else(Matrix3::zeros),
        }
    }

    pub fn from_sides(sides: [Vector3<f64>; 3]) -> Self {
        Self::from_matrix(Matrix3::from_columns(&sides))
    }

    /// An axis-aligned cuboid box.
    pub fn cuboid(sides: [f64; 3]) -> Self {
        Self::from_matrix(Matrix3::from_diagonal(&Vector3::from(sides)))
    }

    pub fn cubic(linear_size: f64) -> Self {
        Self::cuboid([linear_size; 3])
    }

    #[inline]
    pub fn dimensions(&self) -> &Matrix3<f64> {
        &self.dimensions
    }

    #[inline]
    pub fn absolute_to_relative(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.inverse_dimensions * position
    }

    #[inline]
    pub fn relative_to_absolute(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.dimensions * position
    }

    /// Left-multiplies the edge vectors by `transformation`.
    pub fn transform(&mut self, transformation: &Matrix3<f64>) {
        *self = Self::from_matrix(transformation * self.dimensions);
    }

    pub fn scale(&mut self, factors: [f64; 3]) {
        self.transform(&Matrix3::from_diagonal(&Vector3::from(factors)));
    }

    pub fn scale_uniform(&mut self, factor: f64) {
        self.scale([factor; 3]);
    }

    pub fn sides(&self) -> [Vector3<f64>; 3] {
        [
            self.dimensions.column(0).into_owned(),
            self.dimensions.column(1).into_owned(),
            self.dimensions.column(2).into_owned(),
        ]
    }

    pub fn volume(&self) -> f64 {
        self.dimensions.determinant().abs()
    }

    pub fn is_degenerate(&self) -> bool {
        self.volume() == 0.0 || !self.volume().is_finite()
    }

    /// Distances between opposite faces, one per edge vector.
    pub fn heights(&self) -> [f64; 3] {
        let [a, b, c] = self.sides();
        let volume = self.volume();
        [
            volume / b.cross(&c).norm(),
            volume / c.cross(&a).norm(),
            volume / a.cross(&b).norm(),
        ]
    }
}

impl Default for TriclinicBox {
    fn default() -> Self {
        Self::cubic(1.0)
    }
}

impl From<Matrix3<f64>> for TriclinicBox {
    fn from(dimensions: Matrix3<f64>) -> Self {
        Self::from_matrix(dimensions)
    }
}

impl From<TriclinicBox> for Matrix3<f64> {
    fn from(value: TriclinicBox) -> Self {
        value.dimensions
    }
}

impl fmt::Display for TriclinicBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.sides();
        write!(
            f,
            "TriclinicBox{{[{}, {}, {}], [{}, {}, {}], [{}, {}, {}]}}",
            a.x, a.y, a.z, b.x, b.y, b.z, c.x, c.y, c.z
        )
    }
}
