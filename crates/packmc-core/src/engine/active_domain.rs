use crate::core::models::triclinic_box::TriclinicBox;
use nalgebra::Vector3;

/// Open interval of relative coordinates along one box axis.
///
/// If `beg > end` the interval wraps through the periodic boundary, i.e. it covers `(beg, 1)` and
/// `[0, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub beg: f64,
    pub end: f64,
}

impl RegionBounds {
    pub fn new(beg: f64, end: f64) -> Self {
        Self { beg, end }
    }

    #[inline]
    pub fn contains(&self, relative: f64) -> bool {
        if self.beg <= self.end {
            relative > self.beg && relative < self.end
        } else {
            relative > self.beg || relative < self.end
        }
    }
}

/// A region of the box inside which a worker may move particles.
///
/// Trial moves that would carry a particle outside the domain are rejected outright, which lets
/// workers with disjoint domains run concurrently without touching each other's neighbour cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDomain {
    simulation_box: TriclinicBox,
    bounds: [RegionBounds; 3],
}

impl ActiveDomain {
    pub fn new(simulation_box: TriclinicBox, bounds: [RegionBounds; 3]) -> Self {
        Self { simulation_box, bounds }
    }

    pub fn bounds_for_coordinate(&self, axis: usize) -> RegionBounds {
        self.bounds[axis]
    }

    pub fn is_inside(&self, position: &Vector3<f64>) -> bool {
        let relative = self.simulation_box.absolute_to_relative(position);
        self.bounds
            .iter()
            .zip(relative.iter())
            .all(|(bounds, &coordinate)| bounds.contains(coordinate))
    }
}
