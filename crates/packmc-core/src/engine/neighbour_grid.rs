//! # Neighbour Grid
//!
//! A periodic cell list over a triclinic box. The box is cut into `n₁ × n₂ × n₃` cells along its
//! edge vectors such that every cell is at least one interaction range wide in the direction of
//! each box height. Two entities closer than the range then always sit in the same or in adjacent
//! cells, so a query only has to look at the 27 cells around a point.
//!
//! Cells at the faces of the box are adjacent to the cells at the opposite faces. Every
//! neighbouring cell handed out by the grid carries the translation that brings the stored
//! positions of its members into the frame of the queried point, which lets callers compute
//! distances without consulting the boundary conditions.

use crate::core::models::triclinic_box::TriclinicBox;
use itertools::iproduct;
use nalgebra::Vector3;
use std::mem;
use thiserror::Error;

/// Fewer divisions than this along any axis make a cell neighbour itself through the periodic
/// boundary.
pub const MIN_DIVISIONS: usize = 4;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GridError {
    #[error("Cell size {cell_size} leaves fewer than {MIN_DIVISIONS} cells along a box height")]
    Infeasible { cell_size: f64 },
}

/// A cell adjacent to a queried point or cell, together with the periodic translation of its
/// members.
#[derive(Debug, Clone, Copy)]
pub struct NeighbourCell<'a> {
    pub translation: Vector3<f64>,
    pub members: &'a [usize],
}

#[derive(Debug, Clone)]
pub struct NeighbourGrid {
    simulation_box: TriclinicBox,
    cell_size: f64,
    divisions: [usize; 3],
    num_cells: usize,
    cells: Vec<Vec<usize>>,
    full_offsets: Vec<[isize; 3]>,
    half_offsets: Vec<[isize; 3]>,
    sanitizer: Option<Vec<Option<usize>>>,
}

impl NeighbourGrid {
    pub fn new(simulation_box: &TriclinicBox, cell_size: f64) -> Result<Self, GridError> {
        let divisions = Self::divisions_for(simulation_box, cell_size)?;
        let num_cells = divisions.iter().product();

        let full_offsets: Vec<[isize; 3]> = iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(z, y, x)| [x, y, z])
            .collect();
        // Lexicographically positive offsets in (z, y, x) order: each unordered pair of distinct
        // cells is produced exactly once.
        let half_offsets = full_offsets
            .iter()
            .copied()
            .filter(|&[x, y, z]| (z, y, x) > (0, 0, 0))
            .collect();

        Ok(Self {
            simulation_box: *simulation_box,
            cell_size,
            divisions,
            num_cells,
            cells: vec![Vec::new(); num_cells],
            full_offsets,
            half_offsets,
            sanitizer: None,
        })
    }

    fn divisions_for(simulation_box: &TriclinicBox, cell_size: f64) -> Result<[usize; 3], GridError> {
        if !(cell_size > 0.0) {
            return Err(GridError::Infeasible { cell_size });
        }
        let heights = simulation_box.heights();
        let mut divisions = [0; 3];
        for (division, height) in divisions.iter_mut().zip(heights) {
            let n = (height / cell_size).floor();
            if !n.is_finite() || n < MIN_DIVISIONS as f64 {
                return Err(GridError::Infeasible { cell_size });
            }
            *division = n as usize;
        }
        Ok(divisions)
    }

    /// Adapts the grid to a new box and cell size and empties it.
    ///
    /// Returns the number of reallocations of the cell storage (0 or 1). On error the grid is left
    /// untouched.
    pub fn resize(&mut self, simulation_box: &TriclinicBox, cell_size: f64) -> Result<usize, GridError> {
        let divisions = Self::divisions_for(simulation_box, cell_size)?;
        self.simulation_box = *simulation_box;
        self.cell_size = cell_size;
        self.clear();

        if divisions == self.divisions {
            return Ok(0);
        }

        self.divisions = divisions;
        self.num_cells = divisions.iter().product();
        let mut reallocations = 0;
        if self.num_cells > self.cells.len() {
            self.cells.resize_with(self.num_cells, Vec::new);
            reallocations = 1;
        }
        if let Some(sanitizer) = self.sanitizer.as_mut() {
            sanitizer.clear();
            sanitizer.resize(self.num_cells, None);
        }
        Ok(reallocations)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Vec::clear);
    }

    #[inline]
    pub fn cell_divisions(&self) -> [usize; 3] {
        self.divisions
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn position_to_cell_coord(&self, position: &Vector3<f64>) -> [usize; 3] {
        let relative = self.simulation_box.absolute_to_relative(position);
        let mut coord = [0; 3];
        for i in 0..3 {
            let n = self.divisions[i];
            let scaled = (relative[i] * n as f64).floor();
            // Positions a rounding error outside the primary image land in the boundary cell.
            coord[i] = if scaled <= 0.0 {
                0
            } else {
                (scaled as usize).min(n - 1)
            };
        }
        coord
    }

    pub fn position_to_cell_no(&self, position: &Vector3<f64>) -> usize {
        self.cell_coord_to_no(self.position_to_cell_coord(position))
    }

    #[inline]
    pub fn cell_coord_to_no(&self, [x, y, z]: [usize; 3]) -> usize {
        (z * self.divisions[1] + y) * self.divisions[0] + x
    }

    pub fn cell_no_to_coord(&self, mut cell_no: usize) -> [usize; 3] {
        let x = cell_no % self.divisions[0];
        cell_no /= self.divisions[0];
        let y = cell_no % self.divisions[1];
        [x, y, cell_no / self.divisions[1]]
    }

    pub fn add(&mut self, index: usize, position: &Vector3<f64>) {
        let cell_no = self.position_to_cell_no(position);
        self.cells[cell_no].push(index);
    }

    pub fn add_to_cell(&mut self, index: usize, cell_no: usize) {
        self.cells[cell_no].push(index);
    }

    /// Removes `index` from the cell of `position`. Does nothing if it is not there.
    pub fn remove(&mut self, index: usize, position: &Vector3<f64>) {
        let cell_no = self.position_to_cell_no(position);
        let cell = &mut self.cells[cell_no];
        if let Some(at) = cell.iter().position(|&member| member == index) {
            cell.swap_remove(at);
        }
    }

    pub fn cell(&self, coord: [usize; 3]) -> &[usize] {
        &self.cells[self.cell_coord_to_no(coord)]
    }

    pub fn cell_of(&self, position: &Vector3<f64>) -> &[usize] {
        &self.cells[self.position_to_cell_no(position)]
    }

    /// All 27 cells around the cell of `position`, itself included.
    pub fn neighbouring_cells(&self, position: &Vector3<f64>) -> impl Iterator<Item = NeighbourCell<'_>> + '_ {
        let coord = self.position_to_cell_coord(position);
        self.cells_at_offsets(coord, &self.full_offsets)
    }

    /// Cells around the cell at `coord`. With `half_only` the cell itself is skipped and only the
    /// 13 lexicographically positive neighbours are returned, so iterating all cells this way
    /// visits every unordered pair of adjacent cells once.
    pub fn neighbouring_cells_of(
        &self,
        coord: [usize; 3],
        half_only: bool,
    ) -> impl Iterator<Item = NeighbourCell<'_>> + '_ {
        let offsets = if half_only {
            &self.half_offsets
        } else {
            &self.full_offsets
        };
        self.cells_at_offsets(coord, offsets)
    }

    fn cells_at_offsets<'a>(
        &'a self,
        coord: [usize; 3],
        offsets: &'a [[isize; 3]],
    ) -> impl Iterator<Item = NeighbourCell<'a>> + 'a {
        let sides = self.simulation_box.sides();
        offsets.iter().map(move |offset| {
            let mut neighbour = [0; 3];
            let mut translation = Vector3::zeros();
            for i in 0..3 {
                let n = self.divisions[i] as isize;
                let mut c = coord[i] as isize + offset[i];
                if c < 0 {
                    c += n;
                    translation -= sides[i];
                } else if c >= n {
                    c -= n;
                    translation += sides[i];
                }
                neighbour[i] = c as usize;
            }
            NeighbourCell {
                translation,
                members: &self.cells[self.cell_coord_to_no(neighbour)],
            }
        })
    }

    pub fn memory_usage(&self) -> usize {
        let buckets = self.cells.capacity() * mem::size_of::<Vec<usize>>();
        let members: usize = self
            .cells
            .iter()
            .map(|cell| cell.capacity() * mem::size_of::<usize>())
            .sum();
        let sanitizer = self
            .sanitizer
            .as_ref()
            .map_or(0, |s| s.capacity() * mem::size_of::<Option<usize>>());
        mem::size_of::<Self>() + buckets + members + sanitizer
    }

    /// Starts a new round of race detection.
    ///
    /// Once called, every [`record_mutation`](Self::record_mutation) in debug builds checks that no
    /// other worker has mutated the same or an adjacent cell since the last reset.
    pub fn reset_race_condition_sanitizer(&mut self) {
        match self.sanitizer.as_mut() {
            Some(sanitizer) => sanitizer.iter_mut().for_each(|owner| *owner = None),
            None => self.sanitizer = Some(vec![None; self.num_cells]),
        }
    }

    /// Notes that `worker` is about to mutate the cell of `position`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if a different worker mutated that cell or one of its neighbours in
    /// the current round.
    pub fn record_mutation(&mut self, position: &Vector3<f64>, worker: usize) {
        if !cfg!(debug_assertions) || self.sanitizer.is_none() {
            return;
        }

        let coord = self.position_to_cell_coord(position);
        let neighbours: Vec<usize> = self
            .full_offsets
            .iter()
            .map(|offset| {
                let mut neighbour = [0; 3];
                for i in 0..3 {
                    let n = self.divisions[i] as isize;
                    neighbour[i] = (coord[i] as isize + offset[i]).rem_euclid(n) as usize;
                }
                self.cell_coord_to_no(neighbour)
            })
            .collect();
        let own = self.cell_coord_to_no(coord);

        if let Some(sanitizer) = self.sanitizer.as_mut() {
            for &cell_no in &neighbours {
                if let Some(owner) = sanitizer[cell_no] {
                    assert!(
                        owner == worker,
                        "neighbour grid race: worker {worker} mutates a cell adjacent to one mutated by worker {owner}"
                    );
                }
            }
            sanitizer[own] = Some(worker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn sheared_box() -> TriclinicBox {
        TriclinicBox::from_sides([
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(2.0, 9.0, 0.0),
            Vector3::new(-1.0, 1.5, 11.0),
        ])
    }

    fn random_positions(simulation_box: &TriclinicBox, count: usize, seed: u64) -> Vec<Vector3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let relative = Vector3::new(rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>());
                simulation_box.relative_to_absolute(&relative)
            })
            .collect()
    }

    fn minimum_image_distance(simulation_box: &TriclinicBox, a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
        let sides = simulation_box.sides();
        let mut best = f64::INFINITY;
        for (i, j, k) in iproduct!(-1..=1, -1..=1, -1..=1) {
            let image = b + sides[0] * i as f64 + sides[1] * j as f64 + sides[2] * k as f64;
            best = best.min((image - a).norm());
        }
        best
    }

    #[test]
    fn divisions_follow_box_heights() {
        let grid = NeighbourGrid::new(&TriclinicBox::cuboid([10.0, 20.0, 4.5]), 1.0).unwrap();
        assert_eq!(grid.cell_divisions(), [10, 20, 4]);
        assert_eq!(grid.num_cells(), 800);
    }

    #[test]
    fn too_large_cells_are_infeasible() {
        let result = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 3.0);
        assert_eq!(result.unwrap_err(), GridError::Infeasible { cell_size: 3.0 });
        assert!(NeighbourGrid::new(&TriclinicBox::cubic(10.0), 2.5).is_ok());
        assert!(NeighbourGrid::new(&TriclinicBox::cubic(10.0), 0.0).is_err());
    }

    #[test]
    fn cell_numbering_round_trips() {
        let grid = NeighbourGrid::new(&TriclinicBox::cuboid([4.0, 5.0, 6.0]), 1.0).unwrap();
        for cell_no in 0..grid.num_cells() {
            assert_eq!(grid.cell_coord_to_no(grid.cell_no_to_coord(cell_no)), cell_no);
        }
    }

    #[test]
    fn add_and_remove_track_membership() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        let position = Vector3::new(2.5, 3.5, 4.5);
        grid.add(7, &position);
        grid.add(9, &position);
        assert_eq!(grid.cell([2, 3, 4]), &[7, 9]);

        grid.remove(7, &position);
        grid.remove(42, &position);
        assert_eq!(grid.cell_of(&position), &[9]);
    }

    #[test]
    fn boundary_rounding_is_clamped() {
        let grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        assert_eq!(grid.position_to_cell_coord(&Vector3::new(-1e-15, 10.0, 5.0)), [0, 9, 5]);
    }

    #[test]
    fn neighbouring_cells_find_every_close_pair_in_sheared_box() {
        let simulation_box = sheared_box();
        let range = 1.7;
        let positions = random_positions(&simulation_box, 300, 11);
        let mut grid = NeighbourGrid::new(&simulation_box, range).unwrap();
        for (i, p) in positions.iter().enumerate() {
            grid.add(i, p);
        }

        for (i, p) in positions.iter().enumerate() {
            let mut found = BTreeSet::new();
            for cell in grid.neighbouring_cells(p) {
                for &j in cell.members {
                    if j != i && (positions[j] + cell.translation - p).norm() < range {
                        found.insert(j);
                    }
                }
            }
            let expected: BTreeSet<usize> = (0..positions.len())
                .filter(|&j| j != i && minimum_image_distance(&simulation_box, p, &positions[j]) < range)
                .collect();
            assert_eq!(found, expected, "neighbours of particle {i}");
        }
    }

    #[test]
    fn half_shell_visits_each_cell_pair_once() {
        let grid = NeighbourGrid::new(&TriclinicBox::cuboid([4.0, 5.0, 6.0]), 1.0).unwrap();
        let mut pairs = BTreeSet::new();
        for cell_no in 0..grid.num_cells() {
            let coord = grid.cell_no_to_coord(cell_no);
            assert_eq!(grid.neighbouring_cells_of(coord, true).count(), 13);
            for (offset, _) in grid.half_offsets.iter().zip(grid.neighbouring_cells_of(coord, true)) {
                let neighbour: Vec<usize> = (0..3)
                    .map(|i| (coord[i] as isize + offset[i]).rem_euclid(grid.divisions[i] as isize) as usize)
                    .collect();
                let other = grid.cell_coord_to_no([neighbour[0], neighbour[1], neighbour[2]]);
                let pair = (cell_no.min(other), cell_no.max(other));
                assert!(pairs.insert(pair), "pair {pair:?} visited twice");
            }
        }
        assert_eq!(pairs.len(), grid.num_cells() * 13);
    }

    #[test]
    fn wrapped_neighbours_carry_box_translation() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        grid.add(3, &Vector3::new(9.5, 5.5, 5.5));
        let hits: Vec<_> = grid
            .neighbouring_cells(&Vector3::new(0.5, 5.5, 5.5))
            .filter(|cell| cell.members.contains(&3))
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].translation, Vector3::new(-10.0, 0.0, 0.0));
    }

    #[test]
    fn resize_reallocates_only_when_growing() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 2.0).unwrap();
        grid.add(0, &Vector3::new(1.0, 1.0, 1.0));

        assert_eq!(grid.resize(&TriclinicBox::cubic(10.5), 2.0).unwrap(), 0);
        assert!(grid.cell([0, 0, 0]).is_empty());
        assert_eq!(grid.resize(&TriclinicBox::cubic(20.0), 2.0).unwrap(), 1);
        assert_eq!(grid.cell_divisions(), [10, 10, 10]);
        assert_eq!(grid.resize(&TriclinicBox::cubic(10.0), 2.0).unwrap(), 0);
        assert_eq!(grid.cell_divisions(), [5, 5, 5]);
        assert!(grid.resize(&TriclinicBox::cubic(10.0), 5.0).is_err());
        assert_eq!(grid.cell_divisions(), [5, 5, 5]);
    }

    #[test]
    fn memory_usage_grows_with_members() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        let before = grid.memory_usage();
        for (i, p) in random_positions(&TriclinicBox::cubic(10.0), 100, 3).iter().enumerate() {
            grid.add(i, p);
        }
        assert!(grid.memory_usage() > before);
    }

    #[test]
    fn sanitizer_accepts_distant_workers() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        grid.reset_race_condition_sanitizer();
        grid.record_mutation(&Vector3::new(1.5, 1.5, 1.5), 0);
        grid.record_mutation(&Vector3::new(1.6, 1.5, 1.5), 0);
        grid.record_mutation(&Vector3::new(5.5, 5.5, 5.5), 1);
        grid.reset_race_condition_sanitizer();
        grid.record_mutation(&Vector3::new(2.5, 1.5, 1.5), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "neighbour grid race")]
    fn sanitizer_catches_adjacent_workers() {
        let mut grid = NeighbourGrid::new(&TriclinicBox::cubic(10.0), 1.0).unwrap();
        grid.reset_race_condition_sanitizer();
        grid.record_mutation(&Vector3::new(1.5, 1.5, 1.5), 0);
        grid.record_mutation(&Vector3::new(2.5, 1.5, 1.5), 1);
    }
}
