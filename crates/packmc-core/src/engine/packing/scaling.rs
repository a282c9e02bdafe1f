use super::Packing;
use crate::core::interactions::Interaction;
use crate::core::models::triclinic_box::TriclinicBox;
use crate::engine::error::PackingError;
use nalgebra::Vector3;
use std::mem;
use tracing::{instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const UPSCALE_EPSILON: f64 = 100.0 * f64::EPSILON;

/// State needed to undo a pending [`Packing::try_scaling`].
#[derive(Debug)]
pub(super) struct ScalingSnapshot {
    simulation_box: TriclinicBox,
    positions: Vec<Vector3<f64>>,
    num_overlaps: usize,
}

/// Whether going from `old_box` to `new_box` moves no two points closer together.
///
/// Every side must keep its direction without shrinking. Unequal stretch factors only qualify
/// when the old sides are mutually orthogonal; any shear or rotation does not qualify.
pub fn is_box_upscaled(old_box: &TriclinicBox, new_box: &TriclinicBox) -> bool {
    let old_sides = old_box.sides();
    let new_sides = new_box.sides();

    let mut factors = [0.0; 3];
    for (i, (old_side, new_side)) in old_sides.iter().zip(&new_sides).enumerate() {
        let old_length = old_side.norm();
        let new_length = new_side.norm();
        let colinear = old_side.cross(new_side).norm() <= UPSCALE_EPSILON * old_length * new_length;
        if !colinear || old_side.dot(new_side) <= 0.0 || new_length < old_length * (1.0 - UPSCALE_EPSILON) {
            return false;
        }
        factors[i] = new_length / old_length;
    }

    let uniform = factors.iter().all(|f| (f - factors[0]).abs() <= UPSCALE_EPSILON * factors[0]);
    let orthogonal = (0..3).all(|i| {
        let (a, b) = (&old_sides[i], &old_sides[(i + 1) % 3]);
        a.dot(b).abs() <= UPSCALE_EPSILON * a.norm() * b.norm()
    });
    uniform || orthogonal
}

impl Packing {
    /// Rescales the packing to `new_box`, mapping every position through its relative
    /// coordinates, and returns the cost of doing so.
    ///
    /// The result follows the same convention as single-particle trials. The change is applied
    /// immediately and must be confirmed with [`accept_scaling`](Self::accept_scaling) or undone
    /// with [`revert_scaling`](Self::revert_scaling). Orientations and payloads are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PackingError::DegenerateBox`] if `new_box` has no volume.
    #[instrument(skip_all)]
    pub fn try_scaling(&mut self, new_box: &TriclinicBox, interaction: &dyn Interaction) -> Result<f64, PackingError> {
        if new_box.is_degenerate() {
            return Err(PackingError::DegenerateBox);
        }
        self.discard_pending_moves();

        let old_box = self.simulation_box;
        let initial_energy = self.total_energy(interaction);
        let positions = self.shapes.iter().map(|shape| *shape.position()).collect();
        self.pending_scaling = Some(ScalingSnapshot {
            simulation_box: old_box,
            positions,
            num_overlaps: self.num_overlaps,
        });

        let shapes = &mut self.shapes;
        self.scan_pool.install(|| {
            #[cfg(not(feature = "parallel"))]
            let iterator = shapes.iter_mut();
            #[cfg(feature = "parallel")]
            let iterator = shapes.par_iter_mut();

            iterator.for_each(|shape| {
                let relative = old_box.absolute_to_relative(shape.position());
                shape.set_position(new_box.relative_to_absolute(&relative));
            });
        });
        self.simulation_box = *new_box;
        self.bc.set_box(new_box);
        mem::swap(&mut self.neighbour_grid, &mut self.temp_neighbour_grid);
        self.recalculate_absolute_centres();
        self.rebuild_neighbour_grid();

        if interaction.has_hard_part() {
            if self.overlap_counting {
                let before = self.num_overlaps;
                self.num_overlaps = self.count_total_overlaps(interaction, false);
                trace!(before, after = self.num_overlaps, "Overlaps recounted after scaling.");
                if self.num_overlaps > before {
                    return Ok(f64::INFINITY);
                } else if self.num_overlaps < before {
                    return Ok(f64::NEG_INFINITY);
                }
            } else if interaction.is_convex() && is_box_upscaled(&old_box, new_box) {
                trace!("Convex upscale, overlap scan skipped.");
            } else if self.count_total_overlaps(interaction, true) > 0 {
                trace!("Scaling introduced an overlap.");
                return Ok(f64::INFINITY);
            }
        }

        if !interaction.has_soft_part() {
            return Ok(0.0);
        }
        Ok(self.total_energy(interaction) - initial_energy)
    }

    /// Scales each box side by the matching factor.
    pub fn try_scaling_factors(&mut self, factors: [f64; 3], interaction: &dyn Interaction) -> Result<f64, PackingError> {
        let mut new_box = self.simulation_box;
        new_box.scale(factors);
        self.try_scaling(&new_box, interaction)
    }

    pub fn try_scaling_uniform(&mut self, factor: f64, interaction: &dyn Interaction) -> Result<f64, PackingError> {
        self.try_scaling_factors([factor; 3], interaction)
    }

    /// Keeps the pending scaling.
    pub fn accept_scaling(&mut self) -> Result<(), PackingError> {
        self.pending_scaling
            .take()
            .map(|_| ())
            .ok_or(PackingError::NoPendingScaling)
    }

    /// Restores the box, positions, neighbour grid and overlap count from before the pending
    /// scaling.
    pub fn revert_scaling(&mut self) -> Result<(), PackingError> {
        let snapshot = self.pending_scaling.take().ok_or(PackingError::NoPendingScaling)?;

        self.simulation_box = snapshot.simulation_box;
        self.bc.set_box(&snapshot.simulation_box);
        for (shape, position) in self.shapes.iter_mut().zip(snapshot.positions) {
            shape.set_position(position);
        }
        mem::swap(&mut self.neighbour_grid, &mut self.temp_neighbour_grid);
        self.recalculate_absolute_centres();
        self.num_overlaps = snapshot.num_overlaps;
        Ok(())
    }
}
