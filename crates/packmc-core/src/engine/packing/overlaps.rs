use super::{Packing, ParticleView};
use crate::core::interactions::Interaction;
use crate::engine::error::PackingError;
use crate::engine::neighbour_grid::NeighbourGrid;
use nalgebra::Vector3;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Inward unit normal of the face of the box spanned by the two sides other than `axis` and
/// passing through the origin.
fn wall_normal(sides: &[Vector3<f64>; 3], axis: usize) -> Vector3<f64> {
    let normal = sides[(axis + 1) % 3].cross(&sides[(axis + 2) % 3]).normalize();
    if normal.dot(&sides[axis]) < 0.0 { -normal } else { normal }
}

/// Sums `count_from` over `0..units`. In early-exit mode units still queued once `found` is set
/// are skipped.
fn sum_over_units(units: usize, early_exit: bool, found: &AtomicBool, count_from: impl Fn(usize) -> usize + Sync) -> usize {
    #[cfg(not(feature = "parallel"))]
    let iterator = 0..units;
    #[cfg(feature = "parallel")]
    let iterator = (0..units).into_par_iter();

    iterator
        .map(|unit| {
            if early_exit && found.load(Ordering::Relaxed) {
                return 0;
            }
            let count = count_from(unit);
            if early_exit && count > 0 {
                found.store(true, Ordering::Relaxed);
            }
            count
        })
        .sum()
}

impl Packing {
    /// Overlaps of `particle` with every particle other than `idx`, plus its wall overlaps.
    pub(super) fn count_particle_overlaps(
        &self,
        particle: ParticleView<'_>,
        idx: usize,
        interaction: &dyn Interaction,
        early_exit: bool,
    ) -> usize {
        let mut count = 0;
        for site in particle.sites() {
            let flow = self.for_each_partner(&site.position, idx, |partner| {
                if interaction.overlap_between(site, partner, self.bc.as_ref()) {
                    count += 1;
                    if early_exit {
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            });
            if flow.is_break() {
                return count;
            }
        }
        count + self.particle_wall_overlaps(particle, interaction, early_exit)
    }

    /// Number of enabled wall faces `particle` overlaps with.
    ///
    /// A face is only tested when the particle lies within half the interaction range of it.
    pub(super) fn particle_wall_overlaps(
        &self,
        particle: ParticleView<'_>,
        interaction: &dyn Interaction,
        early_exit: bool,
    ) -> usize {
        if !interaction.has_wall_part() || !self.walls.contains(&true) {
            return 0;
        }

        let reach = self.interaction_range / 2.0;
        let relative = self.simulation_box.absolute_to_relative(particle.shape.position());
        let heights = self.simulation_box.heights();
        let sides = self.simulation_box.sides();

        let mut count = 0;
        for axis in (0..3).filter(|&axis| self.walls[axis]) {
            let normal = wall_normal(&sides, axis);
            let faces = [
                (relative[axis] * heights[axis], Vector3::zeros(), normal),
                ((1.0 - relative[axis]) * heights[axis], sides[axis], -normal),
            ];
            for (distance, origin, normal) in faces {
                if distance >= reach {
                    continue;
                }
                if particle
                    .wall_sites()
                    .any(|site| interaction.overlap_with_wall(site, &origin, &normal))
                {
                    count += 1;
                    if early_exit {
                        return count;
                    }
                }
            }
        }
        count
    }

    /// Counts overlapping pairs in the whole packing, walls included.
    ///
    /// With `early_exit` the scan stops as soon as any overlap is found, so the result is only
    /// meaningful as "zero or not".
    #[instrument(skip(self, interaction))]
    pub fn count_total_overlaps(&self, interaction: &dyn Interaction, early_exit: bool) -> usize {
        if !interaction.has_hard_part() {
            return 0;
        }

        let found = AtomicBool::new(false);
        let pairs = self
            .scan_pool
            .install(|| self.count_pair_overlaps(interaction, early_exit, &found));
        if early_exit && pairs > 0 {
            return pairs;
        }
        pairs + self.count_wall_overlaps(interaction, early_exit)
    }

    fn count_pair_overlaps(&self, interaction: &dyn Interaction, early_exit: bool, found: &AtomicBool) -> usize {
        match &self.neighbour_grid {
            Some(grid) => sum_over_units(grid.num_cells(), early_exit, found, |cell_no| {
                self.count_cell_overlaps(grid, cell_no, interaction, early_exit)
            }),
            None => sum_over_units(self.num_entities(), early_exit, found, |entity| {
                self.count_entity_overlaps(entity, interaction, early_exit)
            }),
        }
    }

    /// Pairs inside one cell plus pairs with the half shell of its neighbours.
    fn count_cell_overlaps(
        &self,
        grid: &NeighbourGrid,
        cell_no: usize,
        interaction: &dyn Interaction,
        early_exit: bool,
    ) -> usize {
        let coord = grid.cell_no_to_coord(cell_no);
        let members = grid.cell(coord);
        let no_translation = Vector3::zeros();
        let bc = self.bc.as_ref();

        let mut count = 0;
        for (i, &first) in members.iter().enumerate() {
            let site = self.entity_site(first, &no_translation);
            let particle = self.particle_of(first);

            for &second in &members[i + 1..] {
                if self.particle_of(second) == particle {
                    continue;
                }
                if interaction.overlap_between(site, self.entity_site(second, &no_translation), bc) {
                    count += 1;
                    if early_exit {
                        return count;
                    }
                }
            }

            for neighbour in grid.neighbouring_cells_of(coord, true) {
                for &second in neighbour.members {
                    if self.particle_of(second) == particle {
                        continue;
                    }
                    if interaction.overlap_between(site, self.entity_site(second, &neighbour.translation), bc) {
                        count += 1;
                        if early_exit {
                            return count;
                        }
                    }
                }
            }
        }
        count
    }

    fn count_entity_overlaps(&self, first: usize, interaction: &dyn Interaction, early_exit: bool) -> usize {
        let no_translation = Vector3::zeros();
        let site = self.entity_site(first, &no_translation);
        let particle = self.particle_of(first);

        let mut count = 0;
        for second in first + 1..self.num_entities() {
            if self.particle_of(second) == particle {
                continue;
            }
            if interaction.overlap_between(site, self.entity_site(second, &no_translation), self.bc.as_ref()) {
                count += 1;
                if early_exit {
                    break;
                }
            }
        }
        count
    }

    /// Counts (particle, wall face) overlaps over the whole packing.
    pub fn count_wall_overlaps(&self, interaction: &dyn Interaction, early_exit: bool) -> usize {
        if !interaction.has_wall_part() || !self.walls.contains(&true) {
            return 0;
        }

        let found = AtomicBool::new(false);
        self.scan_pool.install(|| {
            sum_over_units(self.size(), early_exit, &found, |idx| {
                self.particle_wall_overlaps(self.view(idx), interaction, early_exit)
            })
        })
    }

    /// Switches between exact overlap counting and early-exit checks. Enabling counting recounts
    /// from scratch; pending moves are discarded either way.
    pub fn toggle_overlap_counting(&mut self, enabled: bool, interaction: &dyn Interaction) {
        self.discard_pending_moves();
        self.overlap_counting = enabled;
        if enabled {
            self.num_overlaps = self.count_total_overlaps(interaction, false);
        }
        debug!(enabled, overlaps = self.num_overlaps, "Overlap counting toggled.");
    }

    /// Enables or disables the pair of hard walls perpendicular to box side `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`PackingError::InvalidWallAxis`] if `axis` is not 0, 1 or 2.
    pub fn toggle_wall(&mut self, axis: usize, enabled: bool, interaction: &dyn Interaction) -> Result<(), PackingError> {
        if axis >= 3 {
            return Err(PackingError::InvalidWallAxis(axis));
        }
        self.discard_pending_moves();
        self.walls[axis] = enabled;
        if self.overlap_counting {
            self.num_overlaps = self.count_total_overlaps(interaction, false);
        }
        debug!(axis, enabled, "Wall toggled.");
        Ok(())
    }

    /// The incrementally maintained overlap count.
    ///
    /// # Errors
    ///
    /// Returns [`PackingError::OverlapCountingDisabled`] unless overlap counting is enabled.
    pub fn cached_number_of_overlaps(&self) -> Result<usize, PackingError> {
        if !self.overlap_counting {
            return Err(PackingError::OverlapCountingDisabled);
        }
        Ok(self.num_overlaps)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::core::interactions::central::{CentralInteraction, SquareWell};
    use crate::core::interactions::hard_sphere::HardSphere;
    use crate::core::models::shape::Shape;
    use crate::core::models::triclinic_box::TriclinicBox;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_shapes(simulation_box: &TriclinicBox, count: usize, seed: u64) -> Vec<Shape> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let relative = Vector3::new(rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>());
                Shape::new(simulation_box.relative_to_absolute(&relative))
            })
            .collect()
    }

    fn sheared_box() -> TriclinicBox {
        TriclinicBox::from_sides([
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(2.0, 9.0, 0.0),
            Vector3::new(-1.0, 1.5, 11.0),
        ])
    }

    fn brute_force_count(packing: &mut Packing, interaction: &dyn Interaction) -> usize {
        let grid = packing.neighbour_grid.take();
        let count = packing.count_total_overlaps(interaction, false);
        packing.neighbour_grid = grid;
        count
    }

    #[test]
    fn grid_and_brute_force_counts_agree_in_sheared_box() {
        let hs = HardSphere::new(0.5);
        let simulation_box = sheared_box();
        let shapes = random_shapes(&simulation_box, 400, 3);
        let mut packing = Packing::new(simulation_box, shapes, periodic_bc(), &hs, &config(true)).unwrap();
        assert!(packing.neighbour_grid_cell_divisions().is_some());

        let with_grid = packing.count_total_overlaps(&hs, false);
        assert!(with_grid > 0);
        assert_eq!(brute_force_count(&mut packing, &hs), with_grid);
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), with_grid);
    }

    #[test]
    fn grid_and_brute_force_counts_agree_for_multi_centre_particles() {
        let trimers = HardSphere::new(0.3).installed_on_centres(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
        ]);
        let simulation_box = TriclinicBox::cubic(12.0);
        let shapes = random_shapes(&simulation_box, 150, 11);
        let mut packing = Packing::new(simulation_box, shapes, periodic_bc(), &trimers, &config(false)).unwrap();
        assert!(packing.neighbour_grid_cell_divisions().is_some());

        let with_grid = packing.count_total_overlaps(&trimers, false);
        assert!(with_grid > 0);
        assert_eq!(brute_force_count(&mut packing, &trimers), with_grid);
    }

    #[test]
    fn early_exit_scan_only_reports_presence() {
        let hs = HardSphere::new(0.5);
        let (simulation_box, shapes) = three_spheres();
        let packing = Packing::new(simulation_box, shapes, periodic_bc(), &hs, &config(false)).unwrap();
        assert!(packing.count_total_overlaps(&hs, true) > 0);

        let (simulation_box, shapes) = lattice(3, 6.0);
        let packing = Packing::new(simulation_box, shapes, periodic_bc(), &hs, &config(false)).unwrap();
        assert_eq!(packing.count_total_overlaps(&hs, true), 0);
    }

    #[test]
    fn soft_interactions_never_overlap() {
        let well = CentralInteraction::new(SquareWell::new(1.0, 1.5));
        let (simulation_box, shapes) = three_spheres();
        let packing = Packing::new(simulation_box, shapes, periodic_bc(), &well, &config(true)).unwrap();
        assert_eq!(packing.count_total_overlaps(&well, false), 0);
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 0);
    }

    #[test]
    fn walls_are_counted_per_face_and_toggle_recounts() {
        let hs = HardSphere::new(0.5);
        let shapes = vec![
            Shape::new(Vector3::new(5.0, 5.0, 0.3)),
            Shape::new(Vector3::new(2.0, 2.0, 9.9)),
            Shape::new(Vector3::new(0.2, 5.0, 5.0)),
        ];
        let mut packing = Packing::new(TriclinicBox::cubic(10.0), shapes, periodic_bc(), &hs, &config(true)).unwrap();
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 0);

        packing.toggle_wall(2, true, &hs).unwrap();
        assert_eq!(packing.walls(), [false, false, true]);
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 2);
        assert_eq!(packing.count_wall_overlaps(&hs, false), 2);

        packing.toggle_wall(0, true, &hs).unwrap();
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 3);

        packing.toggle_wall(2, false, &hs).unwrap();
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 1);
        assert!(matches!(packing.toggle_wall(3, true, &hs), Err(PackingError::InvalidWallAxis(3))));
    }

    #[test]
    fn trial_moves_respect_walls() {
        let hs = HardSphere::new(0.5);
        let shapes = vec![Shape::new(Vector3::new(5.0, 5.0, 1.0)), Shape::new(Vector3::new(2.0, 2.0, 5.0))];
        let mut packing = Packing::new(TriclinicBox::cubic(10.0), shapes, periodic_bc(), &hs, &config(false)).unwrap();
        packing.toggle_wall(2, true, &hs).unwrap();

        assert_eq!(packing.try_translation(0, 0, &Vector3::new(0.0, 0.0, -0.4), &hs, None).unwrap(), 0.0);
        assert_eq!(
            packing.try_translation(0, 0, &Vector3::new(0.0, 0.0, -0.7), &hs, None).unwrap(),
            f64::INFINITY
        );
        // Crossing the wall wraps the particle to the far face, which is just as forbidden.
        assert_eq!(
            packing.try_translation(0, 0, &Vector3::new(0.0, 0.0, -1.2), &hs, None).unwrap(),
            f64::INFINITY
        );
    }

    #[test]
    fn walls_follow_tilted_box_faces() {
        let hs = HardSphere::new(0.5);
        let simulation_box = TriclinicBox::from_sides([
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(0.0, 10.0, 0.0),
            Vector3::new(3.0, 0.0, 10.0),
        ]);
        // Relative x of 0.03 puts the sphere about 0.29 away from the tilted face.
        let near = simulation_box.relative_to_absolute(&Vector3::new(0.03, 0.5, 0.5));
        let far = simulation_box.relative_to_absolute(&Vector3::new(0.5, 0.5, 0.5));
        let config = crate::engine::config::PackingConfigBuilder::new()
            .move_threads(1)
            .walls([true, false, false])
            .build()
            .unwrap();
        let packing = Packing::new(
            simulation_box,
            vec![Shape::new(near), Shape::new(far)],
            periodic_bc(),
            &hs,
            &config,
        )
        .unwrap();

        assert_eq!(packing.count_wall_overlaps(&hs, false), 1);
        assert_eq!(packing.count_total_overlaps(&hs, false), 1);
    }

    #[test]
    fn toggling_counting_discards_pending_moves() {
        let hs = HardSphere::new(0.5);
        let (simulation_box, shapes) = three_spheres();
        let mut packing = Packing::new(simulation_box, shapes, periodic_bc(), &hs, &config(false)).unwrap();
        assert!(matches!(
            packing.cached_number_of_overlaps(),
            Err(PackingError::OverlapCountingDisabled)
        ));

        packing.try_translation(0, 1, &Vector3::new(0.0, 0.0, 1.1), &hs, None).unwrap();
        packing.toggle_overlap_counting(true, &hs);
        assert!(packing.is_overlap_counting_enabled());
        assert_eq!(packing.cached_number_of_overlaps().unwrap(), 1);
        assert!(matches!(packing.accept_translation(0), Err(PackingError::NoPendingMove { worker: 0 })));
    }
}
