use super::{Packing, ParticleView};
use crate::core::interactions::Interaction;
use crate::engine::error::PackingError;
use crate::engine::neighbour_grid::NeighbourGrid;
use nalgebra::Vector3;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

impl Packing {
    /// Soft energy between `particle` and every particle other than `idx`.
    pub(super) fn particle_energy(&self, particle: ParticleView<'_>, idx: usize, interaction: &dyn Interaction) -> f64 {
        let mut energy = 0.0;
        for site in particle.sites() {
            self.visit_all_partners(&site.position, idx, |partner| {
                energy += interaction.calculate_energy_between(site, partner, self.bc.as_ref());
            });
        }
        energy
    }

    /// Soft energy of particle `idx` with the rest of the packing.
    pub fn particle_energy_of(&self, idx: usize, interaction: &dyn Interaction) -> Result<f64, PackingError> {
        self.check_particle_index(idx)?;
        if !interaction.has_soft_part() {
            return Ok(0.0);
        }
        Ok(self.particle_energy(self.view(idx), idx, interaction))
    }

    /// Soft energy of the whole packing, each pair counted once.
    #[instrument(skip_all)]
    pub fn total_energy(&self, interaction: &dyn Interaction) -> f64 {
        if !interaction.has_soft_part() {
            return 0.0;
        }

        self.scan_pool.install(|| match &self.neighbour_grid {
            Some(grid) => {
                #[cfg(not(feature = "parallel"))]
                let iterator = 0..grid.num_cells();
                #[cfg(feature = "parallel")]
                let iterator = (0..grid.num_cells()).into_par_iter();

                iterator
                    .map(|cell_no| self.cell_energy(grid, cell_no, interaction))
                    .sum()
            }
            None => {
                #[cfg(not(feature = "parallel"))]
                let iterator = 0..self.num_entities();
                #[cfg(feature = "parallel")]
                let iterator = (0..self.num_entities()).into_par_iter();

                iterator
                    .map(|entity| self.entity_energy(entity, interaction))
                    .sum()
            }
        })
    }

    fn cell_energy(&self, grid: &NeighbourGrid, cell_no: usize, interaction: &dyn Interaction) -> f64 {
        let coord = grid.cell_no_to_coord(cell_no);
        let members = grid.cell(coord);
        let no_translation = Vector3::zeros();
        let bc = self.bc.as_ref();

        let mut energy = 0.0;
        for (i, &first) in members.iter().enumerate() {
            let site = self.entity_site(first, &no_translation);
            let particle = self.particle_of(first);

            for &second in members[i + 1..].iter().filter(|&&second| self.particle_of(second) != particle) {
                energy += interaction.calculate_energy_between(site, self.entity_site(second, &no_translation), bc);
            }
            for neighbour in grid.neighbouring_cells_of(coord, true) {
                for &second in neighbour.members.iter().filter(|&&second| self.particle_of(second) != particle) {
                    energy +=
                        interaction.calculate_energy_between(site, self.entity_site(second, &neighbour.translation), bc);
                }
            }
        }
        energy
    }

    fn entity_energy(&self, first: usize, interaction: &dyn Interaction) -> f64 {
        let no_translation = Vector3::zeros();
        let site = self.entity_site(first, &no_translation);
        let particle = self.particle_of(first);

        (first + 1..self.num_entities())
            .filter(|&second| self.particle_of(second) != particle)
            .map(|second| {
                interaction.calculate_energy_between(site, self.entity_site(second, &no_translation), self.bc.as_ref())
            })
            .sum()
    }

    /// Variance of the per-particle energies.
    pub fn particle_energy_fluctuations(&self, interaction: &dyn Interaction) -> f64 {
        if !interaction.has_soft_part() {
            return 0.0;
        }

        let energies: Vec<f64> = self.scan_pool.install(|| {
            #[cfg(not(feature = "parallel"))]
            let iterator = 0..self.size();
            #[cfg(feature = "parallel")]
            let iterator = (0..self.size()).into_par_iter();

            iterator
                .map(|idx| self.particle_energy(self.view(idx), idx, interaction))
                .collect()
        });

        let n = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / n;
        let mean_of_squares = energies.iter().map(|e| e * e).sum::<f64>() / n;
        (mean_of_squares - mean * mean).max(0.0)
    }

    /// Mean number of sites other particles have in the neighbourhood scanned for each particle.
    ///
    /// With the neighbour grid active this is the occupancy of the surrounding cells; without it,
    /// every other particle is a neighbour.
    pub fn average_number_of_neighbours(&self) -> f64 {
        let total: usize = (0..self.size())
            .map(|idx| {
                let mut neighbours = 0;
                for site in self.view(idx).sites() {
                    self.visit_all_partners(&site.position, idx, |_| neighbours += 1);
                }
                neighbours
            })
            .sum();
        total as f64 / self.size() as f64
    }
}
