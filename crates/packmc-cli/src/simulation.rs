use crate::config::{MonteCarloConfig, PackingModel, RunConfig};
use crate::error::Result;
use nalgebra::{Matrix3, Vector3};
use packmc::core::boundary::PeriodicBoundaryConditions;
use packmc::core::geometry::rotation_from_axis_angle;
use packmc::core::models::shape::Shape;
use packmc::core::models::triclinic_box::TriclinicBox;
use packmc::engine::packing::{Packing, RenormalizationMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::{debug, info, trace};

const MOVE_WORKER: usize = 0;

/// Places `count` particles on the first sites of the smallest simple-cubic lattice that fits.
pub fn cubic_lattice(simulation_box: &TriclinicBox, count: usize) -> Vec<Shape> {
    let per_side = (1..).find(|n: &usize| n.pow(3) >= count).unwrap_or(1);
    let spacing = 1.0 / per_side as f64;
    (0..count)
        .map(|i| {
            let (x, y, z) = (i % per_side, (i / per_side) % per_side, i / (per_side * per_side));
            let relative = Vector3::new(x as f64 + 0.5, y as f64 + 0.5, z as f64 + 0.5) * spacing;
            Shape::new(simulation_box.relative_to_absolute(&relative))
        })
        .collect()
}

pub fn build_packing(config: &RunConfig, model: &dyn PackingModel) -> Result<Packing> {
    let simulation_box = TriclinicBox::cuboid(config.box_sides);
    let shapes = cubic_lattice(&simulation_box, config.particle_count);
    let packing = Packing::new(
        simulation_box,
        shapes,
        Box::new(PeriodicBoundaryConditions::default()),
        model.interaction(),
        &config.packing,
    )?;
    Ok(packing)
}

/// Attempted and accepted counts of one move type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MoveCounter {
    pub attempted: usize,
    pub accepted: usize,
}

impl MoveCounter {
    fn record(&mut self, accepted: bool) {
        self.attempted += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.attempted as f64
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MoveStatistics {
    pub translations: MoveCounter,
    pub rotations: MoveCounter,
    pub scalings: MoveCounter,
    pub rejected_renormalizations: usize,
}

impl fmt::Display for MoveStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tr {:.2}", self.translations.rate())?;
        if self.rotations.attempted > 0 {
            write!(f, " rot {:.2}", self.rotations.rate())?;
        }
        if self.scalings.attempted > 0 {
            write!(f, " vol {:.2}", self.scalings.rate())?;
        }
        Ok(())
    }
}

/// Metropolis sampler driving a [`Packing`] with single-particle moves and optional isotropic
/// volume moves at constant pressure.
pub struct Simulation<'a> {
    packing: Packing,
    model: &'a dyn PackingModel,
    config: MonteCarloConfig,
    anisotropic: bool,
    rng: StdRng,
    stats: MoveStatistics,
    cycles_done: usize,
}

impl<'a> Simulation<'a> {
    pub fn new(packing: Packing, model: &'a dyn PackingModel, config: MonteCarloConfig, anisotropic: bool) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            packing,
            model,
            config,
            anisotropic,
            rng,
            stats: MoveStatistics::default(),
            cycles_done: 0,
        }
    }

    pub fn packing(&self) -> &Packing {
        &self.packing
    }

    pub fn into_packing(self) -> Packing {
        self.packing
    }

    pub fn statistics(&self) -> &MoveStatistics {
        &self.stats
    }

    pub fn cycles_done(&self) -> usize {
        self.cycles_done
    }

    /// Metropolis acceptance for a change of `delta`, already divided by the temperature.
    fn accept(&mut self, reduced_delta: f64) -> bool {
        if reduced_delta == f64::INFINITY {
            return false;
        }
        reduced_delta <= 0.0 || self.rng.r#gen::<f64>() < (-reduced_delta).exp()
    }

    fn random_unit_vector(&mut self) -> Vector3<f64> {
        loop {
            let v: Vector3<f64> = Vector3::new(
                self.rng.gen_range(-1.0..1.0),
                self.rng.gen_range(-1.0..1.0),
                self.rng.gen_range(-1.0..1.0),
            );
            let norm2 = v.norm_squared();
            if norm2 > 1e-6 && norm2 <= 1.0 {
                return v / norm2.sqrt();
            }
        }
    }

    fn translation_step(&mut self) -> Result<()> {
        let idx = self.rng.gen_range(0..self.packing.size());
        let step = self.config.translation_step;
        let translation = Vector3::new(
            self.rng.gen_range(-step..=step),
            self.rng.gen_range(-step..=step),
            self.rng.gen_range(-step..=step),
        );

        let delta = self
            .packing
            .try_translation(MOVE_WORKER, idx, &translation, self.model.interaction(), None)?;
        let accepted = self.accept(delta / self.config.temperature);
        if accepted {
            self.packing.accept_translation(MOVE_WORKER)?;
        }
        self.stats.translations.record(accepted);
        Ok(())
    }

    fn rotation_step(&mut self) -> Result<()> {
        let idx = self.rng.gen_range(0..self.packing.size());
        let axis = self.random_unit_vector();
        let angle = self.rng.gen_range(-self.config.rotation_step..=self.config.rotation_step);
        let rotation: Matrix3<f64> = rotation_from_axis_angle(&axis, angle);

        let delta = self.packing.try_rotation(MOVE_WORKER, idx, &rotation, self.model.interaction())?;
        let accepted = self.accept(delta / self.config.temperature);
        if accepted {
            self.packing.accept_rotation(MOVE_WORKER)?;
        }
        self.stats.rotations.record(accepted);
        Ok(())
    }

    /// Isotropic random walk in `ln V` with the matching isobaric acceptance rule.
    fn volume_step(&mut self, pressure: f64) -> Result<()> {
        let ln_ratio = self.rng.gen_range(-self.config.volume_step..=self.config.volume_step);
        let factor = (ln_ratio / 3.0).exp();
        let old_volume = self.packing.volume();

        let delta = self.packing.try_scaling_uniform(factor, self.model.interaction())?;
        let new_volume = self.packing.volume();
        let particles = self.packing.size() as f64;
        let temperature = self.config.temperature;
        let reduced = delta / temperature + pressure * (new_volume - old_volume) / temperature
            - (particles + 1.0) * ln_ratio;

        let accepted = self.accept(reduced);
        if accepted {
            self.packing.accept_scaling()?;
        } else {
            self.packing.revert_scaling()?;
        }
        trace!(factor, delta, accepted, "Volume move.");
        self.stats.scalings.record(accepted);
        Ok(())
    }

    /// One cycle: as many single-particle moves as there are particles, then one volume move if a
    /// pressure is set.
    pub fn cycle(&mut self) -> Result<()> {
        for _ in 0..self.packing.size() {
            if self.anisotropic && self.rng.r#gen::<bool>() {
                self.rotation_step()?;
            } else {
                self.translation_step()?;
            }
        }
        if let Some(pressure) = self.config.pressure {
            self.volume_step(pressure)?;
        }

        self.cycles_done += 1;
        if self.anisotropic && self.cycles_done % self.config.renormalization_interval == 0 {
            let rejected = self
                .packing
                .renormalize_orientations(self.model.interaction(), RenormalizationMode::RejectOnOverlap)?;
            self.stats.rejected_renormalizations += rejected;
            debug!(cycle = self.cycles_done, rejected, "Orientations renormalized.");
        }
        Ok(())
    }

    /// Runs `cycles` cycles, calling `on_cycle` after each.
    pub fn run(&mut self, cycles: usize, mut on_cycle: impl FnMut(&Self)) -> Result<()> {
        info!(cycles, particles = self.packing.size(), "Starting Monte Carlo run.");
        for _ in 0..cycles {
            self.cycle()?;
            on_cycle(self);
        }
        info!(statistics = %self.stats, "Monte Carlo run finished.");
        Ok(())
    }
}
