use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use nalgebra::Vector3;
use packmc::core::interactions::Interaction;
use packmc::core::interactions::central::{CentralInteraction, LennardJones, SquareWell};
use packmc::core::interactions::hard_sphere::HardSphere;
use packmc::core::models::shape_data::ShapeDataManager;
use packmc::engine::config::PackingConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// The interaction a run is performed with, as written in the `[particles.interaction]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type", deny_unknown_fields)]
pub enum InteractionConfig {
    HardSphere {
        radius: f64,
        #[serde(default)]
        centres: Vec<[f64; 3]>,
    },
    LennardJones {
        epsilon: f64,
        sigma: f64,
        cutoff: f64,
        #[serde(default)]
        centres: Vec<[f64; 3]>,
    },
    SquareWell {
        epsilon: f64,
        range: f64,
        #[serde(default)]
        centres: Vec<[f64; 3]>,
    },
}

/// An interaction that can also read and write its own per-particle payloads.
pub trait PackingModel: Send + Sync {
    fn interaction(&self) -> &dyn Interaction;
    fn shape_data_manager(&self) -> &dyn ShapeDataManager;
}

impl<T: Interaction + ShapeDataManager> PackingModel for T {
    fn interaction(&self) -> &dyn Interaction {
        self
    }

    fn shape_data_manager(&self) -> &dyn ShapeDataManager {
        self
    }
}

impl InteractionConfig {
    fn centres(&self) -> &[[f64; 3]] {
        match self {
            Self::HardSphere { centres, .. }
            | Self::LennardJones { centres, .. }
            | Self::SquareWell { centres, .. } => centres,
        }
    }

    /// Whether particles have an orientation worth sampling.
    pub fn is_anisotropic(&self) -> bool {
        !self.centres().is_empty()
    }

    pub fn build(&self) -> Box<dyn PackingModel> {
        let centres: Vec<Vector3<f64>> = self.centres().iter().map(|&c| Vector3::from(c)).collect();
        match *self {
            Self::HardSphere { radius, .. } => Box::new(HardSphere::new(radius).installed_on_centres(centres)),
            Self::LennardJones { epsilon, sigma, cutoff, .. } => Box::new(CentralInteraction::installed_on_centres(
                LennardJones::new(epsilon, sigma, cutoff),
                centres,
            )),
            Self::SquareWell { epsilon, range, .. } => {
                Box::new(CentralInteraction::installed_on_centres(SquareWell::new(epsilon, range), centres))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value > 0.0 {
                Ok(())
            } else {
                Err(CliError::Config(format!("`particles.interaction.{name}` must be positive, got {value}")))
            }
        };
        match *self {
            Self::HardSphere { radius, .. } => positive("radius", radius),
            Self::LennardJones { sigma, cutoff, .. } => {
                positive("sigma", sigma)?;
                positive("cutoff", cutoff)
            }
            Self::SquareWell { range, .. } => positive("range", range),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialBoxConfig {
    sides: Option<[f64; 3]>,
    side: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialParticlesConfig {
    count: Option<usize>,
    interaction: InteractionConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMonteCarloConfig {
    cycles: Option<usize>,
    seed: Option<u64>,
    temperature: Option<f64>,
    pressure: Option<f64>,
    translation_step: Option<f64>,
    rotation_step: Option<f64>,
    volume_step: Option<f64>,
    renormalization_interval: Option<usize>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialRunConfig {
    #[serde(rename = "box")]
    simulation_box: Option<PartialBoxConfig>,
    particles: PartialParticlesConfig,
    packing: Option<PackingConfig>,
    monte_carlo: Option<PartialMonteCarloConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub cycles: usize,
    pub seed: u64,
    pub temperature: f64,
    /// Volume moves are attempted once per cycle when set.
    pub pressure: Option<f64>,
    pub translation_step: f64,
    pub rotation_step: f64,
    /// Half-width of the proposal on `ln V`.
    pub volume_step: f64,
    pub renormalization_interval: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub box_sides: [f64; 3],
    pub particle_count: usize,
    pub interaction: InteractionConfig,
    pub packing: PackingConfig,
    pub monte_carlo: MonteCarloConfig,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves defaults without any command-line overrides.
    pub fn into_run_config(self, threads: Option<usize>) -> Result<RunConfig> {
        self.finish(threads, None, None, false)
    }

    pub fn merge_with_cli(mut self, args: &RunArgs, threads: Option<usize>) -> Result<RunConfig> {
        self.apply_set_values(&args.set_values)?;
        self.finish(threads, args.cycles, args.seed, args.no_volume_moves)
    }

    fn finish(
        self,
        threads: Option<usize>,
        cycles: Option<usize>,
        seed: Option<u64>,
        no_volume_moves: bool,
    ) -> Result<RunConfig> {
        let box_config = self.simulation_box.unwrap_or_default();
        let box_sides = match (box_config.sides, box_config.side) {
            (Some(sides), None) => sides,
            (None, Some(side)) => [side; 3],
            (Some(_), Some(_)) => {
                return Err(CliError::Config("Set either `box.sides` or `box.side`, not both.".to_string()));
            }
            (None, None) => return Err(CliError::Config("`box.sides` or `box.side` is required.".to_string())),
        };
        if box_sides.iter().any(|&s| !(s > 0.0)) {
            return Err(CliError::Config(format!("Box sides must be positive, got {box_sides:?}")));
        }

        let particle_count = self
            .particles
            .count
            .ok_or_else(|| CliError::Config("`particles.count` is required.".to_string()))?;
        if particle_count == 0 {
            return Err(CliError::Config("`particles.count` must be at least 1.".to_string()));
        }
        self.particles.interaction.validate()?;

        let mut packing = self.packing.unwrap_or_default();
        if let Some(threads) = threads {
            packing.scaling_threads = threads;
        }

        let mc = self.monte_carlo.unwrap_or_default();
        let monte_carlo = MonteCarloConfig {
            cycles: cycles.or(mc.cycles).unwrap_or(1000),
            seed: seed.or(mc.seed).unwrap_or(0),
            temperature: mc.temperature.unwrap_or(1.0),
            pressure: if no_volume_moves { None } else { mc.pressure },
            translation_step: mc.translation_step.unwrap_or(0.1),
            rotation_step: mc.rotation_step.unwrap_or(0.1),
            volume_step: mc.volume_step.unwrap_or(0.01),
            renormalization_interval: mc.renormalization_interval.unwrap_or(100),
        };
        if !(monte_carlo.temperature > 0.0) {
            return Err(CliError::Config("`monte-carlo.temperature` must be positive.".to_string()));
        }
        for (key, step) in [
            ("translation-step", monte_carlo.translation_step),
            ("rotation-step", monte_carlo.rotation_step),
            ("volume-step", monte_carlo.volume_step),
        ] {
            if !(step.is_finite() && step > 0.0) {
                return Err(CliError::Config(format!(
                    "`monte-carlo.{key}` must be positive and finite, got {step}."
                )));
            }
        }
        if monte_carlo.renormalization_interval == 0 {
            return Err(CliError::Config("`monte-carlo.renormalization-interval` must be at least 1.".to_string()));
        }

        Ok(RunConfig {
            box_sides,
            particle_count,
            interaction: self.particles.interaction,
            packing,
            monte_carlo,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!("Invalid --set format: '{}'. Expected KEY=VALUE.", kv_pair))
            })?;

            let float = || {
                value_str
                    .parse::<f64>()
                    .map_err(|_| CliError::Config(format!("Invalid float value for {}: {}", key, value_str)))
            };
            let integer = || {
                value_str
                    .parse::<usize>()
                    .map_err(|_| CliError::Config(format!("Invalid integer value for {}: {}", key, value_str)))
            };
            let mc = self.monte_carlo.get_or_insert_with(Default::default);

            match key {
                "particles.count" => self.particles.count = Some(integer()?),
                "monte-carlo.temperature" => mc.temperature = Some(float()?),
                "monte-carlo.pressure" => mc.pressure = Some(float()?),
                "monte-carlo.translation-step" => mc.translation_step = Some(float()?),
                "monte-carlo.rotation-step" => mc.rotation_step = Some(float()?),
                "monte-carlo.volume-step" => mc.volume_step = Some(float()?),
                "packing.move-threads" => {
                    self.packing.get_or_insert_with(Default::default).move_threads = integer()?;
                }
                "packing.overlap-counting" => {
                    let enabled = value_str.parse::<bool>().map_err(|_| {
                        CliError::Config(format!("Invalid boolean value for {}: {}", key, value_str))
                    })?;
                    self.packing.get_or_insert_with(Default::default).overlap_counting = enabled;
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
