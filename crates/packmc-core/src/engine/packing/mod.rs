//! # Packing
//!
//! The particle container at the heart of the engine. It owns the shapes, the periodic box, the
//! boundary conditions and a [`NeighbourGrid`], and answers the two questions a Monte Carlo driver
//! keeps asking: does a proposed change create an overlap, and what does it cost in energy.
//!
//! ## Protocol
//!
//! - **Trial** - `try_translation`, `try_rotation`, `try_move` evaluate a single-particle change
//!   into the calling worker's private scratch slot. They take `&self`, so every move worker can
//!   run its trial concurrently against the same committed state.
//! - **Accept** - `accept_*` commits the worker's pending trial, updating the neighbour grid and
//!   the cached overlap count.
//! - **Revert** - implicit: a trial that is never accepted leaves no trace.
//! - **Scaling** - `try_scaling` rescales the whole packing to a new box and must be followed by
//!   `accept_scaling` or `revert_scaling`.
//!
//! ## Overlap Accounting
//!
//! With overlap counting enabled the packing keeps the exact number of overlapping pairs and
//! returns `+∞` for a trial that increases it and `-∞` for one that decreases it. Without it, the
//! first overlap found yields `+∞` and the packing is assumed to be overlap-free.

mod energy;
mod moves;
mod overlaps;
mod scaling;
mod snapshot;

pub use moves::{MoveKind, RenormalizationMode};
pub use scaling::is_box_upscaled;
pub use snapshot::{PackingSnapshot, ShapeRecord};

use self::moves::MoveSlot;
use self::scaling::ScalingSnapshot;
use super::config::PackingConfig;
use super::error::PackingError;
use super::neighbour_grid::NeighbourGrid;
use crate::core::boundary::BoundaryConditions;
use crate::core::interactions::{Interaction, InteractionSite};
use crate::core::models::shape::Shape;
use crate::core::models::triclinic_box::TriclinicBox;
use itertools::Either;
use nalgebra::Vector3;
use std::fmt;
use std::iter;
use std::mem;
use std::ops::{ControlFlow, Index};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Cell size aims at one particle per cell: `cbrt(V / N) / GRID_DENSITY_FACTOR`, unless the
/// interaction range is larger.
const GRID_DENSITY_FACTOR: f64 = 5.0;

/// A worker pool for whole-packing scans.
#[derive(Debug)]
struct ScanPool {
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
    threads: usize,
}

impl ScanPool {
    fn new(threads: usize) -> Result<Self, PackingError> {
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("packmc-scan-{i}"))
            .build()
            .map_err(|e| PackingError::ThreadPool(e.to_string()))?;

        Ok(Self {
            #[cfg(feature = "parallel")]
            pool,
            threads,
        })
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        #[cfg(feature = "parallel")]
        {
            self.pool.install(op)
        }
        #[cfg(not(feature = "parallel"))]
        {
            op()
        }
    }
}

/// A particle as seen by overlap and energy queries: either a committed one or a worker's trial
/// copy.
#[derive(Debug, Clone, Copy)]
struct ParticleView<'a> {
    shape: &'a Shape,
    centres: &'a [Vector3<f64>],
    absolute_centres: &'a [Vector3<f64>],
}

impl<'a> ParticleView<'a> {
    /// Sites used for pair terms; multi-site particles use their periodic-corrected centres.
    fn sites(self) -> impl Iterator<Item = InteractionSite<'a>> + 'a {
        let shape = self.shape;
        if self.absolute_centres.is_empty() {
            Either::Left(iter::once(InteractionSite::of_shape(shape)))
        } else {
            Either::Right(
                self.absolute_centres
                    .iter()
                    .enumerate()
                    .map(move |(i, position)| InteractionSite::new(*position, shape.orientation(), shape.data(), i)),
            )
        }
    }

    /// Sites used for wall terms; centres are not wrapped so a centre pushed through a wall is
    /// still seen behind it.
    fn wall_sites(self) -> impl Iterator<Item = InteractionSite<'a>> + 'a {
        let shape = self.shape;
        if self.centres.is_empty() {
            Either::Left(iter::once(InteractionSite::of_shape(shape)))
        } else {
            Either::Right(self.centres.iter().enumerate().map(move |(i, centre)| {
                InteractionSite::new(shape.position() + centre, shape.orientation(), shape.data(), i)
            }))
        }
    }
}

pub struct Packing {
    shapes: Vec<Shape>,
    simulation_box: TriclinicBox,
    bc: Box<dyn BoundaryConditions>,
    num_centres: usize,
    /// Rotated centre offsets, `num_centres` per particle.
    centres: Vec<Vector3<f64>>,
    absolute_centres: Vec<Vector3<f64>>,
    interaction_range: f64,
    neighbour_grid: Option<NeighbourGrid>,
    temp_neighbour_grid: Option<NeighbourGrid>,
    move_slots: Vec<Mutex<MoveSlot>>,
    overlap_counting: bool,
    num_overlaps: usize,
    walls: [bool; 3],
    pending_scaling: Option<ScalingSnapshot>,
    scan_pool: ScanPool,
    grid_rebuilds: usize,
    grid_resizes: usize,
    grid_rebuild_time: Duration,
}

impl Packing {
    /// Creates a packing and sets it up for `interaction`.
    ///
    /// # Errors
    ///
    /// Fails on any of the conditions listed for [`reset`](Self::reset), or if the scan worker
    /// pool cannot be started.
    pub fn new(
        simulation_box: TriclinicBox,
        shapes: Vec<Shape>,
        mut bc: Box<dyn BoundaryConditions>,
        interaction: &dyn Interaction,
        config: &PackingConfig,
    ) -> Result<Self, PackingError> {
        let move_threads = config.effective_move_threads();
        let scaling_threads = config.effective_scaling_threads();
        bc.set_box(&simulation_box);

        let mut packing = Self {
            shapes: Vec::new(),
            simulation_box,
            bc,
            num_centres: 0,
            centres: Vec::new(),
            absolute_centres: Vec::new(),
            interaction_range: 0.0,
            neighbour_grid: None,
            temp_neighbour_grid: None,
            move_slots: (0..move_threads).map(|_| Mutex::new(MoveSlot::default())).collect(),
            overlap_counting: config.overlap_counting,
            num_overlaps: 0,
            walls: config.walls,
            pending_scaling: None,
            scan_pool: ScanPool::new(scaling_threads)?,
            grid_rebuilds: 0,
            grid_resizes: 0,
            grid_rebuild_time: Duration::ZERO,
        };
        packing.reset(shapes, simulation_box, interaction)?;

        info!(
            num_particles = packing.size(),
            move_threads,
            scaling_threads,
            overlap_counting = config.overlap_counting,
            "Packing created."
        );
        Ok(packing)
    }

    /// Replaces all shapes and the box, then rebuilds centres, the neighbour grid and the overlap
    /// count from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if `shapes` is empty, the box is degenerate, a payload has the wrong size,
    /// a shape lies outside the box, the interaction range is not positive or the shapes do not
    /// all have the same number of interaction centres.
    #[instrument(skip_all, fields(num_particles = shapes.len()))]
    pub fn reset(
        &mut self,
        shapes: Vec<Shape>,
        simulation_box: TriclinicBox,
        interaction: &dyn Interaction,
    ) -> Result<(), PackingError> {
        if shapes.is_empty() {
            return Err(PackingError::EmptyShapes);
        }
        if simulation_box.is_degenerate() {
            return Err(PackingError::DegenerateBox);
        }

        let expected_data_size = interaction.shape_data_size();
        for (index, shape) in shapes.iter().enumerate() {
            if shape.data().len() != expected_data_size {
                return Err(PackingError::ShapeDataSize {
                    index,
                    expected: expected_data_size,
                    actual: shape.data().len(),
                });
            }
            let relative = simulation_box.absolute_to_relative(shape.position());
            if relative.iter().any(|r| !(0.0..=1.0).contains(r)) {
                return Err(PackingError::ShapeOutsideBox { index });
            }
        }

        self.shapes = shapes;
        self.simulation_box = simulation_box;
        self.bc.set_box(&simulation_box);
        self.setup_for_interaction(interaction)
    }

    /// Re-derives interaction centres, the neighbour grid and the overlap count for
    /// `interaction`, keeping shapes and box.
    pub fn setup_for_interaction(&mut self, interaction: &dyn Interaction) -> Result<(), PackingError> {
        let range = self
            .shapes
            .iter()
            .map(|shape| interaction.total_range_radius(shape.data()))
            .fold(f64::NEG_INFINITY, f64::max);
        if !(range > 0.0) {
            return Err(PackingError::NonPositiveRange(range));
        }

        let num_centres = interaction.interaction_centres(self.shapes[0].data()).len();
        let mut centres = Vec::with_capacity(self.shapes.len() * num_centres);
        for (index, shape) in self.shapes.iter().enumerate() {
            let local = interaction.interaction_centres(shape.data());
            if local.len() != num_centres {
                return Err(PackingError::InconsistentCentres {
                    index,
                    expected: num_centres,
                    actual: local.len(),
                });
            }
            centres.extend(local.iter().map(|centre| shape.orientation() * centre));
        }

        self.discard_pending_moves();
        self.pending_scaling = None;
        self.num_centres = num_centres;
        self.centres = centres;
        self.interaction_range = range;
        self.recalculate_absolute_centres();
        self.rebuild_neighbour_grid();
        self.temp_neighbour_grid = self.neighbour_grid.clone();

        if self.neighbour_grid.is_none() {
            warn!(
                range = self.interaction_range,
                "Neighbour grid infeasible for this box, falling back to pairwise scans."
            );
        }

        if self.overlap_counting {
            self.num_overlaps = self.count_total_overlaps(interaction, false);
        }
        debug!(
            num_centres,
            range,
            overlaps = ?self.overlap_counting.then_some(self.num_overlaps),
            "Packing set up for interaction."
        );
        Ok(())
    }

    fn recalculate_absolute_centres(&mut self) {
        self.absolute_centres.clear();
        if self.num_centres == 0 {
            return;
        }
        for (shape, centres) in self.shapes.iter().zip(self.centres.chunks_exact(self.num_centres)) {
            for centre in centres {
                let position = shape.position() + centre;
                self.absolute_centres.push(position + self.bc.correction(&position));
            }
        }
    }

    fn grid_cell_size(&self) -> f64 {
        let density_size = (self.simulation_box.volume() / self.shapes.len() as f64).cbrt() / GRID_DENSITY_FACTOR;
        self.interaction_range.max(density_size)
    }

    /// Resizes (or creates) the live neighbour grid for the current box and refills it.
    fn rebuild_neighbour_grid(&mut self) {
        let start = Instant::now();
        let cell_size = self.grid_cell_size();

        let rebuilt = match self.neighbour_grid.take() {
            Some(mut grid) => grid.resize(&self.simulation_box, cell_size).map(|reallocations| (grid, reallocations)),
            None => NeighbourGrid::new(&self.simulation_box, cell_size).map(|grid| (grid, 1)),
        };

        match rebuilt {
            Ok((mut grid, reallocations)) => {
                self.grid_resizes += reallocations;
                if self.num_centres == 0 {
                    for (i, shape) in self.shapes.iter().enumerate() {
                        grid.add(i, shape.position());
                    }
                } else {
                    for (entity, position) in self.absolute_centres.iter().enumerate() {
                        grid.add(entity, position);
                    }
                }
                debug!(divisions = ?grid.cell_divisions(), cell_size, "Neighbour grid rebuilt.");
                self.neighbour_grid = Some(grid);
            }
            Err(error) => {
                debug!(%error, "Neighbour grid disabled.");
            }
        }

        self.grid_rebuilds += 1;
        self.grid_rebuild_time += start.elapsed();
    }

    #[inline]
    fn particle_of(&self, entity: usize) -> usize {
        if self.num_centres == 0 { entity } else { entity / self.num_centres }
    }

    #[inline]
    fn num_entities(&self) -> usize {
        self.shapes.len() * self.num_centres.max(1)
    }

    /// The site of a grid entity, shifted by a periodic `translation`.
    #[inline]
    fn entity_site(&self, entity: usize, translation: &Vector3<f64>) -> InteractionSite<'_> {
        if self.num_centres == 0 {
            let shape = &self.shapes[entity];
            InteractionSite::new(shape.position() + translation, shape.orientation(), shape.data(), 0)
        } else {
            let shape = &self.shapes[entity / self.num_centres];
            InteractionSite::new(
                self.absolute_centres[entity] + translation,
                shape.orientation(),
                shape.data(),
                entity % self.num_centres,
            )
        }
    }

    fn particle_centres(&self, idx: usize) -> &[Vector3<f64>] {
        &self.centres[idx * self.num_centres..(idx + 1) * self.num_centres]
    }

    fn view(&self, idx: usize) -> ParticleView<'_> {
        ParticleView {
            shape: &self.shapes[idx],
            centres: self.particle_centres(idx),
            absolute_centres: self.absolute_interaction_centres(idx),
        }
    }

    /// Calls `visit` for every site of every particle other than `excluded` that may interact
    /// with a site at `position`. Partner positions are already moved to the image nearest to
    /// `position` when the neighbour grid is active.
    fn for_each_partner<'s>(
        &'s self,
        position: &Vector3<f64>,
        excluded: usize,
        mut visit: impl FnMut(InteractionSite<'s>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        match &self.neighbour_grid {
            Some(grid) => {
                for cell in grid.neighbouring_cells(position) {
                    for &entity in cell.members {
                        if self.particle_of(entity) == excluded {
                            continue;
                        }
                        if visit(self.entity_site(entity, &cell.translation)).is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                }
            }
            None => {
                let no_translation = Vector3::zeros();
                for entity in 0..self.num_entities() {
                    if self.particle_of(entity) == excluded {
                        continue;
                    }
                    if visit(self.entity_site(entity, &no_translation)).is_break() {
                        return ControlFlow::Break(());
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Non-breaking form of [`for_each_partner`](Self::for_each_partner).
    fn visit_all_partners<'s>(
        &'s self,
        position: &Vector3<f64>,
        excluded: usize,
        mut visit: impl FnMut(InteractionSite<'s>),
    ) {
        let flow = self.for_each_partner(position, excluded, |partner| {
            visit(partner);
            ControlFlow::Continue(())
        });
        debug_assert!(flow.is_continue());
    }

    fn check_particle_index(&self, index: usize) -> Result<(), PackingError> {
        if index >= self.shapes.len() {
            return Err(PackingError::ParticleIndexOutOfRange {
                index,
                size: self.shapes.len(),
            });
        }
        Ok(())
    }

    fn check_range(&self, interaction: &dyn Interaction, idx: usize) -> Result<(), PackingError> {
        let requested = interaction.total_range_radius(self.shapes[idx].data());
        if requested > self.interaction_range {
            return Err(PackingError::RangeExceeded {
                requested,
                supported: self.interaction_range,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    #[inline]
    pub fn simulation_box(&self) -> &TriclinicBox {
        &self.simulation_box
    }

    pub fn boundary_conditions(&self) -> &dyn BoundaryConditions {
        self.bc.as_ref()
    }

    pub fn move_threads(&self) -> usize {
        self.move_slots.len()
    }

    pub fn scaling_threads(&self) -> usize {
        self.scan_pool.threads
    }

    pub fn num_interaction_centres(&self) -> usize {
        self.num_centres
    }

    /// Total interaction range the neighbour grid was built for.
    pub fn interaction_range(&self) -> f64 {
        self.interaction_range
    }

    /// Periodic-corrected absolute positions of the interaction centres of particle `idx`; empty
    /// for single-site particles.
    pub fn absolute_interaction_centres(&self, idx: usize) -> &[Vector3<f64>] {
        if self.num_centres == 0 {
            return &[];
        }
        &self.absolute_centres[idx * self.num_centres..(idx + 1) * self.num_centres]
    }

    pub fn walls(&self) -> [bool; 3] {
        self.walls
    }

    pub fn is_overlap_counting_enabled(&self) -> bool {
        self.overlap_counting
    }

    pub fn volume(&self) -> f64 {
        self.simulation_box.volume()
    }

    pub fn number_density(&self) -> f64 {
        self.size() as f64 / self.volume()
    }

    /// Fraction of the box volume occupied by particles of volume `shape_volume` each.
    pub fn packing_fraction(&self, shape_volume: f64) -> f64 {
        self.size() as f64 * shape_volume / self.volume()
    }

    pub fn neighbour_grid_rebuilds(&self) -> usize {
        self.grid_rebuilds
    }

    pub fn neighbour_grid_resizes(&self) -> usize {
        self.grid_resizes
    }

    pub fn neighbour_grid_rebuild_time(&self) -> Duration {
        self.grid_rebuild_time
    }

    pub fn reset_counters(&mut self) {
        self.grid_rebuilds = 0;
        self.grid_resizes = 0;
        self.grid_rebuild_time = Duration::ZERO;
    }

    /// Divisions of the live neighbour grid, or `None` when pairwise scans are used.
    pub fn neighbour_grid_cell_divisions(&self) -> Option<[usize; 3]> {
        self.neighbour_grid.as_ref().map(NeighbourGrid::cell_divisions)
    }

    pub fn shapes_memory_usage(&self) -> usize {
        let shapes = self.shapes.capacity() * mem::size_of::<Shape>();
        let payloads: usize = self.shapes.iter().map(|shape| shape.data().len()).sum();
        let centres = (self.centres.capacity() + self.absolute_centres.capacity()) * mem::size_of::<Vector3<f64>>();
        let slots = self.move_slots.len() * mem::size_of::<Mutex<MoveSlot>>();
        shapes + payloads + centres + slots
    }

    pub fn neighbour_grid_memory_usage(&self) -> usize {
        [&self.neighbour_grid, &self.temp_neighbour_grid]
            .into_iter()
            .flatten()
            .map(NeighbourGrid::memory_usage)
            .sum()
    }

    /// Starts a new round of race detection on the live neighbour grid.
    pub fn reset_ng_race_condition_sanitizer(&mut self) {
        if let Some(grid) = self.neighbour_grid.as_mut() {
            grid.reset_race_condition_sanitizer();
        }
    }
}

impl Index<usize> for Packing {
    type Output = Shape;

    fn index(&self, index: usize) -> &Shape {
        &self.shapes[index]
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packing{{")?;
        writeln!(f, "  {},", self.simulation_box)?;
        for shape in &self.shapes {
            writeln!(f, "  {shape},")?;
        }
        write!(f, "}}")
    }
}
