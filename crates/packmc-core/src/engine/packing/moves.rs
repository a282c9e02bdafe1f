use super::{Packing, ParticleView};
use crate::core::boundary::BoundaryConditions;
use crate::core::geometry::renormalize_orientation;
use crate::core::interactions::Interaction;
use crate::core::models::shape::Shape;
use crate::engine::active_domain::ActiveDomain;
use crate::engine::error::PackingError;
use nalgebra::{Matrix3, Vector3};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// The kind of single-particle change a worker has pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Translation,
    Rotation,
    Move,
}

/// How [`Packing::renormalize_orientations`] treats fixes that create overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenormalizationMode {
    /// Renormalize every orientation and rebuild; overlaps may appear.
    AllowOverlaps,
    /// Fix particles one by one through rotation trials and skip fixes that overlap.
    RejectOnOverlap,
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    particle_idx: usize,
    kind: MoveKind,
}

/// Scratch space owned by one move worker. Buffers are reused between trials.
#[derive(Debug)]
pub(super) struct MoveSlot {
    shape: Shape,
    centres: Vec<Vector3<f64>>,
    absolute_centres: Vec<Vector3<f64>>,
    pending: Option<PendingMove>,
    overlap_delta: isize,
}

impl Default for MoveSlot {
    fn default() -> Self {
        Self {
            shape: Shape::new(Vector3::zeros()),
            centres: Vec::new(),
            absolute_centres: Vec::new(),
            pending: None,
            overlap_delta: 0,
        }
    }
}

impl MoveSlot {
    fn update_absolute_centres(&mut self, bc: &dyn BoundaryConditions) {
        self.absolute_centres.clear();
        let position = *self.shape.position();
        self.absolute_centres.extend(self.centres.iter().map(|centre| {
            let absolute = position + centre;
            absolute + bc.correction(&absolute)
        }));
    }

    fn view(&self) -> ParticleView<'_> {
        ParticleView {
            shape: &self.shape,
            centres: &self.centres,
            absolute_centres: &self.absolute_centres,
        }
    }
}

fn slot_mut(slot: &mut Mutex<MoveSlot>) -> &mut MoveSlot {
    slot.get_mut().unwrap_or_else(PoisonError::into_inner)
}

impl Packing {
    /// Forgets every worker's pending trial.
    pub(super) fn discard_pending_moves(&mut self) {
        for slot in &mut self.move_slots {
            slot_mut(slot).pending = None;
        }
    }

    fn lock_slot(&self, worker: usize) -> Result<MutexGuard<'_, MoveSlot>, PackingError> {
        let slot = self.move_slots.get(worker).ok_or(PackingError::WorkerOutOfRange {
            worker,
            workers: self.move_slots.len(),
        })?;
        Ok(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copies particle `idx` into the worker's slot, discarding whatever the worker had pending.
    fn prepare_trial(
        &self,
        worker: usize,
        idx: usize,
        interaction: &dyn Interaction,
    ) -> Result<MutexGuard<'_, MoveSlot>, PackingError> {
        let mut slot = self.lock_slot(worker)?;
        self.check_particle_index(idx)?;
        self.check_range(interaction, idx)?;

        slot.pending = None;
        slot.shape.clone_from(&self.shapes[idx]);
        slot.centres.clear();
        slot.centres.extend_from_slice(self.particle_centres(idx));
        Ok(slot)
    }

    fn finish_trial(
        &self,
        slot: &mut MoveSlot,
        idx: usize,
        kind: MoveKind,
        interaction: &dyn Interaction,
        domain: Option<&ActiveDomain>,
    ) -> f64 {
        if domain.is_some_and(|domain| !domain.is_inside(slot.shape.position())) {
            return f64::INFINITY;
        }

        slot.update_absolute_centres(self.bc.as_ref());
        let (energy, overlap_delta) = self.trial_energy(slot.view(), idx, interaction);
        slot.overlap_delta = overlap_delta;
        slot.pending = Some(PendingMove {
            particle_idx: idx,
            kind,
        });
        energy
    }

    /// Cost of replacing particle `idx` by `trial`, with the overlap delta it would cause.
    fn trial_energy(&self, trial: ParticleView<'_>, idx: usize, interaction: &dyn Interaction) -> (f64, isize) {
        let committed = self.view(idx);
        let mut overlap_delta = 0;

        if interaction.has_hard_part() {
            if self.overlap_counting {
                let before = self.count_particle_overlaps(committed, idx, interaction, false);
                let after = self.count_particle_overlaps(trial, idx, interaction, false);
                overlap_delta = after as isize - before as isize;
                if overlap_delta > 0 {
                    return (f64::INFINITY, overlap_delta);
                } else if overlap_delta < 0 {
                    return (f64::NEG_INFINITY, overlap_delta);
                }
            } else if self.count_particle_overlaps(trial, idx, interaction, true) > 0 {
                return (f64::INFINITY, 0);
            }
        }

        if !interaction.has_soft_part() {
            return (0.0, overlap_delta);
        }
        let initial = self.particle_energy(committed, idx, interaction);
        let fin = self.particle_energy(trial, idx, interaction);
        (fin - initial, overlap_delta)
    }

    /// Evaluates translating particle `particle_idx` by `translation`.
    ///
    /// Returns `+∞` without evaluating anything if `domain` is given and the translated particle
    /// leaves it. Otherwise returns `±∞` for a hard-overlap change and the soft energy difference
    /// otherwise; see the module docs for the sign convention.
    ///
    /// # Errors
    ///
    /// Fails if `worker` or `particle_idx` is out of range or `interaction` reaches farther than
    /// the range the packing was set up for.
    pub fn try_translation(
        &self,
        worker: usize,
        particle_idx: usize,
        translation: &Vector3<f64>,
        interaction: &dyn Interaction,
        domain: Option<&ActiveDomain>,
    ) -> Result<f64, PackingError> {
        let mut slot = self.prepare_trial(worker, particle_idx, interaction)?;
        slot.shape.translate(translation, self.bc.as_ref());
        Ok(self.finish_trial(&mut slot, particle_idx, MoveKind::Translation, interaction, domain))
    }

    /// Evaluates rotating particle `particle_idx` by `rotation` about its own position.
    pub fn try_rotation(
        &self,
        worker: usize,
        particle_idx: usize,
        rotation: &Matrix3<f64>,
        interaction: &dyn Interaction,
    ) -> Result<f64, PackingError> {
        let mut slot = self.prepare_trial(worker, particle_idx, interaction)?;
        slot.shape.rotate(rotation);
        for centre in &mut slot.centres {
            *centre = rotation * *centre;
        }
        Ok(self.finish_trial(&mut slot, particle_idx, MoveKind::Rotation, interaction, None))
    }

    /// Evaluates translating and then rotating particle `particle_idx`.
    pub fn try_move(
        &self,
        worker: usize,
        particle_idx: usize,
        translation: &Vector3<f64>,
        rotation: &Matrix3<f64>,
        interaction: &dyn Interaction,
        domain: Option<&ActiveDomain>,
    ) -> Result<f64, PackingError> {
        let mut slot = self.prepare_trial(worker, particle_idx, interaction)?;
        slot.shape.translate(translation, self.bc.as_ref());
        slot.shape.rotate(rotation);
        for centre in &mut slot.centres {
            *centre = rotation * *centre;
        }
        Ok(self.finish_trial(&mut slot, particle_idx, MoveKind::Move, interaction, domain))
    }

    /// Evaluates replacing the orientation of `particle_idx` outright.
    fn try_orientation(
        &self,
        worker: usize,
        particle_idx: usize,
        orientation: Matrix3<f64>,
        interaction: &dyn Interaction,
    ) -> Result<f64, PackingError> {
        let mut slot = self.prepare_trial(worker, particle_idx, interaction)?;
        let local = interaction.interaction_centres(slot.shape.data());
        if local.len() != self.num_centres {
            return Err(PackingError::InconsistentCentres {
                index: particle_idx,
                expected: self.num_centres,
                actual: local.len(),
            });
        }
        slot.shape.set_orientation(orientation);
        slot.centres.clear();
        slot.centres.extend(local.iter().map(|centre| orientation * centre));
        Ok(self.finish_trial(&mut slot, particle_idx, MoveKind::Rotation, interaction, None))
    }

    pub fn accept_translation(&mut self, worker: usize) -> Result<(), PackingError> {
        self.accept_pending(worker, MoveKind::Translation)
    }

    pub fn accept_rotation(&mut self, worker: usize) -> Result<(), PackingError> {
        self.accept_pending(worker, MoveKind::Rotation)
    }

    pub fn accept_move(&mut self, worker: usize) -> Result<(), PackingError> {
        self.accept_pending(worker, MoveKind::Move)
    }

    /// Commits the trial `worker` has pending, which must be of the given `kind`.
    fn accept_pending(&mut self, worker: usize, kind: MoveKind) -> Result<(), PackingError> {
        let workers = self.move_slots.len();
        let slot = self
            .move_slots
            .get_mut(worker)
            .ok_or(PackingError::WorkerOutOfRange { worker, workers })?;
        let slot = slot_mut(slot);

        let pending = slot.pending.ok_or(PackingError::NoPendingMove { worker })?;
        if pending.kind != kind {
            return Err(PackingError::MoveKindMismatch {
                worker,
                pending: pending.kind,
                requested: kind,
            });
        }
        slot.pending = None;

        let idx = pending.particle_idx;
        let num_centres = self.num_centres;
        let centres = idx * num_centres..(idx + 1) * num_centres;

        if let Some(grid) = self.neighbour_grid.as_mut() {
            if num_centres == 0 {
                let old = *self.shapes[idx].position();
                let new = *slot.shape.position();
                grid.record_mutation(&old, worker);
                grid.record_mutation(&new, worker);
                grid.remove(idx, &old);
                grid.add(idx, &new);
            } else {
                for (centre, new) in centres.clone().zip(&slot.absolute_centres) {
                    let old = self.absolute_centres[centre];
                    grid.record_mutation(&old, worker);
                    grid.record_mutation(new, worker);
                    grid.remove(centre, &old);
                    grid.add(centre, new);
                }
            }
        }

        self.shapes[idx].clone_from(&slot.shape);
        self.centres[centres.clone()].copy_from_slice(&slot.centres);
        self.absolute_centres[centres].copy_from_slice(&slot.absolute_centres);
        if self.overlap_counting {
            self.num_overlaps = self.num_overlaps.saturating_add_signed(slot.overlap_delta);
        }
        Ok(())
    }

    /// Pulls every orientation back onto the rotation group.
    ///
    /// Returns the number of particles whose fix was rejected, which is always `0` for
    /// [`RenormalizationMode::AllowOverlaps`].
    pub fn renormalize_orientations(
        &mut self,
        interaction: &dyn Interaction,
        mode: RenormalizationMode,
    ) -> Result<usize, PackingError> {
        match mode {
            RenormalizationMode::AllowOverlaps => {
                for shape in &mut self.shapes {
                    let orientation = renormalize_orientation(shape.orientation());
                    shape.set_orientation(orientation);
                }
                self.setup_for_interaction(interaction)?;
                debug!(num_particles = self.size(), "Orientations renormalized.");
                Ok(0)
            }
            RenormalizationMode::RejectOnOverlap => {
                let mut rejected = 0;
                for idx in 0..self.size() {
                    let orientation = renormalize_orientation(self.shapes[idx].orientation());
                    let energy = self.try_orientation(0, idx, orientation, interaction)?;
                    if energy == f64::INFINITY {
                        rejected += 1;
                    } else {
                        self.accept_pending(0, MoveKind::Rotation)?;
                    }
                }
                if rejected > 0 {
                    warn!(rejected, "Orientation fixes rejected because of overlaps.");
                }
                Ok(rejected)
            }
        }
    }
}
