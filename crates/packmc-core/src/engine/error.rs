use thiserror::Error;

use super::packing::MoveKind;

#[derive(Debug, Error)]
pub enum PackingError {
    #[error("A packing needs at least one shape")]
    EmptyShapes,

    #[error("Simulation box has zero or non-finite volume")]
    DegenerateBox,

    #[error("Interaction range must be positive, got {0}")]
    NonPositiveRange(f64),

    #[error("Shape {index} lies outside the simulation box")]
    ShapeOutsideBox { index: usize },

    #[error("Shape {index} carries {actual} bytes of data, the interaction expects {expected}")]
    ShapeDataSize {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Shape {index} has {actual} interaction centres, expected {expected}")]
    InconsistentCentres {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Particle index {index} out of range for a packing of {size} particles")]
    ParticleIndexOutOfRange { index: usize, size: usize },

    #[error("Move worker {worker} out of range, the packing has {workers} workers")]
    WorkerOutOfRange { worker: usize, workers: usize },

    #[error("Interaction range {requested} exceeds the range {supported} the packing was set up for")]
    RangeExceeded { requested: f64, supported: f64 },

    #[error("Worker {worker} has no pending move to accept")]
    NoPendingMove { worker: usize },

    #[error("Worker {worker} tried a {pending:?} but accepted a {requested:?}")]
    MoveKindMismatch {
        worker: usize,
        pending: MoveKind,
        requested: MoveKind,
    },

    #[error("No scaling is pending")]
    NoPendingScaling,

    #[error("Overlap counting is disabled")]
    OverlapCountingDisabled,

    #[error("Wall axis must be 0, 1 or 2, got {0}")]
    InvalidWallAxis(usize),

    #[error("Invalid shape data for shape {index}: {message}")]
    ShapeData { index: usize, message: String },

    #[error("Failed to start worker threads: {0}")]
    ThreadPool(String),
}
