//! # PackMC Core Library
//!
//! A Monte Carlo packing engine for hard and soft anisotropic particles in triclinic periodic
//! boxes.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers with a one-way dependency between them.
//!
//! - **[`core`]: The Foundation.** Stateless pieces: the triclinic box and periodic boundary
//!   conditions, particles with opaque payloads, the XenoCollide convex collision kernel and the
//!   [`Interaction`](core::interactions::Interaction) trait with its hard and soft
//!   implementations.
//!
//! - **[`engine`]: The Logic Core.** The [`Packing`](engine::packing::Packing) container that owns
//!   a configuration of particles together with a neighbour grid, evaluates trial moves from
//!   several workers concurrently, keeps an exact overlap count and rescales the whole system.
//!
//! A driver proposes moves, asks the packing for their cost and accepts or drops them:
//!
//! ```no_run
//! use nalgebra::Vector3;
//! use packmc::core::boundary::PeriodicBoundaryConditions;
//! use packmc::core::interactions::hard_sphere::HardSphere;
//! use packmc::core::models::shape::Shape;
//! use packmc::core::models::triclinic_box::TriclinicBox;
//! use packmc::engine::config::PackingConfigBuilder;
//! use packmc::engine::packing::Packing;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spheres = HardSphere::new(0.5);
//! let shapes = vec![Shape::new(Vector3::new(1.0, 1.0, 1.0)), Shape::new(Vector3::new(3.0, 1.0, 1.0))];
//! let config = PackingConfigBuilder::new().move_threads(1).build()?;
//! let mut packing = Packing::new(
//!     TriclinicBox::cubic(5.0),
//!     shapes,
//!     Box::new(PeriodicBoundaryConditions::default()),
//!     &spheres,
//!     &config,
//! )?;
//!
//! let cost = packing.try_translation(0, 1, &Vector3::new(-0.5, 0.0, 0.0), &spheres, None)?;
//! if cost.is_finite() {
//!     packing.accept_translation(0)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod engine;
