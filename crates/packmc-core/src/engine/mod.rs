//! # Engine Module
//!
//! The stateful half of the library: the [`Packing`](packing::Packing) container and the
//! machinery it needs to answer trial moves quickly.
//!
//! ## Architecture
//!
//! - **Packing** ([`packing`]) - Shapes, box, cached overlap count and the trial/accept/revert
//!   protocol for single-particle moves and box scaling
//! - **Neighbour Grid** ([`neighbour_grid`]) - Cell list over relative coordinates used to
//!   restrict pair scans to nearby particles
//! - **Active Domains** ([`active_domain`]) - Box regions confining a move worker
//! - **Configuration** ([`config`]) - Thread counts and overlap bookkeeping options
//! - **Error Handling** ([`error`]) - Errors raised by packing operations
//!
//! The Monte Carlo driver itself (acceptance rules, step sizes, temperature schedules) is left to
//! the caller; the engine only reports energies and overlap changes.

pub mod active_domain;
pub mod config;
pub mod error;
pub mod neighbour_grid;
pub mod packing;
