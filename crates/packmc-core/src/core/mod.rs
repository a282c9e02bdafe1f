//! # Core Module
//!
//! Stateless building blocks of the packing engine: geometry, the data model of a packing,
//! boundary conditions and the interactions between particles.
//!
//! ## Architecture
//!
//! - **Geometry** ([`geometry`]) - Orientation helpers and the convex collision kernel
//! - **Data Model** ([`models`]) - Triclinic box, particles and their opaque payloads
//! - **Periodicity** ([`boundary`]) - Mapping positions onto periodic images
//! - **Interactions** ([`interactions`]) - Hard and soft pair terms consumed by the packing
//!
//! Nothing in this module owns mutable simulation state; that lives in
//! [`engine`](crate::engine).

pub mod boundary;
pub mod geometry;
pub mod interactions;
pub mod models;
