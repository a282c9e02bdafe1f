//! # Core Models Module
//!
//! Plain data describing a packing: the periodic [`triclinic_box::TriclinicBox`], the particles
//! ([`shape::Shape`]) and their opaque per-particle payload ([`shape_data::ShapeData`]) together
//! with the [`shape_data::ShapeDataManager`] capability that validates and (de)serializes it.
//!
//! None of these types know about interactions or the neighbour grid; they are the state that the
//! [`Packing`](crate::engine::packing::Packing) container owns and mutates.

pub mod shape;
pub mod shape_data;
pub mod triclinic_box;
