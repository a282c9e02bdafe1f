use super::Packing;
use crate::core::interactions::Interaction;
use crate::core::models::shape::Shape;
use crate::core::models::shape_data::{ShapeDataManager, TextualShapeData};
use crate::core::models::triclinic_box::TriclinicBox;
use crate::engine::error::PackingError;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// One particle in its portable, textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShapeRecord {
    pub position: Vector3<f64>,
    pub orientation: Matrix3<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: TextualShapeData,
}

/// A serializable picture of a packing: the box, free-form metadata and every shape.
///
/// Payloads are stored through a [`ShapeDataManager`], so a snapshot only makes sense together
/// with the interaction that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackingSnapshot {
    pub simulation_box: TriclinicBox,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux_info: BTreeMap<String, String>,
    pub shapes: Vec<ShapeRecord>,
}

impl Packing {
    /// Captures the current shapes and box.
    ///
    /// # Errors
    ///
    /// Returns [`PackingError::ShapeData`] if `manager` rejects a payload.
    pub fn snapshot(
        &self,
        manager: &dyn ShapeDataManager,
        aux_info: BTreeMap<String, String>,
    ) -> Result<PackingSnapshot, PackingError> {
        let shapes = self
            .shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| {
                let data = manager
                    .serialize_shape_data(shape.data())
                    .map_err(|e| PackingError::ShapeData {
                        index,
                        message: e.to_string(),
                    })?;
                Ok(ShapeRecord {
                    position: *shape.position(),
                    orientation: *shape.orientation(),
                    data,
                })
            })
            .collect::<Result<Vec<_>, PackingError>>()?;

        Ok(PackingSnapshot {
            simulation_box: self.simulation_box,
            aux_info,
            shapes,
        })
    }

    /// Replaces the packing's contents with `snapshot`, as [`reset`](Self::reset) would.
    pub fn restore(
        &mut self,
        snapshot: &PackingSnapshot,
        interaction: &dyn Interaction,
        manager: &dyn ShapeDataManager,
    ) -> Result<(), PackingError> {
        let shapes = snapshot
            .shapes
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let data = manager
                    .deserialize_shape_data(&record.data)
                    .map_err(|e| PackingError::ShapeData {
                        index,
                        message: e.to_string(),
                    })?;
                Ok(Shape::with_data(record.position, record.orientation, data))
            })
            .collect::<Result<Vec<_>, PackingError>>()?;

        self.reset(shapes, snapshot.simulation_box, interaction)?;
        info!(num_particles = self.size(), "Packing restored from snapshot.");
        Ok(())
    }
}
