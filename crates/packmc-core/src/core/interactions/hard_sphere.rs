use super::{Interaction, InteractionSite};
use crate::core::boundary::BoundaryConditions;
use crate::core::models::shape_data::{ShapeData, ShapeDataError, ShapeDataManager, TextualShapeData};
use nalgebra::Vector3;

const SPECIES_KEY: &str = "species";

/// Hard spheres, either all of one radius or drawn from a list of species.
///
/// A polydisperse system stores the species index of every particle as a 4-byte little-endian
/// payload. Spheres may also be installed on several interaction centres, turning every particle
/// into a rigid cluster of touching-forbidden spheres.
#[derive(Debug, Clone, PartialEq)]
pub struct HardSphere {
    radii: Vec<f64>,
    polydisperse: bool,
    centres: Vec<Vector3<f64>>,
}

impl HardSphere {
    pub fn new(radius: f64) -> Self {
        Self {
            radii: vec![radius],
            polydisperse: false,
            centres: Vec::new(),
        }
    }

    pub fn polydisperse(radii: Vec<f64>) -> Self {
        Self {
            radii,
            polydisperse: true,
            centres: Vec::new(),
        }
    }

    pub fn installed_on_centres(mut self, centres: Vec<Vector3<f64>>) -> Self {
        self.centres = centres;
        self
    }

    pub fn species_data(species: u32) -> ShapeData {
        ShapeData::from_u32(species)
    }

    fn max_radius(&self) -> f64 {
        self.radii.iter().copied().fold(0.0, f64::max)
    }

    /// Radius of the sphere described by `data`; unknown species fall back to the largest radius.
    pub fn radius(&self, data: &ShapeData) -> f64 {
        if !self.polydisperse {
            return self.radii[0];
        }
        data.as_u32()
            .and_then(|species| self.radii.get(species as usize).copied())
            .unwrap_or_else(|| self.max_radius())
    }
}

impl Interaction for HardSphere {
    fn has_hard_part(&self) -> bool {
        true
    }

    fn has_soft_part(&self) -> bool {
        false
    }

    fn has_wall_part(&self) -> bool {
        true
    }

    fn is_convex(&self) -> bool {
        self.centres.is_empty()
    }

    fn range_radius(&self, _data: &ShapeData) -> f64 {
        2.0 * self.max_radius()
    }

    fn interaction_centres(&self, _data: &ShapeData) -> Vec<Vector3<f64>> {
        self.centres.clone()
    }

    fn shape_data_size(&self) -> usize {
        if self.polydisperse { 4 } else { 0 }
    }

    fn overlap_between(&self, first: InteractionSite<'_>, second: InteractionSite<'_>, bc: &dyn BoundaryConditions) -> bool {
        let contact = self.radius(first.data) + self.radius(second.data);
        bc.distance2(&first.position, &second.position) < contact * contact
    }

    fn overlap_with_wall(&self, site: InteractionSite<'_>, wall_origin: &Vector3<f64>, wall_normal: &Vector3<f64>) -> bool {
        (site.position - wall_origin).dot(wall_normal) < self.radius(site.data)
    }
}

impl ShapeDataManager for HardSphere {
    fn shape_data_size(&self) -> usize {
        Interaction::shape_data_size(self)
    }

    fn validate_shape_data(&self, data: &ShapeData) -> Result<(), ShapeDataError> {
        let expected = Interaction::shape_data_size(self);
        if data.len() != expected {
            return Err(ShapeDataError::WrongSize {
                expected,
                actual: data.len(),
            });
        }
        if let Some(species) = data.as_u32() {
            if species as usize >= self.radii.len() {
                return Err(ShapeDataError::Invalid(format!(
                    "species {species} out of range, {} species defined",
                    self.radii.len()
                )));
            }
        }
        Ok(())
    }

    fn serialize_shape_data(&self, data: &ShapeData) -> Result<TextualShapeData, ShapeDataError> {
        self.validate_shape_data(data)?;
        let mut textual = TextualShapeData::new();
        if let Some(species) = data.as_u32() {
            textual.insert(SPECIES_KEY.to_string(), species.to_string());
        }
        Ok(textual)
    }

    fn deserialize_shape_data(&self, data: &TextualShapeData) -> Result<ShapeData, ShapeDataError> {
        if !self.polydisperse {
            return Ok(ShapeData::empty());
        }
        let value = data
            .get(SPECIES_KEY)
            .ok_or_else(|| ShapeDataError::MissingParameter(SPECIES_KEY.to_string()))?;
        let species: u32 = value.parse().map_err(|_| ShapeDataError::InvalidValue {
            name: SPECIES_KEY.to_string(),
            value: value.clone(),
        })?;
        let shape_data = ShapeData::from_u32(species);
        self.validate_shape_data(&shape_data)?;
        Ok(shape_data)
    }
}
