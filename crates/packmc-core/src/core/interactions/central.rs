use super::{Interaction, InteractionSite};
use crate::core::boundary::BoundaryConditions;
use crate::core::models::shape_data::{ShapeData, ShapeDataError, ShapeDataManager, TextualShapeData};
use nalgebra::Vector3;

/// An isotropic pair potential depending only on the distance between two sites.
pub trait CentralPotential: Send + Sync {
    fn energy_for_distance(&self, distance: f64) -> f64;

    /// Distance beyond which the potential is exactly zero.
    fn cutoff(&self) -> f64;
}

/// Lennard-Jones potential `4ε[(σ/r)¹² - (σ/r)⁶]`, truncated at `cutoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    epsilon: f64,
    sigma: f64,
    cutoff: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64) -> Self {
        Self { epsilon, sigma, cutoff }
    }
}

impl CentralPotential for LennardJones {
    #[inline]
    fn energy_for_distance(&self, distance: f64) -> f64 {
        let x6 = (self.sigma / distance).powi(6);
        4.0 * self.epsilon * (x6 * x6 - x6)
    }

    fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

/// Square well: energy `epsilon` closer than `range`, zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareWell {
    epsilon: f64,
    range: f64,
}

impl SquareWell {
    pub fn new(epsilon: f64, range: f64) -> Self {
        Self { epsilon, range }
    }
}

impl CentralPotential for SquareWell {
    #[inline]
    fn energy_for_distance(&self, distance: f64) -> f64 {
        if distance < self.range { self.epsilon } else { 0.0 }
    }

    fn cutoff(&self) -> f64 {
        self.range
    }
}

/// A soft interaction built from a [`CentralPotential`], acting between particle positions or
/// between every pair of installed interaction centres.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralInteraction<P> {
    potential: P,
    centres: Vec<Vector3<f64>>,
}

impl<P: CentralPotential> CentralInteraction<P> {
    pub fn new(potential: P) -> Self {
        Self {
            potential,
            centres: Vec::new(),
        }
    }

    pub fn installed_on_centres(potential: P, centres: Vec<Vector3<f64>>) -> Self {
        Self { potential, centres }
    }

    pub fn potential(&self) -> &P {
        &self.potential
    }
}

impl<P: CentralPotential> Interaction for CentralInteraction<P> {
    fn has_hard_part(&self) -> bool {
        false
    }

    fn has_soft_part(&self) -> bool {
        true
    }

    fn range_radius(&self, _data: &ShapeData) -> f64 {
        self.potential.cutoff()
    }

    fn interaction_centres(&self, _data: &ShapeData) -> Vec<Vector3<f64>> {
        self.centres.clone()
    }

    fn calculate_energy_between(
        &self,
        first: InteractionSite<'_>,
        second: InteractionSite<'_>,
        bc: &dyn BoundaryConditions,
    ) -> f64 {
        let distance2 = bc.distance2(&first.position, &second.position);
        let cutoff = self.potential.cutoff();
        if distance2 >= cutoff * cutoff {
            return 0.0;
        }
        self.potential.energy_for_distance(distance2.sqrt())
    }
}

/// Central interactions carry no payload.
impl<P: CentralPotential> ShapeDataManager for CentralInteraction<P> {
    fn shape_data_size(&self) -> usize {
        0
    }

    fn serialize_shape_data(&self, data: &ShapeData) -> Result<TextualShapeData, ShapeDataError> {
        self.validate_shape_data(data)?;
        Ok(TextualShapeData::new())
    }

    fn deserialize_shape_data(&self, data: &TextualShapeData) -> Result<ShapeData, ShapeDataError> {
        match data.keys().next() {
            Some(name) => Err(ShapeDataError::Invalid(format!("unexpected parameter '{name}'"))),
            None => Ok(ShapeData::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::PeriodicBoundaryConditions;
    use crate::core::models::shape::Shape;
    use crate::core::models::triclinic_box::TriclinicBox;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn lennard_jones_minimum_is_minus_epsilon() {
        let lj = LennardJones::new(2.0, 1.0, 3.0);
        let r_min = 2.0f64.powf(1.0 / 6.0);
        assert!(f64_approx_equal(lj.energy_for_distance(r_min), -2.0));
        assert!(f64_approx_equal(lj.energy_for_distance(1.0), 0.0));
    }

    #[test]
    fn central_interaction_is_zero_beyond_cutoff() {
        let interaction = CentralInteraction::new(LennardJones::new(1.0, 1.0, 2.5));
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let near = Shape::new(Vector3::new(1.0, 1.0, 1.0));
        let far = Shape::new(Vector3::new(4.0, 1.0, 1.0));
        let image = Shape::new(Vector3::new(9.0, 1.0, 1.0));

        assert_eq!(interaction.energy_between_shapes(&near, &far, &bc), 0.0);
        assert!(f64_approx_equal(
            interaction.energy_between_shapes(&near, &image, &bc),
            LennardJones::new(1.0, 1.0, 2.5).energy_for_distance(2.0)
        ));
    }

    #[test]
    fn square_well_sums_over_centre_pairs() {
        let interaction = CentralInteraction::installed_on_centres(
            SquareWell::new(-1.0, 1.2),
            vec![Vector3::new(0.0, 0.0, -0.5), Vector3::new(0.0, 0.0, 0.5)],
        );
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));
        let first = Shape::new(Vector3::new(2.0, 2.0, 2.0));
        let second = Shape::new(Vector3::new(3.0, 2.0, 2.0));

        // Two parallel dimers one unit apart: only the two aligned centre pairs are in range.
        assert!(f64_approx_equal(interaction.energy_between_shapes(&first, &second, &bc), -2.0));
        assert!(!interaction.has_hard_part());
    }

    #[test]
    fn payload_free_shape_data() {
        let well = CentralInteraction::new(SquareWell::new(-1.0, 1.5));
        assert_eq!(well.serialize_shape_data(&ShapeData::empty()).unwrap(), TextualShapeData::new());
        assert!(matches!(
            well.serialize_shape_data(&ShapeData::from_u32(1)),
            Err(ShapeDataError::WrongSize { expected: 0, actual: 4 })
        ));

        let extra = TextualShapeData::from([("species".to_string(), "0".to_string())]);
        assert!(matches!(well.deserialize_shape_data(&extra), Err(ShapeDataError::Invalid(_))));
        assert_eq!(well.deserialize_shape_data(&TextualShapeData::new()).unwrap(), ShapeData::empty());
    }
}
