use super::{Interaction, InteractionSite};
use crate::core::boundary::BoundaryConditions;
use crate::core::models::shape_data::ShapeData;
use nalgebra::Vector3;

/// Combines a main interaction with a helper one.
///
/// The main interaction sees the particles' own payloads, while the helper is always evaluated with
/// the fixed `helper_data`. Both must place their interaction centres identically.
pub struct CompoundInteraction<'a> {
    main: &'a dyn Interaction,
    helper: &'a dyn Interaction,
    helper_data: ShapeData,
    helper_range_radius: f64,
    helper_total_range_radius: f64,
    helper_centres: Vec<Vector3<f64>>,
    convex: bool,
}

impl<'a> CompoundInteraction<'a> {
    pub fn new(main: &'a dyn Interaction, helper: &'a dyn Interaction, helper_data: ShapeData) -> Self {
        // Two hard parts can each be convex while their union is not.
        let convex = match (main.has_hard_part(), helper.has_hard_part()) {
            (true, true) => false,
            (true, false) => main.is_convex(),
            (false, true) => helper.is_convex(),
            (false, false) => false,
        };

        Self {
            main,
            helper,
            helper_range_radius: helper.range_radius(&helper_data),
            helper_total_range_radius: helper.total_range_radius(&helper_data),
            helper_centres: helper.interaction_centres(&helper_data),
            helper_data,
            convex,
        }
    }

    fn helper_site<'s>(&'s self, site: InteractionSite<'s>) -> InteractionSite<'s> {
        InteractionSite {
            data: &self.helper_data,
            ..site
        }
    }
}

impl Interaction for CompoundInteraction<'_> {
    fn has_hard_part(&self) -> bool {
        self.main.has_hard_part() || self.helper.has_hard_part()
    }

    fn has_soft_part(&self) -> bool {
        self.main.has_soft_part() || self.helper.has_soft_part()
    }

    fn has_wall_part(&self) -> bool {
        self.main.has_wall_part() || self.helper.has_wall_part()
    }

    fn is_convex(&self) -> bool {
        self.convex
    }

    fn range_radius(&self, data: &ShapeData) -> f64 {
        self.main.range_radius(data).max(self.helper_range_radius)
    }

    fn total_range_radius(&self, data: &ShapeData) -> f64 {
        self.main.total_range_radius(data).max(self.helper_total_range_radius)
    }

    fn interaction_centres(&self, data: &ShapeData) -> Vec<Vector3<f64>> {
        let centres = self.main.interaction_centres(data);
        debug_assert!(
            centres == self.helper_centres,
            "main and helper interactions place their centres differently"
        );
        centres
    }

    fn shape_data_size(&self) -> usize {
        self.main.shape_data_size()
    }

    fn calculate_energy_between(
        &self,
        first: InteractionSite<'_>,
        second: InteractionSite<'_>,
        bc: &dyn BoundaryConditions,
    ) -> f64 {
        let mut energy = 0.0;
        if self.main.has_soft_part() {
            energy += self.main.calculate_energy_between(first, second, bc);
        }
        if self.helper.has_soft_part() {
            energy += self
                .helper
                .calculate_energy_between(self.helper_site(first), self.helper_site(second), bc);
        }
        energy
    }

    fn overlap_between(&self, first: InteractionSite<'_>, second: InteractionSite<'_>, bc: &dyn BoundaryConditions) -> bool {
        (self.main.has_hard_part() && self.main.overlap_between(first, second, bc))
            || (self.helper.has_hard_part()
                && self
                    .helper
                    .overlap_between(self.helper_site(first), self.helper_site(second), bc))
    }

    fn overlap_with_wall(&self, site: InteractionSite<'_>, wall_origin: &Vector3<f64>, wall_normal: &Vector3<f64>) -> bool {
        (self.main.has_wall_part() && self.main.overlap_with_wall(site, wall_origin, wall_normal))
            || (self.helper.has_wall_part()
                && self
                    .helper
                    .overlap_with_wall(self.helper_site(site), wall_origin, wall_normal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::boundary::PeriodicBoundaryConditions;
    use crate::core::interactions::central::{CentralInteraction, SquareWell};
    use crate::core::interactions::hard_sphere::HardSphere;
    use crate::core::models::shape::Shape;
    use crate::core::models::triclinic_box::TriclinicBox;

    #[test]
    fn hard_core_with_soft_shell() {
        let core = HardSphere::new(0.5);
        let shell = CentralInteraction::new(SquareWell::new(-1.0, 1.5));
        let compound = CompoundInteraction::new(&core, &shell, ShapeData::empty());
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));

        let a = Shape::new(Vector3::new(1.0, 1.0, 1.0));
        let b = Shape::new(Vector3::new(2.2, 1.0, 1.0));
        let c = Shape::new(Vector3::new(1.8, 1.0, 1.0));

        assert!(compound.has_hard_part() && compound.has_soft_part());
        assert!(compound.is_convex());
        assert_eq!(compound.range_radius(&ShapeData::empty()), 1.5);
        assert_eq!(compound.energy_between_shapes(&a, &b, &bc), -1.0);
        assert!(!compound.overlap_between_shapes(&a, &b, &bc));
        assert!(compound.overlap_between_shapes(&a, &c, &bc));
    }

    #[test]
    fn helper_sees_fixed_payload() {
        let main = HardSphere::new(0.1);
        let helper = HardSphere::polydisperse(vec![0.1, 1.0]);
        let compound = CompoundInteraction::new(&main, &helper, HardSphere::species_data(1));
        let bc = PeriodicBoundaryConditions::new(TriclinicBox::cubic(10.0));

        let a = Shape::new(Vector3::new(1.0, 1.0, 1.0));
        let b = Shape::new(Vector3::new(2.5, 1.0, 1.0));
        assert!(compound.overlap_between_shapes(&a, &b, &bc));
        assert!(!compound.is_convex());
        assert_eq!(compound.range_radius(&ShapeData::empty()), 2.0);
    }
}
