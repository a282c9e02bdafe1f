use super::load_packing;
use crate::cli::InspectArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use packmc::core::interactions::Interaction;
use packmc::engine::packing::Packing;
use tracing::info;

/// Plain-text report of a packing's bookkeeping.
pub fn report(packing: &Packing, interaction: &dyn Interaction) -> Vec<String> {
    let grid = match packing.neighbour_grid_cell_divisions() {
        Some([x, y, z]) => format!("{x} x {y} x {z} cells"),
        None => "disabled (pairwise scans)".to_string(),
    };
    vec![
        format!("particles:          {}", packing.size()),
        format!("box volume:         {:.6}", packing.volume()),
        format!("number density:     {:.6}", packing.number_density()),
        format!("interaction range:  {:.6}", packing.interaction_range()),
        format!("interaction centres: {}", packing.num_interaction_centres()),
        format!("neighbour grid:     {grid}"),
        format!("mean neighbours:    {:.3}", packing.average_number_of_neighbours()),
        format!("overlaps:           {}", packing.count_total_overlaps(interaction, false)),
        format!("energy:             {:.6}", packing.total_energy(interaction)),
        format!(
            "memory:             {} B shapes, {} B grid",
            packing.shapes_memory_usage(),
            packing.neighbour_grid_memory_usage()
        ),
    ]
}

pub fn run(args: InspectArgs, threads: Option<usize>) -> Result<()> {
    let config = PartialRunConfig::from_file(&args.config)?.into_run_config(threads)?;
    let model = config.interaction.build();
    let packing = load_packing(&config, model.as_ref(), args.input.as_deref())?;
    info!("Packing built, collecting report.");

    for line in report(&packing, model.interaction()) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InteractionConfig, MonteCarloConfig, RunConfig};
    use crate::simulation::build_packing;
    use packmc::engine::config::PackingConfig;

    fn config(side: f64, count: usize) -> RunConfig {
        RunConfig {
            box_sides: [side; 3],
            particle_count: count,
            interaction: InteractionConfig::HardSphere { radius: 0.5, centres: vec![] },
            packing: PackingConfig::default(),
            monte_carlo: MonteCarloConfig {
                cycles: 0,
                seed: 0,
                temperature: 1.0,
                pressure: None,
                translation_step: 0.1,
                rotation_step: 0.1,
                volume_step: 0.01,
                renormalization_interval: 1,
            },
        }
    }

    #[test]
    fn report_lists_grid_and_overlaps() {
        let config = config(8.0, 8);
        let model = config.interaction.build();
        let packing = build_packing(&config, model.as_ref()).unwrap();

        let report = report(&packing, model.interaction());
        assert!(report.iter().any(|line| line.contains("8 x 8 x 8 cells")));
        assert!(report.iter().any(|line| line.starts_with("overlaps:") && line.ends_with(" 0")));
    }

    #[test]
    fn crowded_lattice_reports_overlaps() {
        // Eight spheres of diameter 1 on a lattice with spacing 0.9.
        let config = config(1.8, 8);
        let model = config.interaction.build();
        let packing = build_packing(&config, model.as_ref()).unwrap();

        let report = report(&packing, model.interaction());
        assert!(report.iter().any(|line| line.contains("disabled")));
        assert!(report.iter().any(|line| line.starts_with("overlaps:") && line.ends_with(" 12")));
    }
}
