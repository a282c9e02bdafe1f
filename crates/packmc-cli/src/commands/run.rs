use super::{load_packing, write_snapshot};
use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::error::Result;
use crate::simulation::Simulation;
use crate::utils::progress::CycleProgress;
use std::collections::BTreeMap;
use tracing::info;

const STATUS_INTERVAL: usize = 10;

pub fn run(args: RunArgs, threads: Option<usize>, quiet: bool) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, threads)?;

    let model = config.interaction.build();
    let packing = load_packing(&config, model.as_ref(), args.input.as_deref())?;
    let cycles = config.monte_carlo.cycles;
    let counting = packing.is_overlap_counting_enabled();

    println!(
        "Starting Monte Carlo run: {} particles, {} cycles, density {:.4}",
        packing.size(),
        cycles,
        packing.number_density()
    );

    let progress = CycleProgress::new(cycles as u64, quiet);
    let mut simulation = Simulation::new(
        packing,
        model.as_ref(),
        config.monte_carlo.clone(),
        config.interaction.is_anisotropic(),
    );
    simulation.run(cycles, |sim| {
        let done = sim.cycles_done();
        if done % STATUS_INTERVAL == 0 || done == cycles {
            let status = match sim.packing().cached_number_of_overlaps() {
                Ok(overlaps) if counting => format!("{} ov {}", sim.statistics(), overlaps),
                _ => sim.statistics().to_string(),
            };
            progress.advance(done as u64, status);
        }
    })?;
    progress.finish();

    let stats = *simulation.statistics();
    let packing = simulation.into_packing();
    let interaction = model.interaction();

    println!("Acceptance ratios:");
    println!("  translations: {:.4}", stats.translations.rate());
    if stats.rotations.attempted > 0 {
        println!("  rotations:    {:.4}", stats.rotations.rate());
    }
    if stats.scalings.attempted > 0 {
        println!("  volume moves: {:.4}", stats.scalings.rate());
    }
    if stats.rejected_renormalizations > 0 {
        println!("  rejected orientation fixes: {}", stats.rejected_renormalizations);
    }
    println!("Final state:");
    println!("  overlaps:       {}", packing.count_total_overlaps(interaction, false));
    println!("  energy:         {:.6}", packing.total_energy(interaction));
    println!("  number density: {:.6}", packing.number_density());
    println!(
        "  neighbour grid: {} rebuilds in {:.3}s",
        packing.neighbour_grid_rebuilds(),
        packing.neighbour_grid_rebuild_time().as_secs_f64()
    );

    if let Some(output) = &args.output {
        let aux_info = BTreeMap::from([
            ("cycles".to_string(), cycles.to_string()),
            ("seed".to_string(), config.monte_carlo.seed.to_string()),
            ("temperature".to_string(), config.monte_carlo.temperature.to_string()),
        ]);
        let snapshot = packing.snapshot(model.shape_data_manager(), aux_info)?;
        write_snapshot(output, &snapshot)?;
        info!("Final packing written to {:?}", output);
        println!("✓ Final packing written to: {}", output.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::read_snapshot;
    use clap::Parser;
    use serial_test::serial;
    use std::fs;

    const CONFIG: &str = r#"
        [box]
        side = 6.0

        [particles]
        count = 27
        interaction = { type = "hard-sphere", radius = 0.5 }

        [packing]
        move-threads = 1
        overlap-counting = true

        [monte-carlo]
        cycles = 5
        seed = 11
    "#;

    fn run_args(args: &[&str]) -> RunArgs {
        let mut full = vec!["packmc", "run"];
        full.extend_from_slice(args);
        match Cli::parse_from(full).command {
            Commands::Run(run_args) => run_args,
            _ => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    #[serial]
    fn run_writes_a_restorable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("run.toml");
        let first_output = dir.path().join("first.toml");
        let second_output = dir.path().join("second.toml");
        fs::write(&config_path, CONFIG).unwrap();

        let args = run_args(&["-c", config_path.to_str().unwrap(), "-o", first_output.to_str().unwrap()]);
        run(args, Some(1), true).unwrap();

        let first = read_snapshot(&first_output).unwrap();
        assert_eq!(first.shapes.len(), 27);
        assert_eq!(first.aux_info.get("cycles").map(String::as_str), Some("5"));
        assert_eq!(first.aux_info.get("seed").map(String::as_str), Some("11"));

        let args = run_args(&[
            "-c",
            config_path.to_str().unwrap(),
            "-i",
            first_output.to_str().unwrap(),
            "-o",
            second_output.to_str().unwrap(),
            "--cycles",
            "0",
        ]);
        run(args, None, true).unwrap();

        let second = read_snapshot(&second_output).unwrap();
        assert_eq!(second.shapes, first.shapes);
        assert_eq!(second.simulation_box, first.simulation_box);
        assert_eq!(second.aux_info.get("cycles").map(String::as_str), Some("0"));
    }

    #[test]
    #[serial]
    fn missing_config_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let args = run_args(&["-c", missing.to_str().unwrap()]);
        assert!(matches!(run(args, None, true), Err(crate::error::CliError::Io(_))));
    }
}
