pub mod inspect;
pub mod run;

use crate::config::{PackingModel, RunConfig};
use crate::error::{CliError, Result};
use crate::simulation;
use packmc::engine::packing::{Packing, PackingSnapshot};
use std::path::Path;
use tracing::info;

/// Builds the configured lattice, or restores the packing stored at `input`.
fn load_packing(config: &RunConfig, model: &dyn PackingModel, input: Option<&Path>) -> Result<Packing> {
    let mut packing = simulation::build_packing(config, model)?;
    if let Some(path) = input {
        info!("Restoring packing from {:?}", path);
        let snapshot = read_snapshot(path)?;
        packing.restore(&snapshot, model.interaction(), model.shape_data_manager())?;
    }
    Ok(packing)
}

fn read_snapshot(path: &Path) -> Result<PackingSnapshot> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn write_snapshot(path: &Path, snapshot: &PackingSnapshot) -> Result<()> {
    let content = toml::to_string(snapshot)?;
    std::fs::write(path, content)?;
    Ok(())
}
