use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Parallelism and bookkeeping options of a [`Packing`](super::packing::Packing).
///
/// A thread count of `0` means "all available cores".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackingConfig {
    pub move_threads: usize,
    #[serde(default = "default_scaling_threads")]
    pub scaling_threads: usize,
    #[serde(default)]
    pub overlap_counting: bool,
    #[serde(default)]
    pub walls: [bool; 3],
}

fn default_scaling_threads() -> usize {
    1
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            move_threads: 1,
            scaling_threads: default_scaling_threads(),
            overlap_counting: false,
            walls: [false; 3],
        }
    }
}

impl PackingConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolves `0` to the number of available cores.
    pub fn effective_move_threads(&self) -> usize {
        resolve_thread_count(self.move_threads)
    }

    pub fn effective_scaling_threads(&self) -> usize {
        resolve_thread_count(self.scaling_threads)
    }
}

fn resolve_thread_count(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Default)]
pub struct PackingConfigBuilder {
    move_threads: Option<usize>,
    scaling_threads: Option<usize>,
    overlap_counting: Option<bool>,
    walls: Option<[bool; 3]>,
}

impl PackingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_threads(mut self, threads: usize) -> Self {
        self.move_threads = Some(threads);
        self
    }
    pub fn scaling_threads(mut self, threads: usize) -> Self {
        self.scaling_threads = Some(threads);
        self
    }
    pub fn overlap_counting(mut self, enabled: bool) -> Self {
        self.overlap_counting = Some(enabled);
        self
    }
    pub fn walls(mut self, walls: [bool; 3]) -> Self {
        self.walls = Some(walls);
        self
    }

    pub fn build(self) -> Result<PackingConfig, ConfigError> {
        Ok(PackingConfig {
            move_threads: self
                .move_threads
                .ok_or(ConfigError::MissingParameter("move_threads"))?,
            scaling_threads: self.scaling_threads.unwrap_or_else(default_scaling_threads),
            overlap_counting: self.overlap_counting.unwrap_or(false),
            walls: self.walls.unwrap_or([false; 3]),
        })
    }
}
