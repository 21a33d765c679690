//! Configuration models and loaders for worlds, transfer scenarios and solver settings.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

fn default_gravitational_constant() -> f64 {
    9.8
}

/// A fixed gravitating body.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BodyConfig {
    pub name: String,
    pub position: [f64; 2],
    pub mass: f64,
}

/// The two-body world the rocket flies in.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WorldConfig {
    #[serde(default = "default_gravitational_constant")]
    pub gravitational_constant: f64,
    pub origin: BodyConfig,
    pub destination: BodyConfig,
}

/// What a scenario is expected to produce when solved.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioExpectation {
    #[default]
    Feasible,
    Infeasible,
}

/// Transfer scenario parsed from scenario catalogs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub initial_state: [f64; 4],
    pub minimum_time: f64,
    pub maximum_time: f64,
    #[serde(default)]
    pub expect: ScenarioExpectation,
    #[serde(default)]
    pub options: TransferOptionsConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollocationConfig {
    Trapezoidal,
    HermiteSimpson,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DirectionConfig {
    CounterClockwise,
    Clockwise,
}

/// Whether the fuel budget constrains the solve or is only reported.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuelModeConfig {
    Constraint,
    Report,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverConfig {
    Auto,
    Dense,
    Skyline,
}

/// Optional overrides of the transcription options. Missing fields keep their defaults.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TransferOptionsConfig {
    pub knots: Option<usize>,
    pub collocation: Option<CollocationConfig>,
    pub orbit_radius: Option<f64>,
    pub direction: Option<DirectionConfig>,
    pub fuel_mode: Option<FuelModeConfig>,
    pub fuel_budget: Option<f64>,
    pub fuel_coefficient: Option<f64>,
    pub time_weight: Option<f64>,
    pub min_clearance: Option<f64>,
    pub max_distance: Option<f64>,
    pub max_thrust: Option<f64>,
    pub solver: Option<SolverSettingsConfig>,
}

/// Optional overrides of the solver budgets and tolerances.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SolverSettingsConfig {
    pub max_outer_iterations: Option<usize>,
    pub max_inner_iterations: Option<usize>,
    pub max_total_iterations: Option<usize>,
    pub time_limit_seconds: Option<f64>,
    pub feasibility_tolerance: Option<f64>,
    pub optimality_tolerance: Option<f64>,
    pub max_penalty: Option<f64>,
    pub linear_solver: Option<LinearSolverConfig>,
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("scenario '{0}' not found in catalog")]
    ScenarioNotFound(String),
}

/// Load a world definition from a YAML or TOML file.
pub fn load_world<P: AsRef<Path>>(path: P) -> Result<WorldConfig, ConfigError> {
    let path = path.as_ref();
    if is_toml(path) {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

/// Load scenarios from a YAML list, a single TOML file or a directory of TOML files.
pub fn load_scenarios<P: AsRef<Path>>(path: P) -> Result<Vec<ScenarioConfig>, ConfigError> {
    load_records(path)
}

/// Case-insensitive lookup by scenario name.
pub fn find_scenario<'a>(
    scenarios: &'a [ScenarioConfig],
    name: &str,
) -> Result<&'a ScenarioConfig, ConfigError> {
    scenarios
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::ScenarioNotFound(name.to_string()))
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

fn load_records<T, P>(path: P) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.is_dir() {
        read_dir_records(path)
    } else if is_toml(path) {
        let contents = std::fs::read_to_string(path)?;
        let record: T = toml::from_str(&contents)?;
        Ok(vec![record])
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

fn read_dir_records<T>(dir: &Path) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut records = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_toml(path))
        .collect();
    entries.sort();
    for path in entries {
        let contents = std::fs::read_to_string(&path)?;
        let record: T = toml::from_str(&contents)?;
        records.push(record);
    }
    Ok(records)
}
