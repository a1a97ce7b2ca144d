use bevy_ecs::resource::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Process-wide simulation parameters.
///
/// Constructed once (defaults, or from a settings CSV) and threaded explicitly
/// into the ecosystem as an immutable resource. There is no ambient mutable
/// settings state; systems read a cloned snapshot.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Least number of km an agent traverses per time step.
    pub min_move_speed: f64,
    /// Most number of km an agent traverses per time step.
    pub max_move_speed: f64,
    /// Attraction multiplier for camp destinations.
    pub camp_weight: f64,
    /// Reduction factor on the departure roll inside conflict zones.
    pub conflict_weight: f64,
    /// Destination-evaluation horizon: -1 uniform, 0 road, 1 location,
    /// 2 neighbours, 3 region.
    pub awareness_level: i8,
    /// Capacity headroom multiplier before a destination is penalized.
    pub capacity_buffer: f64,
    /// Decrement the entry location's background population on `add_agent`.
    pub take_refugees_from_population: bool,
    /// Keep agents active at camps (camp arrival is never terminal).
    pub use_idp_mode: bool,
    /// Set to 1 for per-agent departure/arrival debug logging.
    pub agent_log_level: u8,
    /// Set to 1 for camp arrival debug logging.
    pub camp_log_level: u8,
    /// Set to 1 for location/link construction logging.
    pub init_log_level: u8,
    /// Master RNG seed; fixed seed + fixed inputs gives identical runs.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_move_speed: 200.0,
            max_move_speed: 200.0,
            camp_weight: 2.0,
            conflict_weight: 0.25,
            awareness_level: 1,
            capacity_buffer: 1.0,
            take_refugees_from_population: true,
            use_idp_mode: false,
            agent_log_level: 0,
            camp_log_level: 0,
            init_log_level: 0,
            seed: 42,
        }
    }
}

impl EngineConfig {
    /// Parse settings from `key,value` CSV rows.
    ///
    /// Rows starting with `#` are comments. `NumberOfSteps` is a run-length
    /// directive for the caller, not an engine parameter, so it is returned
    /// separately. An unrecognized key is a fatal configuration error.
    pub fn from_csv_str(input: &str) -> Result<(Self, Option<u32>), ConfigError> {
        let mut config = Self::default();
        let mut number_of_steps = None;

        for (i, raw) in input.lines().enumerate() {
            let line = i + 1;
            let row = raw.trim();
            if row.is_empty() || row.starts_with('#') {
                continue;
            }
            let (key, value) = row.split_once(',').ok_or(ConfigError::MalformedRow {
                line,
                row: row.to_string(),
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "AgentLogLevel" => config.agent_log_level = parse(key, value)?,
                "CampLogLevel" => config.camp_log_level = parse(key, value)?,
                "InitLogLevel" => config.init_log_level = parse(key, value)?,
                "MinMoveSpeed" => config.min_move_speed = parse(key, value)?,
                "MaxMoveSpeed" => config.max_move_speed = parse(key, value)?,
                "NumberOfSteps" => number_of_steps = Some(parse(key, value)?),
                "CampWeight" => config.camp_weight = parse(key, value)?,
                "ConflictWeight" => config.conflict_weight = parse(key, value)?,
                "AwarenessLevel" => config.awareness_level = parse(key, value)?,
                "CapacityBuffer" => config.capacity_buffer = parse(key, value)?,
                "TakeRefugeesFromPopulation" => {
                    config.take_refugees_from_population = parse_bool(key, value)?;
                }
                "UseIDPMode" => config.use_idp_mode = parse_bool(key, value)?,
                "Seed" => config.seed = parse(key, value)?,
                _ => {
                    return Err(ConfigError::UnrecognizedKey {
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok((config, number_of_steps))
    }

    /// Read settings from a CSV file on disk.
    pub fn from_csv_path(path: &std::path::Path) -> Result<(Self, Option<u32>), ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_csv_str(&contents)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "True" | "true" | "1" => Ok(true),
        "False" | "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
