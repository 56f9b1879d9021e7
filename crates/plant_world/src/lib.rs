//! Configuration loading and plant construction shared between plant_cli and
//! plant_daemon.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use plant_core::{
    initial_state, ActuatorFaultMode, DetectionConfig, FaultConfig, PlantConfig, PlantState,
    PumpDef, SensorDef, SensorFaultPolicy, SetpointDef, TankDef, TimingDef, ValveDef,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct TopologyFile {
    config_version: String,
    tanks: Vec<TankDef>,
    #[serde(default)]
    valves: Vec<ValveDef>,
    #[serde(default)]
    pumps: Vec<PumpDef>,
    #[serde(default)]
    sensors: Vec<SensorDef>,
}

#[derive(Deserialize)]
struct ControlFile {
    timing: TimingDef,
    #[serde(default)]
    setpoints: Vec<SetpointDef>,
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let text = std::fs::read_to_string(dir.join(name)).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {name}"))
}

/// Reads `topology.json`, `faults.json`, `detection.json` and `control.json`
/// from `config_dir`. The result is not yet validated.
pub fn load_config(config_dir: &str) -> Result<PlantConfig> {
    let dir = Path::new(config_dir);
    let topology: TopologyFile = read_json(dir, "topology.json")?;
    let faults: FaultConfig = read_json(dir, "faults.json")?;
    let detection: DetectionConfig = read_json(dir, "detection.json")?;
    let control: ControlFile = read_json(dir, "control.json")?;

    Ok(PlantConfig {
        config_version: topology.config_version,
        timing: control.timing,
        tanks: topology.tanks,
        valves: topology.valves,
        pumps: topology.pumps,
        sensors: topology.sensors,
        faults,
        detection,
        setpoints: control.setpoints,
    })
}

const VALID_KEYS: &[&str] = &[
    "tick_seconds",
    "tick_period_ms",
    "failure_rate_tank",
    "failure_rate_valve",
    "failure_rate_pump",
    "failure_rate_sensor",
    "sensor_policy",
    "actuator_mode",
    "tank_leak_rate",
    "consecutive_bad_readings",
    "trend_tolerance",
    "cross_check",
];

/// Applies scalar parameter overrides on top of a loaded configuration.
pub fn apply_overrides(
    config: &mut PlantConfig,
    overrides: &BTreeMap<String, serde_json::Value>,
) -> Result<()> {
    for (key, value) in overrides {
        match key.as_str() {
            "tick_seconds" => config.timing.tick_seconds = as_f64(key, value)?,
            "tick_period_ms" => config.timing.tick_period_ms = as_u64(key, value)?,
            "failure_rate_tank" => {
                config.faults.failure_rates.tank = as_f64(key, value)?;
            }
            "failure_rate_valve" => {
                config.faults.failure_rates.valve = as_f64(key, value)?;
            }
            "failure_rate_pump" => {
                config.faults.failure_rates.pump = as_f64(key, value)?;
            }
            "failure_rate_sensor" => {
                config.faults.failure_rates.sensor = as_f64(key, value)?;
            }
            "sensor_policy" => {
                config.faults.sensor_policy = as_enum::<SensorFaultPolicy>(key, value)?;
            }
            "actuator_mode" => {
                config.faults.actuator_mode = as_enum::<ActuatorFaultMode>(key, value)?;
            }
            "tank_leak_rate" => config.faults.tank_leak_rate = as_f64(key, value)?,
            "consecutive_bad_readings" => {
                config.detection.consecutive_bad_readings = as_u32(key, value)?;
            }
            "trend_tolerance" => config.detection.trend_tolerance = as_f64(key, value)?,
            "cross_check" => config.detection.cross_check = as_bool(key, value)?,
            _ => bail!(
                "unknown override key '{key}'. Valid keys: {}",
                VALID_KEYS.join(", ")
            ),
        }
    }
    Ok(())
}

/// Parses a CLI `key=value` pair. Values are read as JSON when possible so
/// numbers and booleans keep their type; anything else is taken as a string.
pub fn parse_override(raw: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("override '{raw}' is not of the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("override '{raw}' has an empty key");
    }
    let value = value.trim();
    let parsed = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

fn as_f64(key: &str, value: &serde_json::Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| anyhow::anyhow!("override '{key}': expected a number, got {value}"))
}

fn as_u64(key: &str, value: &serde_json::Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        anyhow::anyhow!("override '{key}': expected a positive integer, got {value}")
    })
}

fn as_u32(key: &str, value: &serde_json::Value) -> Result<u32> {
    let val = as_u64(key, value)?;
    u32::try_from(val)
        .map_err(|_| anyhow::anyhow!("override '{key}': value {val} exceeds u32 range"))
}

fn as_bool(key: &str, value: &serde_json::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow::anyhow!("override '{key}': expected true or false, got {value}"))
}

fn as_enum<T: DeserializeOwned>(key: &str, value: &serde_json::Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .with_context(|| format!("override '{key}': unsupported value {value}"))
}

/// Seed derived from the wall clock, for runs that did not ask for one.
pub fn time_seed() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or_else(|| now.timestamp().unsigned_abs())
}

pub fn make_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// A resumable run: plant state plus how far the fault injector has read
/// into its random stream. Reseeding alone would replay the same faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: PlantState,
    pub rng_word_pos: u128,
}

impl Checkpoint {
    pub fn capture(state: &PlantState, rng: &ChaCha8Rng) -> Self {
        Self {
            state: state.clone(),
            rng_word_pos: rng.get_word_pos(),
        }
    }

    /// State and an RNG positioned where the capture left off.
    pub fn resume(self) -> (PlantState, ChaCha8Rng) {
        let mut rng = make_rng(self.state.meta.seed);
        rng.set_word_pos(self.rng_word_pos);
        (self.state, rng)
    }
}

pub fn write_checkpoint(path: &Path, state: &PlantState, rng: &ChaCha8Rng) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating checkpoint: {}", path.display()))?;
    serde_json::to_writer_pretty(file, &Checkpoint::capture(state, rng))
        .with_context(|| format!("writing checkpoint: {}", path.display()))
}

pub fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading checkpoint: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing checkpoint: {}", path.display()))
}

/// Loads, overrides and validates the configuration, then builds tick-0
/// state. Fails before anything runs if the configuration is malformed.
pub fn load_plant(
    config_dir: &str,
    overrides: &BTreeMap<String, serde_json::Value>,
    seed: u64,
) -> Result<(PlantConfig, PlantState)> {
    let mut config = load_config(config_dir)?;
    apply_overrides(&mut config, overrides)?;
    let state = initial_state(&config, seed)
        .with_context(|| format!("invalid plant configuration in {config_dir}"))?;
    tracing::info!(
        config_version = %config.config_version,
        seed,
        tick_seconds = config.timing.tick_seconds,
        "plant configuration loaded"
    );
    Ok((config, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plant_core::test_fixtures::{base_state, single_tank_config};
    use rand::Rng;

    #[test]
    fn test_apply_f64_override() {
        let mut config = single_tank_config();
        let overrides = BTreeMap::from([(
            "failure_rate_valve".to_string(),
            serde_json::json!(0.25),
        )]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!((config.faults.failure_rates.valve - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_enum_and_bool_overrides() {
        let mut config = single_tank_config();
        let overrides = BTreeMap::from([
            ("sensor_policy".to_string(), serde_json::json!("freeze")),
            ("actuator_mode".to_string(), serde_json::json!("stuck_in_place")),
            ("cross_check".to_string(), serde_json::json!(false)),
            ("consecutive_bad_readings".to_string(), serde_json::json!(3)),
        ]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.faults.sensor_policy, SensorFaultPolicy::Freeze);
        assert_eq!(config.faults.actuator_mode, ActuatorFaultMode::StuckInPlace);
        assert!(!config.detection.cross_check);
        assert_eq!(config.detection.consecutive_bad_readings, 3);
    }

    #[test]
    fn test_unknown_key_errors() {
        let mut config = single_tank_config();
        let overrides = BTreeMap::from([("nonexistent_field".to_string(), serde_json::json!(1.0))]);
        let err = apply_overrides(&mut config, &overrides)
            .unwrap_err()
            .to_string();
        assert!(err.contains("unknown override key"));
        assert!(err.contains("nonexistent_field"));
        assert!(err.contains("tick_seconds"));
    }

    #[test]
    fn test_type_mismatch_errors() {
        let mut config = single_tank_config();
        let overrides = BTreeMap::from([(
            "tick_period_ms".to_string(),
            serde_json::json!("not_a_number"),
        )]);
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }

    #[test]
    fn test_parse_override_keeps_json_types() {
        assert_eq!(
            parse_override("trend_tolerance=0.5").unwrap(),
            ("trend_tolerance".to_string(), serde_json::json!(0.5))
        );
        assert_eq!(
            parse_override("cross_check = false").unwrap(),
            ("cross_check".to_string(), serde_json::json!(false))
        );
        assert_eq!(
            parse_override("sensor_policy=freeze").unwrap(),
            ("sensor_policy".to_string(), serde_json::json!("freeze"))
        );
        assert!(parse_override("no_equals_sign").is_err());
        assert!(parse_override("=3").is_err());
    }

    #[test]
    fn test_resumed_checkpoint_continues_the_fault_stream() {
        let config = single_tank_config();
        let mut state = base_state(&config);
        let mut rng = make_rng(state.meta.seed);
        for _ in 0..7 {
            plant_core::tick(&mut state, &[], &config, &mut rng);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        write_checkpoint(&path, &state, &rng).unwrap();
        let (resumed, mut resumed_rng) = read_checkpoint(&path).unwrap().resume();

        assert_eq!(resumed.meta.tick, 7);
        let expected: Vec<f64> = (0..4).map(|_| rng.gen()).collect();
        let actual: Vec<f64> = (0..4).map(|_| resumed_rng.gen()).collect();
        assert_eq!(expected, actual);

        // A fresh RNG from the same seed would start over instead.
        let mut reseeded = make_rng(resumed.meta.seed);
        let replayed: Vec<f64> = (0..4).map(|_| reseeded.gen()).collect();
        assert_ne!(replayed, actual);
    }
}
