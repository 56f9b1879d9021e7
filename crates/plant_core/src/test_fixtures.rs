//! Shared test fixtures for plant_core and downstream crates.
//!
//! `single_tank_config()` is one tank with a supply pump, a drain valve and a
//! level + colour sensor pair. `transfer_config()` is two tanks joined by a
//! valve with a flow sensor. Both have zero failure rates, so faults only
//! happen when a test forces them.

use std::collections::BTreeMap;

use crate::paint::{BaseColor, PaintMixture};
use crate::{
    initial_state, ActuatorFaultMode, ComponentId, DetectionConfig, FailureRates, FaultConfig,
    LevelBands, LevelSwitch, PlantConfig, PlantState, PumpDef, PumpMode, SensorDef,
    SensorFaultPolicy, SensorKind, SwitchPoint, TankDef, TimingDef, ValveDef, ValvePosition,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn cid(id: &str) -> ComponentId {
    ComponentId(id.to_string())
}

pub fn no_faults() -> FaultConfig {
    FaultConfig {
        failure_rates: FailureRates {
            tank: 0.0,
            valve: 0.0,
            pump: 0.0,
            sensor: 0.0,
        },
        sensor_policy: SensorFaultPolicy::OutOfRange,
        actuator_mode: ActuatorFaultMode::StuckOpposite,
        tank_leak_rate: 1.0,
        rate_overrides: BTreeMap::new(),
    }
}

/// `tank_a` (100 L, empty, fills with cyan) fed by `pump_a` (cyan supply,
/// 10 L/s) and drained by `valve_a` (2 L/s). Sensors `level_a`, `color_a`.
pub fn single_tank_config() -> PlantConfig {
    PlantConfig {
        config_version: "test".to_string(),
        timing: TimingDef {
            tick_seconds: 1.0,
            tick_period_ms: 10,
        },
        tanks: vec![TankDef {
            id: cid("tank_a"),
            capacity: 100.0,
            initial: PaintMixture::EMPTY,
            fill_color: Some(BaseColor::Cyan),
            level_bands: LevelBands::default(),
        }],
        valves: vec![ValveDef {
            id: cid("valve_a"),
            tank: cid("tank_a"),
            to: None,
            flow_rate: 2.0,
            initial: ValvePosition::Closed,
        }],
        pumps: vec![PumpDef {
            id: cid("pump_a"),
            from: None,
            to: Some(cid("tank_a")),
            supply: Some(BaseColor::Cyan),
            rate: 10.0,
            initial: PumpMode::Off,
        }],
        sensors: vec![
            SensorDef {
                id: cid("level_a"),
                kind: SensorKind::Level,
                attached_to: cid("tank_a"),
                switch: None,
            },
            SensorDef {
                id: cid("color_a"),
                kind: SensorKind::Color,
                attached_to: cid("tank_a"),
                switch: None,
            },
        ],
        faults: no_faults(),
        detection: DetectionConfig::default(),
        setpoints: vec![],
    }
}

/// `tank_src` (50 L magenta) -> `valve_ab` (5 L/s) -> `tank_dst` (empty).
/// Level and colour sensors on both tanks, `flow_ab` on the valve.
pub fn transfer_config() -> PlantConfig {
    let tank = |id: &str, initial: PaintMixture| TankDef {
        id: cid(id),
        capacity: 100.0,
        initial,
        fill_color: None,
        level_bands: LevelBands::default(),
    };
    let sensor = |id: &str, kind: SensorKind, attached_to: &str| SensorDef {
        id: cid(id),
        kind,
        attached_to: cid(attached_to),
        switch: None,
    };
    PlantConfig {
        config_version: "test".to_string(),
        timing: TimingDef {
            tick_seconds: 1.0,
            tick_period_ms: 10,
        },
        tanks: vec![
            tank("tank_src", PaintMixture::pure(BaseColor::Magenta, 50.0)),
            tank("tank_dst", PaintMixture::EMPTY),
        ],
        valves: vec![ValveDef {
            id: cid("valve_ab"),
            tank: cid("tank_src"),
            to: Some(cid("tank_dst")),
            flow_rate: 5.0,
            initial: ValvePosition::Closed,
        }],
        pumps: vec![],
        sensors: vec![
            sensor("level_src", SensorKind::Level, "tank_src"),
            sensor("color_src", SensorKind::Color, "tank_src"),
            sensor("level_dst", SensorKind::Level, "tank_dst"),
            sensor("color_dst", SensorKind::Color, "tank_dst"),
            sensor("flow_ab", SensorKind::Flow, "valve_ab"),
        ],
        faults: no_faults(),
        detection: DetectionConfig::default(),
        setpoints: vec![],
    }
}

/// Level switch `id` on `tank` tripping at `fraction` of capacity.
pub fn switch_sensor(id: &str, tank: &str, point: SwitchPoint, fraction: f64) -> SensorDef {
    SensorDef {
        id: cid(id),
        kind: SensorKind::Switch,
        attached_to: cid(tank),
        switch: Some(LevelSwitch { point, fraction }),
    }
}

/// Tick-0 state for `config`, seeded with 42.
pub fn base_state(config: &PlantConfig) -> PlantState {
    initial_state(config, 42).expect("fixture config is valid")
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
