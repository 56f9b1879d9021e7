//! Load-time validation and construction of the initial plant state.
//!
//! A configuration that passes `validate_config` can never put the simulator
//! in an invalid state; `initial_state` refuses anything else.

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::simulator::true_reading;
use crate::{
    ComponentId, ComponentKind, Counters, DetectionMemory, Health, LevelBands, MetaState,
    PlantConfig, PlantState, PumpState, SensorDef, SensorKind, SensorState, TankState,
    ValveActual, ValveState,
};

pub const SCHEMA_VERSION: u32 = 1;

fn check_rate(what: impl FnOnce() -> String, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate {
            what: what(),
            value,
        })
    }
}

fn declared_kinds(config: &PlantConfig) -> Result<BTreeMap<ComponentId, ComponentKind>, ConfigError> {
    let declared = config
        .tanks
        .iter()
        .map(|t| (&t.id, ComponentKind::Tank))
        .chain(config.valves.iter().map(|v| (&v.id, ComponentKind::Valve)))
        .chain(config.pumps.iter().map(|p| (&p.id, ComponentKind::Pump)))
        .chain(config.sensors.iter().map(|s| (&s.id, ComponentKind::Sensor)));

    let mut kinds = BTreeMap::new();
    for (id, kind) in declared {
        if id.0.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if kinds.insert(id.clone(), kind).is_some() {
            return Err(ConfigError::DuplicateId(id.clone()));
        }
    }
    Ok(kinds)
}

fn expect_kind(
    kinds: &BTreeMap<ComponentId, ComponentKind>,
    component: &ComponentId,
    field: &'static str,
    target: &ComponentId,
    expected: ComponentKind,
) -> Result<(), ConfigError> {
    if kinds.get(target) == Some(&expected) {
        Ok(())
    } else {
        Err(ConfigError::DanglingReference {
            component: component.clone(),
            field,
            expected,
            target: target.clone(),
        })
    }
}

fn validate_band(value: Option<f64>) -> bool {
    value.map_or(true, |v| v.is_finite() && (0.0..=1.0).contains(&v))
}

fn check_probability(kind: ComponentKind, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { kind, value })
    }
}

fn validate_switch(sensor: &SensorDef) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSwitch {
        sensor: sensor.id.clone(),
        reason: reason.to_string(),
    };
    match (sensor.kind, sensor.switch) {
        (SensorKind::Switch, None) => Err(invalid("switch sensors need a trip point")),
        (SensorKind::Switch, Some(switch)) => {
            if switch.fraction.is_finite() && (0.0..=1.0).contains(&switch.fraction) {
                Ok(())
            } else {
                Err(invalid("fraction must be within [0, 1]"))
            }
        }
        (_, Some(_)) => Err(invalid("only switch sensors take a trip point")),
        (_, None) => Ok(()),
    }
}

/// Rejects malformed configuration with a descriptive error. The first
/// problem found is reported.
pub fn validate_config(config: &PlantConfig) -> Result<(), ConfigError> {
    let tick_seconds = config.timing.tick_seconds;
    if !(tick_seconds.is_finite() && tick_seconds > 0.0) {
        return Err(ConfigError::NonPositiveTickDuration(tick_seconds));
    }

    let kinds = declared_kinds(config)?;

    for tank in &config.tanks {
        if !(tank.capacity.is_finite() && tank.capacity > 0.0) {
            return Err(ConfigError::NonPositiveCapacity {
                tank: tank.id.clone(),
                capacity: tank.capacity,
            });
        }
        for color in crate::paint::BaseColor::ALL {
            check_rate(
                || format!("initial {color} in tank '{}'", tank.id),
                tank.initial.amount(color),
            )?;
        }
        let initial = tank.initial.volume();
        if initial > tank.capacity {
            return Err(ConfigError::InitialOverCapacity {
                tank: tank.id.clone(),
                initial,
                capacity: tank.capacity,
            });
        }
        let LevelBands { low, high, .. } = tank.level_bands;
        let ordered = match (low, high) {
            (Some(low), Some(high)) => low < high,
            _ => true,
        };
        if !(validate_band(low) && validate_band(high) && ordered) {
            return Err(ConfigError::InvalidLevelBands {
                tank: tank.id.clone(),
                low,
                high,
            });
        }
    }

    for valve in &config.valves {
        expect_kind(&kinds, &valve.id, "tank", &valve.tank, ComponentKind::Tank)?;
        if let Some(to) = &valve.to {
            expect_kind(&kinds, &valve.id, "to", to, ComponentKind::Tank)?;
        }
        check_rate(|| format!("flow rate of valve '{}'", valve.id), valve.flow_rate)?;
    }

    for pump in &config.pumps {
        if let Some(from) = &pump.from {
            expect_kind(&kinds, &pump.id, "from", from, ComponentKind::Tank)?;
        }
        if let Some(to) = &pump.to {
            expect_kind(&kinds, &pump.id, "to", to, ComponentKind::Tank)?;
        }
        if pump.from.is_none() && pump.supply.is_none() {
            return Err(ConfigError::PumpWithoutSource(pump.id.clone()));
        }
        check_rate(|| format!("rate of pump '{}'", pump.id), pump.rate)?;
    }

    for sensor in &config.sensors {
        let Some(&target_kind) = kinds.get(&sensor.attached_to) else {
            return Err(ConfigError::DanglingReference {
                component: sensor.id.clone(),
                field: "attached_to",
                expected: match sensor.kind {
                    SensorKind::Level | SensorKind::Color | SensorKind::Switch => {
                        ComponentKind::Tank
                    }
                    SensorKind::Flow => ComponentKind::Valve,
                },
                target: sensor.attached_to.clone(),
            });
        };
        let compatible = match sensor.kind {
            SensorKind::Level | SensorKind::Color | SensorKind::Switch => {
                target_kind == ComponentKind::Tank
            }
            SensorKind::Flow => {
                matches!(target_kind, ComponentKind::Valve | ComponentKind::Pump)
            }
        };
        if !compatible {
            return Err(ConfigError::IncompatibleSensor {
                sensor: sensor.id.clone(),
                kind: sensor.kind,
                target: sensor.attached_to.clone(),
                target_kind,
            });
        }
        validate_switch(sensor)?;
    }

    let rates = &config.faults.failure_rates;
    for kind in [
        ComponentKind::Tank,
        ComponentKind::Valve,
        ComponentKind::Pump,
        ComponentKind::Sensor,
    ] {
        check_probability(kind, rates.for_kind(kind))?;
    }
    for (id, &value) in &config.faults.rate_overrides {
        let Some(&kind) = kinds.get(id) else {
            return Err(ConfigError::UnknownOverride(id.clone()));
        };
        check_probability(kind, value)?;
    }
    check_rate(|| "tank leak rate".to_string(), config.faults.tank_leak_rate)?;

    if config.detection.consecutive_bad_readings == 0 {
        return Err(ConfigError::ZeroConsecutiveThreshold);
    }
    check_rate(
        || "trend tolerance".to_string(),
        config.detection.trend_tolerance,
    )?;

    validate_setpoints(config, &kinds)
}

fn validate_setpoints(
    config: &PlantConfig,
    kinds: &BTreeMap<ComponentId, ComponentKind>,
) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for setpoint in &config.setpoints {
        let invalid = |reason: String| ConfigError::InvalidSetpoint {
            tank: setpoint.tank.clone(),
            reason,
        };
        let Some(tank) = config.tanks.iter().find(|t| t.id == setpoint.tank) else {
            return Err(invalid("not a tank".to_string()));
        };
        if !seen.insert(&setpoint.tank) {
            return Err(invalid("more than one setpoint".to_string()));
        }
        let level_sensor = config.sensors.iter().any(|s| {
            s.id == setpoint.sensor && s.kind == SensorKind::Level && s.attached_to == tank.id
        });
        if !level_sensor {
            return Err(invalid(format!(
                "'{}' is not a level sensor on this tank",
                setpoint.sensor
            )));
        }
        if !(setpoint.target.is_finite() && setpoint.target > 0.0 && setpoint.target <= tank.capacity)
        {
            return Err(invalid(format!(
                "target {} outside (0, {}]",
                setpoint.target, tank.capacity
            )));
        }
        if !(setpoint.deadband.is_finite() && setpoint.deadband >= 0.0) {
            return Err(invalid(format!("deadband {} is negative", setpoint.deadband)));
        }
        if setpoint.feeders.is_empty() {
            return Err(invalid("no feeders".to_string()));
        }
        for feeder in &setpoint.feeders {
            let feeds_tank = match kinds.get(feeder) {
                Some(ComponentKind::Valve) => config
                    .valves
                    .iter()
                    .any(|v| v.id == *feeder && v.to.as_ref() == Some(&tank.id)),
                Some(ComponentKind::Pump) => config
                    .pumps
                    .iter()
                    .any(|p| p.id == *feeder && p.to.as_ref() == Some(&tank.id)),
                _ => false,
            };
            if !feeds_tank {
                return Err(invalid(format!(
                    "feeder '{feeder}' is not a valve or pump into this tank"
                )));
            }
        }
    }
    Ok(())
}

/// Builds tick-0 state from a validated configuration. Sensors already carry
/// their initial readings, so the first detection pass has a baseline.
pub fn initial_state(config: &PlantConfig, seed: u64) -> Result<PlantState, ConfigError> {
    validate_config(config)?;
    let tick_seconds = config.timing.tick_seconds;

    let tanks = config
        .tanks
        .iter()
        .map(|def| {
            let outlets: SmallVec<[ComponentId; 4]> = config
                .valves
                .iter()
                .filter(|v| v.tank == def.id)
                .map(|v| v.id.clone())
                .collect();
            let tank = TankState {
                id: def.id.clone(),
                capacity: def.capacity,
                contents: def.initial,
                status: Health::Healthy,
                fill_color: def.fill_color,
                level_bands: def.level_bands,
                outlets,
                last_inflow: 0.0,
                last_outflow: 0.0,
                last_spill: 0.0,
                manual_change_tick: None,
            };
            (def.id.clone(), tank)
        })
        .collect();

    let valves = config
        .valves
        .iter()
        .map(|def| {
            let valve = ValveState {
                id: def.id.clone(),
                tank: def.tank.clone(),
                to: def.to.clone(),
                flow_rate: def.flow_rate,
                commanded: def.initial,
                actual: ValveActual::following(def.initial),
                status: Health::Healthy,
                last_flow: 0.0,
            };
            (def.id.clone(), valve)
        })
        .collect();

    let pumps = config
        .pumps
        .iter()
        .map(|def| {
            let pump = PumpState {
                id: def.id.clone(),
                from: def.from.clone(),
                to: def.to.clone(),
                supply: def.supply,
                rate: def.rate,
                commanded: def.initial,
                actual: def.initial,
                status: Health::Healthy,
                last_flow: 0.0,
            };
            (def.id.clone(), pump)
        })
        .collect();

    let mut state = PlantState {
        meta: MetaState {
            tick: 0,
            seed,
            schema_version: SCHEMA_VERSION,
            config_version: config.config_version.clone(),
            tick_seconds,
        },
        tanks,
        valves,
        pumps,
        sensors: BTreeMap::new(),
        alarms: crate::AlarmBook::default(),
        events: Vec::new(),
        detection: DetectionMemory::default(),
        counters: Counters {
            next_event_id: 0,
            next_command_id: 0,
        },
    };

    for def in &config.sensors {
        let plausible_max = match def.kind {
            SensorKind::Level => state.tanks.get(&def.attached_to).map_or(0.0, |t| t.capacity),
            SensorKind::Color | SensorKind::Switch => 0.0,
            SensorKind::Flow => state
                .valves
                .get(&def.attached_to)
                .map(|v| v.flow_rate)
                .or_else(|| state.pumps.get(&def.attached_to).map(|p| p.rate))
                .map_or(0.0, |rate| rate * tick_seconds),
        };
        let mut sensor = SensorState {
            id: def.id.clone(),
            kind: def.kind,
            attached_to: def.attached_to.clone(),
            status: Health::Healthy,
            plausible_max,
            switch: def.switch,
            last_reading: None,
            corruption: None,
        };
        sensor.last_reading = true_reading(&state, &sensor);
        state.sensors.insert(def.id.clone(), sensor);
    }

    tracing::info!(
        tanks = state.tanks.len(),
        valves = state.valves.len(),
        pumps = state.pumps.len(),
        sensors = state.sensors.len(),
        seed,
        "plant initialised"
    );
    Ok(state)
}
