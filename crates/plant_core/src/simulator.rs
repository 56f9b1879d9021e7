//! Plant physics: one step of paint transfer between tanks.
//!
//! Deterministic and free of randomness. Reads commanded and actual actuator
//! states, moves paint, then refreshes every sensor's observable reading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::paint::{PaintMixture, Rgb};
use crate::{
    ComponentId, Health, PlantState, PumpState, Reading, SensorCorruption, SensorKind, SensorState,
    ValveActual,
};

/// Scalar reported by a level or flow sensor that fails out of range.
pub const OUT_OF_RANGE_SCALAR: f64 = -1.0;

/// Totals for one `advance` call, in litres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    /// Paint moved through valves and pumps.
    pub transferred: f64,
    /// Paint lost to overflow.
    pub spilled: f64,
    /// Paint lost through leaking tanks.
    pub leaked: f64,
}

/// Where a transfer takes paint from.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Tank(ComponentId),
    Supply(PaintMixture),
}

#[derive(Debug, Clone)]
enum Carrier {
    Valve(ComponentId),
    Pump(ComponentId),
    Leak,
}

#[derive(Debug, Clone)]
struct Transfer {
    carrier: Carrier,
    source: Source,
    to: Option<ComponentId>,
    requested: f64,
}

/// Advances physical quantities by `tick_seconds` of simulated time.
///
/// Levels never leave `[0, capacity]`: draws are scaled down to what a tank
/// holds and overflow is spilled.
pub fn advance(state: &mut PlantState, tick_seconds: f64, tank_leak_rate: f64) -> FlowReport {
    sync_actuators(state);

    let transfers = collect_transfers(state, tick_seconds, tank_leak_rate);
    let mut report = FlowReport::default();

    for tank in state.tanks.values_mut() {
        tank.last_inflow = 0.0;
        tank.last_outflow = 0.0;
        tank.last_spill = 0.0;
    }
    for valve in state.valves.values_mut() {
        valve.last_flow = 0.0;
    }
    for pump in state.pumps.values_mut() {
        pump.last_flow = 0.0;
    }

    // Scale each tank's requests so the sum never exceeds its contents.
    let mut demand: BTreeMap<ComponentId, f64> = BTreeMap::new();
    for transfer in &transfers {
        if let Source::Tank(tank_id) = &transfer.source {
            *demand.entry(tank_id.clone()).or_default() += transfer.requested;
        }
    }
    let scale: BTreeMap<ComponentId, f64> = demand
        .into_iter()
        .map(|(tank_id, requested)| {
            let available = state.tanks.get(&tank_id).map_or(0.0, |t| t.level());
            let factor = if requested > available {
                available / requested
            } else {
                1.0
            };
            (tank_id, factor)
        })
        .collect();

    // Draw everything first so every draw sees start-of-tick contents.
    let mut deposits: Vec<(ComponentId, PaintMixture)> = Vec::new();
    for transfer in transfers {
        let slice = match &transfer.source {
            Source::Tank(tank_id) => {
                let factor = scale.get(tank_id).copied().unwrap_or(0.0);
                let Some(tank) = state.tanks.get_mut(tank_id) else {
                    continue;
                };
                let slice = tank.contents.take(transfer.requested * factor);
                tank.last_outflow += slice.volume();
                slice
            }
            Source::Supply(mixture) => *mixture,
        };
        let moved = slice.volume();
        match &transfer.carrier {
            Carrier::Valve(id) => {
                if let Some(valve) = state.valves.get_mut(id) {
                    valve.last_flow = moved;
                }
                report.transferred += moved;
            }
            Carrier::Pump(id) => {
                if let Some(pump) = state.pumps.get_mut(id) {
                    pump.last_flow = moved;
                }
                report.transferred += moved;
            }
            Carrier::Leak => report.leaked += moved,
        }
        if let Some(to) = transfer.to {
            deposits.push((to, slice));
        }
    }

    for (tank_id, slice) in deposits {
        if let Some(tank) = state.tanks.get_mut(&tank_id) {
            tank.last_inflow += slice.volume();
            tank.contents += slice;
        }
    }

    for tank in state.tanks.values_mut() {
        let spilled = tank.contents.clamp_to(tank.capacity);
        if spilled > 0.0 {
            tracing::debug!(tank = %tank.id, spilled, "tank overflowed");
        }
        tank.last_spill = spilled;
        report.spilled += spilled;
    }

    refresh_sensors(state);
    report
}

/// Healthy actuators follow their command; failed ones stay where the fault
/// left them.
fn sync_actuators(state: &mut PlantState) {
    for valve in state.valves.values_mut() {
        if valve.status == Health::Healthy {
            valve.actual = ValveActual::following(valve.commanded);
        }
    }
    for pump in state.pumps.values_mut() {
        if pump.status == Health::Healthy {
            pump.actual = pump.commanded;
        }
    }
}

fn pump_source(pump: &PumpState, litres: f64) -> Option<Source> {
    match (&pump.from, pump.supply) {
        (Some(tank_id), _) => Some(Source::Tank(tank_id.clone())),
        (None, Some(color)) => Some(Source::Supply(PaintMixture::pure(color, litres))),
        (None, None) => None,
    }
}

fn collect_transfers(state: &PlantState, tick_seconds: f64, tank_leak_rate: f64) -> Vec<Transfer> {
    let mut transfers = Vec::new();

    for valve in state.valves.values() {
        if valve.actual.is_open() {
            transfers.push(Transfer {
                carrier: Carrier::Valve(valve.id.clone()),
                source: Source::Tank(valve.tank.clone()),
                to: valve.to.clone(),
                requested: valve.flow_rate * tick_seconds,
            });
        }
    }

    for pump in state.pumps.values() {
        if pump.actual != crate::PumpMode::On {
            continue;
        }
        let requested = pump.rate * tick_seconds;
        if let Some(source) = pump_source(pump, requested) {
            transfers.push(Transfer {
                carrier: Carrier::Pump(pump.id.clone()),
                source,
                to: pump.to.clone(),
                requested,
            });
        }
    }

    for tank in state.tanks.values() {
        if tank.status == Health::Failed && tank_leak_rate > 0.0 {
            transfers.push(Transfer {
                carrier: Carrier::Leak,
                source: Source::Tank(tank.id.clone()),
                to: None,
                requested: tank_leak_rate * tick_seconds,
            });
        }
    }

    transfers
}

/// What a healthy sensor reads from the current physical state.
pub(crate) fn true_reading(state: &PlantState, sensor: &SensorState) -> Option<Reading> {
    match sensor.kind {
        SensorKind::Level => state
            .tanks
            .get(&sensor.attached_to)
            .map(|tank| Reading::Scalar(tank.level())),
        SensorKind::Color => state
            .tanks
            .get(&sensor.attached_to)
            .map(|tank| tank.color().map_or(Reading::Blank, Reading::Color)),
        SensorKind::Flow => state
            .valves
            .get(&sensor.attached_to)
            .map(|valve| valve.last_flow)
            .or_else(|| state.pumps.get(&sensor.attached_to).map(|p| p.last_flow))
            .map(Reading::Scalar),
        SensorKind::Switch => {
            let tank = state.tanks.get(&sensor.attached_to)?;
            let switch = sensor.switch?;
            Some(Reading::Switch(switch.tripped(tank.level(), tank.capacity)))
        }
    }
}

/// Sentinel an out-of-range sensor of `kind` reports. Switches have none.
pub(crate) fn out_of_range_reading(kind: SensorKind) -> Option<Reading> {
    match kind {
        SensorKind::Level | SensorKind::Flow => Some(Reading::Scalar(OUT_OF_RANGE_SCALAR)),
        SensorKind::Color => Some(Reading::Color(Rgb::OUT_OF_RANGE)),
        SensorKind::Switch => None,
    }
}

fn refresh_sensors(state: &mut PlantState) {
    let readings: Vec<(ComponentId, Option<Reading>)> = state
        .sensors
        .values()
        .map(|sensor| {
            let reading = match (sensor.status, sensor.corruption) {
                (Health::Failed, Some(SensorCorruption::Frozen(frozen))) => frozen,
                (Health::Failed, Some(SensorCorruption::OutOfRange)) => {
                    out_of_range_reading(sensor.kind)
                }
                _ => true_reading(state, sensor),
            };
            (sensor.id.clone(), reading)
        })
        .collect();

    for (sensor_id, reading) in readings {
        if let Some(sensor) = state.sensors.get_mut(&sensor_id) {
            sensor.last_reading = reading;
        }
    }
}
