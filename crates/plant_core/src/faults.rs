//! Fault injector: per-tick Bernoulli trials over healthy components.
//!
//! The only consumer of randomness in the crate. Failures are hidden ground
//! truth; they never enter the event log.

use std::collections::BTreeSet;

use rand::Rng;

use crate::simulator::out_of_range_reading;
use crate::{
    ActuatorFaultMode, ComponentId, ComponentKind, FaultConfig, FaultEvent, Health, PlantState,
    Reading, SensorCorruption, SensorFaultPolicy, SensorKind, ValveActual,
};

/// Runs one failure trial for every healthy component, in the fixed order
/// tanks, valves, pumps, sensors (each sorted by id). Components in `forced`
/// fail with probability 1.0 on this pass.
///
/// Exactly one value is drawn per healthy component whatever its probability,
/// so a given seed always lines up with the same components.
pub fn inject(
    state: &mut PlantState,
    config: &FaultConfig,
    forced: &BTreeSet<ComponentId>,
    rng: &mut impl Rng,
) -> Vec<FaultEvent> {
    let tick = state.meta.tick;

    let candidates: Vec<(ComponentId, ComponentKind)> = state
        .component_ids()
        .filter(|id| state.health(id) == Some(Health::Healthy))
        .filter_map(|id| state.component_kind(id).map(|kind| (id.clone(), kind)))
        .collect();

    let mut faults = Vec::new();
    for (component_id, kind) in candidates {
        let roll: f64 = rng.gen();
        let probability = if forced.contains(&component_id) {
            1.0
        } else {
            config.failure_rate(&component_id, kind)
        };
        if roll >= probability {
            continue;
        }
        fail_component(state, &component_id, kind, config);
        tracing::debug!(component = %component_id, ?kind, tick, "component failed");
        faults.push(FaultEvent {
            component_id,
            kind,
            tick,
        });
    }
    faults
}

/// Marks the component Failed and decouples what it reports from reality.
fn fail_component(
    state: &mut PlantState,
    component_id: &ComponentId,
    kind: ComponentKind,
    config: &FaultConfig,
) {
    if let Some(status) = state.health_mut(component_id) {
        *status = Health::Failed;
    }
    match kind {
        // A failed tank leaks from the next advance on.
        ComponentKind::Tank => {}
        ComponentKind::Valve => {
            if let Some(valve) = state.valves.get_mut(component_id) {
                let stuck_at = match config.actuator_mode {
                    ActuatorFaultMode::StuckOpposite => valve.commanded.opposite(),
                    ActuatorFaultMode::StuckInPlace => valve.actual.position(),
                };
                valve.actual = ValveActual::Stuck(stuck_at);
            }
        }
        ComponentKind::Pump => {
            if let Some(pump) = state.pumps.get_mut(component_id) {
                if config.actuator_mode == ActuatorFaultMode::StuckOpposite {
                    pump.actual = pump.commanded.opposite();
                }
            }
        }
        ComponentKind::Sensor => {
            if let Some(sensor) = state.sensors.get_mut(component_id) {
                let corruption = match (config.sensor_policy, sensor.kind) {
                    (SensorFaultPolicy::Freeze, _) => SensorCorruption::Frozen(sensor.last_reading),
                    // A contact has no out-of-range value; it welds in the wrong state.
                    (SensorFaultPolicy::OutOfRange, SensorKind::Switch) => {
                        let stuck = sensor.last_reading.map(inverted);
                        sensor.last_reading = stuck;
                        SensorCorruption::Frozen(stuck)
                    }
                    (SensorFaultPolicy::OutOfRange, kind) => {
                        sensor.last_reading = out_of_range_reading(kind);
                        SensorCorruption::OutOfRange
                    }
                };
                sensor.corruption = Some(corruption);
            }
        }
    }
}

fn inverted(reading: Reading) -> Reading {
    match reading {
        Reading::Switch(tripped) => Reading::Switch(!tripped),
        other => other,
    }
}
