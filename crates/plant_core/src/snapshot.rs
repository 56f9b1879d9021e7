//! Immutable point-in-time view for external observers.
//!
//! Built from a completed tick's state only. Hidden health is not part of the
//! view; observers learn about failures through alarms.

use serde::{Deserialize, Serialize};

use crate::paint::BaseColor;
use crate::{
    Alarm, ComponentId, EventEnvelope, PlantState, PumpMode, Reading, SensorKind, ValvePosition,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub components: Vec<ComponentView>,
    pub alarms: Vec<Alarm>,
    /// Events appended after the caller's cursor.
    pub events: Vec<EventEnvelope>,
    /// Pass back as `since` to receive only newer events.
    pub cursor: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentView {
    Tank {
        id: ComponentId,
        capacity: f64,
        level: f64,
        /// `#rrggbb`; `None` while empty.
        color: Option<String>,
        fill_color: Option<BaseColor>,
    },
    Valve {
        id: ComponentId,
        tank: ComponentId,
        to: Option<ComponentId>,
        commanded: ValvePosition,
        /// Position feedback only; whether the valve is stuck stays hidden.
        actual: ValvePosition,
        flow: f64,
    },
    Pump {
        id: ComponentId,
        from: Option<ComponentId>,
        to: Option<ComponentId>,
        commanded: PumpMode,
        actual: PumpMode,
        flow: f64,
    },
    Sensor {
        id: ComponentId,
        sensor_kind: SensorKind,
        attached_to: ComponentId,
        reading: Option<Reading>,
    },
}

impl ComponentView {
    pub fn id(&self) -> &ComponentId {
        match self {
            ComponentView::Tank { id, .. }
            | ComponentView::Valve { id, .. }
            | ComponentView::Pump { id, .. }
            | ComponentView::Sensor { id, .. } => id,
        }
    }
}

/// Builds a snapshot with the events whose log index is at or after `since`.
/// A cursor past the end yields no events.
pub fn snapshot(state: &PlantState, since: u64) -> Snapshot {
    let mut components = Vec::with_capacity(
        state.tanks.len() + state.valves.len() + state.pumps.len() + state.sensors.len(),
    );
    components.extend(state.tanks.values().map(|tank| ComponentView::Tank {
        id: tank.id.clone(),
        capacity: tank.capacity,
        level: tank.level(),
        color: tank.color().map(|rgb| rgb.to_hex()),
        fill_color: tank.fill_color,
    }));
    components.extend(state.valves.values().map(|valve| ComponentView::Valve {
        id: valve.id.clone(),
        tank: valve.tank.clone(),
        to: valve.to.clone(),
        commanded: valve.commanded,
        actual: valve.actual.position(),
        flow: valve.last_flow,
    }));
    components.extend(state.pumps.values().map(|pump| ComponentView::Pump {
        id: pump.id.clone(),
        from: pump.from.clone(),
        to: pump.to.clone(),
        commanded: pump.commanded,
        actual: pump.actual,
        flow: pump.last_flow,
    }));
    components.extend(state.sensors.values().map(|sensor| ComponentView::Sensor {
        id: sensor.id.clone(),
        sensor_kind: sensor.kind,
        attached_to: sensor.attached_to.clone(),
        reading: sensor.last_reading,
    }));

    Snapshot {
        tick: state.meta.tick,
        components,
        alarms: state.alarms.iter().cloned().collect(),
        events: events_since(state, since).to_vec(),
        cursor: state.events.len() as u64,
    }
}

/// Slice of the event log from index `since` onwards.
pub fn events_since(state: &PlantState, since: u64) -> &[EventEnvelope] {
    let start = usize::try_from(since)
        .unwrap_or(usize::MAX)
        .min(state.events.len());
    &state.events[start..]
}
