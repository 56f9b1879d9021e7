use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::paint::PaintMixture;
use crate::{
    AlarmId, Command, CommandEnvelope, CommandId, ComponentId, ComponentKind, Event,
    EventEnvelope, Health, PlantState, Severity, ValveActual,
};

/// Result of applying one queued command at the tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command_id: CommandId,
    pub error: Option<CommandError>,
}

impl CommandOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn require(
    state: &PlantState,
    id: &ComponentId,
    kind: Option<ComponentKind>,
) -> Result<(), CommandError> {
    match (state.component_kind(id), kind) {
        (Some(_), None) => Ok(()),
        (Some(found), Some(expected)) if found == expected => Ok(()),
        _ => Err(CommandError::UnknownComponent(id.clone())),
    }
}

/// Submission-time check: every referenced id must exist with the right kind.
/// State-dependent transitions are checked again when the command applies.
pub fn validate_command(state: &PlantState, command: &Command) -> Result<(), CommandError> {
    match command {
        Command::SetValve { valve_id, .. } => require(state, valve_id, Some(ComponentKind::Valve)),
        Command::SetPump { pump_id, .. } => require(state, pump_id, Some(ComponentKind::Pump)),
        Command::Repair { component_id } | Command::ForceFault { component_id } => {
            require(state, component_id, None)
        }
        Command::Acknowledge { alarm_id } => {
            if state.alarms.contains(alarm_id) {
                Ok(())
            } else {
                Err(CommandError::UnknownAlarm(alarm_id.clone()))
            }
        }
        Command::Fill { tank_id } | Command::Flush { tank_id } => {
            require(state, tank_id, Some(ComponentKind::Tank))
        }
    }
}

/// Applies queued commands in submission order. Returns one outcome per
/// command and the set of components forced to fail on this tick's
/// injection pass.
pub(crate) fn apply_commands(
    state: &mut PlantState,
    commands: &[CommandEnvelope],
    events: &mut Vec<EventEnvelope>,
) -> (Vec<CommandOutcome>, BTreeSet<ComponentId>) {
    let mut outcomes = Vec::with_capacity(commands.len());
    let mut forced = BTreeSet::new();

    for envelope in commands {
        let result = validate_command(state, &envelope.command)
            .and_then(|()| apply_one(state, &envelope.command, &mut forced, events));
        if let Err(err) = &result {
            tracing::warn!(command = %envelope.id, %err, "command rejected");
        }
        outcomes.push(CommandOutcome {
            command_id: envelope.id.clone(),
            error: result.err(),
        });
    }
    (outcomes, forced)
}

fn operator_event(
    state: &mut PlantState,
    component_id: ComponentId,
    description: String,
    event: Event,
) -> EventEnvelope {
    let tick = state.meta.tick;
    crate::emit(
        &mut state.counters,
        tick,
        component_id,
        Severity::Info,
        description,
        event,
    )
}

fn apply_one(
    state: &mut PlantState,
    command: &Command,
    forced: &mut BTreeSet<ComponentId>,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    match command {
        Command::SetValve { valve_id, position } => {
            if let Some(valve) = state.valves.get_mut(valve_id) {
                valve.commanded = *position;
            }
            events.push(operator_event(
                state,
                valve_id.clone(),
                format!("valve commanded {position:?}"),
                Event::ValveCommanded {
                    position: *position,
                },
            ));
        }
        Command::SetPump { pump_id, mode } => {
            if let Some(pump) = state.pumps.get_mut(pump_id) {
                pump.commanded = *mode;
            }
            events.push(operator_event(
                state,
                pump_id.clone(),
                format!("pump commanded {mode:?}"),
                Event::PumpCommanded { mode: *mode },
            ));
        }
        Command::Repair { component_id } => {
            handle_repair(state, component_id)?;
            events.push(operator_event(
                state,
                component_id.clone(),
                "component repaired".to_string(),
                Event::ComponentRepaired,
            ));
        }
        Command::Acknowledge { alarm_id } => {
            state.alarms.acknowledge(alarm_id)?;
            let component_id = alarm_component(state, alarm_id);
            events.push(operator_event(
                state,
                component_id,
                format!("alarm {alarm_id} acknowledged"),
                Event::AlarmAcknowledged {
                    alarm_id: alarm_id.clone(),
                },
            ));
        }
        Command::Fill { tank_id } => {
            let litres = handle_fill(state, tank_id)?;
            events.push(operator_event(
                state,
                tank_id.clone(),
                format!("tank filled with {litres:.1} L"),
                Event::TankFilled { litres },
            ));
        }
        Command::Flush { tank_id } => {
            let litres = handle_flush(state, tank_id);
            events.push(operator_event(
                state,
                tank_id.clone(),
                format!("tank flushed, {litres:.1} L removed"),
                Event::TankFlushed { litres },
            ));
        }
        Command::ForceFault { component_id } => {
            if state.health(component_id) == Some(Health::Failed) {
                return Err(CommandError::InvalidTransition {
                    target: component_id.to_string(),
                    reason: "component has already failed".to_string(),
                });
            }
            forced.insert(component_id.clone());
        }
    }
    Ok(())
}

fn alarm_component(state: &PlantState, alarm_id: &AlarmId) -> ComponentId {
    state
        .alarms
        .get(alarm_id)
        .map_or_else(|| ComponentId(alarm_id.0.clone()), |a| a.component_id.clone())
}

/// Failed -> Healthy. Actuators resume following their command and sensors
/// report true values again from the next advance.
fn handle_repair(state: &mut PlantState, component_id: &ComponentId) -> Result<(), CommandError> {
    let Some(status) = state.health_mut(component_id) else {
        return Err(CommandError::UnknownComponent(component_id.clone()));
    };
    if *status == Health::Healthy {
        return Err(CommandError::InvalidTransition {
            target: component_id.to_string(),
            reason: "component is not failed".to_string(),
        });
    }
    *status = Health::Healthy;

    if let Some(valve) = state.valves.get_mut(component_id) {
        valve.actual = ValveActual::following(valve.commanded);
    }
    if let Some(pump) = state.pumps.get_mut(component_id) {
        pump.actual = pump.commanded;
    }
    if let Some(sensor) = state.sensors.get_mut(component_id) {
        sensor.corruption = None;
    }
    tracing::info!(component = %component_id, "component repaired");
    Ok(())
}

fn handle_fill(state: &mut PlantState, tank_id: &ComponentId) -> Result<f64, CommandError> {
    let tick = state.meta.tick;
    let Some(tank) = state.tanks.get_mut(tank_id) else {
        return Err(CommandError::UnknownComponent(tank_id.clone()));
    };
    let Some(color) = tank.fill_color else {
        return Err(CommandError::InvalidTransition {
            target: tank_id.to_string(),
            reason: "tank has no fill colour".to_string(),
        });
    };
    let litres = (tank.capacity - tank.level()).max(0.0);
    tank.contents += PaintMixture::pure(color, litres);
    tank.manual_change_tick = Some(tick);
    Ok(litres)
}

fn handle_flush(state: &mut PlantState, tank_id: &ComponentId) -> f64 {
    let tick = state.meta.tick;
    let Some(tank) = state.tanks.get_mut(tank_id) else {
        return 0.0;
    };
    let litres = tank.level();
    tank.contents = PaintMixture::EMPTY;
    tank.manual_change_tick = Some(tick);
    litres
}

impl PlantState {
    /// Wraps `command` in an envelope with the next sequential command id.
    pub fn envelope(&mut self, command: Command) -> CommandEnvelope {
        let id = CommandId(format!("cmd_{:06}", self.counters.next_command_id));
        self.counters.next_command_id += 1;
        CommandEnvelope {
            id,
            issued_tick: self.meta.tick,
            command,
        }
    }
}
