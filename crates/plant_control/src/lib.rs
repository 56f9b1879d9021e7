use serde::{Deserialize, Serialize};

use plant_core::{
    Command, CommandEnvelope, CommandId, ComponentId, PlantConfig, PlantState, PumpMode, Reading,
    SetpointDef, ValvePosition,
};

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &PlantState,
        config: &PlantConfig,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

/// What a setpoint wants its feeders to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedDemand {
    Feed,
    Stop,
    Hold,
}

/// Fixed-policy level control: keeps each configured tank near its target by
/// opening or starting the feeders into it.
///
/// Reads only what an operator could see: sensor readings and commanded
/// states. Never looks at hidden component health.
#[derive(Debug, Default)]
pub struct SetpointController;

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Allocates a command ID and builds a `CommandEnvelope`.
fn make_cmd(tick: u64, next_id: &mut u64, command: Command) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_tick: tick,
        command,
    }
}

/// Decides the feed demand from the setpoint's level sensor. A missing or
/// implausible reading fails safe to `Stop`.
pub fn feed_demand(state: &PlantState, setpoint: &SetpointDef) -> FeedDemand {
    let reading = state
        .sensors
        .get(&setpoint.sensor)
        .and_then(|sensor| sensor.last_reading.filter(|r| sensor.is_plausible(r)));
    match reading {
        Some(Reading::Scalar(level)) if level < setpoint.target - setpoint.deadband => {
            FeedDemand::Feed
        }
        Some(Reading::Scalar(level)) if level >= setpoint.target => FeedDemand::Stop,
        Some(Reading::Scalar(_)) => FeedDemand::Hold,
        _ => FeedDemand::Stop,
    }
}

/// Command moving `feeder` to the demanded state, or `None` if it is already
/// commanded there.
fn feeder_command(state: &PlantState, feeder: &ComponentId, feed: bool) -> Option<Command> {
    if let Some(valve) = state.valves.get(feeder) {
        let position = if feed {
            ValvePosition::Open
        } else {
            ValvePosition::Closed
        };
        return (valve.commanded != position).then(|| Command::SetValve {
            valve_id: feeder.clone(),
            position,
        });
    }
    if let Some(pump) = state.pumps.get(feeder) {
        let mode = if feed { PumpMode::On } else { PumpMode::Off };
        return (pump.commanded != mode).then(|| Command::SetPump {
            pump_id: feeder.clone(),
            mode,
        });
    }
    None
}

impl CommandSource for SetpointController {
    fn generate_commands(
        &mut self,
        state: &PlantState,
        config: &PlantConfig,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let mut commands = Vec::new();
        for setpoint in &config.setpoints {
            let feed = match feed_demand(state, setpoint) {
                FeedDemand::Feed => true,
                FeedDemand::Stop => false,
                FeedDemand::Hold => continue,
            };
            for feeder in &setpoint.feeders {
                if let Some(command) = feeder_command(state, feeder, feed) {
                    tracing::debug!(tank = %setpoint.tank, %feeder, feed, "setpoint command");
                    commands.push(make_cmd(state.meta.tick, next_command_id, command));
                }
            }
        }
        commands
    }
}
