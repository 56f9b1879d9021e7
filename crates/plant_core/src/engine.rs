use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::commands::{apply_commands, CommandOutcome};
use crate::simulator::{advance, FlowReport};
use crate::{alarms, faults, CommandEnvelope, DetectionConfig, EventEnvelope, FaultEvent};
use crate::{PlantConfig, PlantState};

/// Everything one tick produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Events appended to the log this tick, in order.
    pub events: Vec<EventEnvelope>,
    /// Hidden failures injected this tick. Test and harness use only.
    pub faults: Vec<FaultEvent>,
    pub command_results: Vec<CommandOutcome>,
    pub flow: FlowReport,
}

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Apply commands queued since the previous tick.
/// 2. Advance plant physics by `tick_seconds`.
/// 3. Inject faults.
/// 4. Run detection and reconcile alarms.
/// 5. Increment tick counter.
///
/// Every event produced is stamped with the pre-increment tick and appended
/// to `state.events`.
pub fn tick(
    state: &mut PlantState,
    commands: &[CommandEnvelope],
    config: &PlantConfig,
    rng: &mut impl Rng,
) -> TickReport {
    let current_tick = state.meta.tick;
    let tick_seconds = state.meta.tick_seconds;
    let mut events = Vec::new();

    let (command_results, forced) = apply_commands(state, commands, &mut events);
    let flow = advance(state, tick_seconds, config.faults.tank_leak_rate);
    let faults = faults::inject(state, &config.faults, &forced, rng);
    alarms::detect(state, current_tick, &config.detection, &mut events);

    state.events.extend(events.iter().cloned());
    state.meta.tick += 1;

    TickReport {
        events,
        faults,
        command_results,
        flow,
    }
}

/// Re-runs the detection pass for the last completed tick without advancing
/// time. Over an unchanged state it produces no events. Before the first tick
/// there is nothing to evaluate.
pub fn run_detection(state: &mut PlantState, config: &DetectionConfig) -> Vec<EventEnvelope> {
    let Some(last_tick) = state.meta.tick.checked_sub(1) else {
        return Vec::new();
    };
    let mut events = Vec::new();
    alarms::detect(state, last_tick, config, &mut events);
    state.events.extend(events.iter().cloned());
    events
}
