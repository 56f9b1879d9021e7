use super::*;
use crate::paint::{BaseColor, PaintMixture};
use crate::test_fixtures::{
    base_state, cid, make_rng, single_tank_config, switch_sensor, transfer_config,
};
use rand_chacha::ChaCha8Rng;

mod simulator;
mod snapshot;

// --- Shared test helpers ------------------------------------------------

/// Wraps each command in an envelope and runs one tick.
fn run(
    state: &mut PlantState,
    config: &PlantConfig,
    commands: Vec<Command>,
    rng: &mut ChaCha8Rng,
) -> TickReport {
    let envelopes: Vec<CommandEnvelope> = commands
        .into_iter()
        .map(|command| state.envelope(command))
        .collect();
    tick(state, &envelopes, config, rng)
}

fn idle(state: &mut PlantState, config: &PlantConfig, rng: &mut ChaCha8Rng, ticks: u32) {
    for _ in 0..ticks {
        tick(state, &[], config, rng);
    }
}

fn level(state: &PlantState, tank: &str) -> f64 {
    state.tanks[&cid(tank)].level()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn alarm<'a>(state: &'a PlantState, component: &str, kind: AlarmKind) -> Option<&'a Alarm> {
    state.alarms.get(&AlarmId::for_fault(&cid(component), kind))
}

fn raised(report: &TickReport) -> Vec<AlarmId> {
    report
        .events
        .iter()
        .filter_map(|e| match &e.event {
            Event::AlarmRaised { alarm_id, .. } => Some(alarm_id.clone()),
            _ => None,
        })
        .collect()
}

fn force(component: &str) -> Command {
    Command::ForceFault {
        component_id: cid(component),
    }
}
