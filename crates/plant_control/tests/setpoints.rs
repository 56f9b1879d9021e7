//! Closed-loop tests: the controller driving the real tick loop.

use plant_control::{feed_demand, CommandSource, FeedDemand, SetpointController};
use plant_core::test_fixtures::{base_state, cid, make_rng, single_tank_config};
use plant_core::*;

fn controlled_config() -> PlantConfig {
    let mut config = single_tank_config();
    config.setpoints.push(SetpointDef {
        tank: cid("tank_a"),
        sensor: cid("level_a"),
        target: 60.0,
        deadband: 15.0,
        feeders: vec![cid("pump_a")],
    });
    config
}

/// Runs `ticks` ticks with the controller in the loop. Returns the number of
/// commands it issued.
fn run_controlled(state: &mut PlantState, config: &PlantConfig, ticks: u64) -> usize {
    let mut controller = SetpointController;
    let mut rng = make_rng();
    let mut next_id = 0u64;
    let mut issued = 0;
    for _ in 0..ticks {
        let commands = controller.generate_commands(state, config, &mut next_id);
        issued += commands.len();
        let report = tick(state, &commands, config, &mut rng);
        assert!(report.command_results.iter().all(CommandOutcome::is_ok));
    }
    issued
}

#[test]
fn test_controller_fills_to_target_and_stops() {
    let config = controlled_config();
    let mut state = base_state(&config);

    let issued = run_controlled(&mut state, &config, 20);

    // Pump on at tick 0, off once the sensor reads 60 L: one command each way.
    assert_eq!(issued, 2);
    assert!((state.tanks[&cid("tank_a")].level() - 60.0).abs() < 1e-9);
    assert_eq!(state.pumps[&cid("pump_a")].commanded, PumpMode::Off);
    assert!(state.alarms.is_empty());
}

#[test]
fn test_controller_holds_inside_deadband() {
    let mut config = controlled_config();
    config.tanks[0].initial = paint::PaintMixture::pure(paint::BaseColor::Cyan, 50.0);
    let mut state = base_state(&config);

    let issued = run_controlled(&mut state, &config, 5);

    assert_eq!(issued, 0);
    assert!((state.tanks[&cid("tank_a")].level() - 50.0).abs() < 1e-9);
}

#[test]
fn test_controller_refills_after_drain() {
    let mut config = controlled_config();
    config.tanks[0].initial = paint::PaintMixture::pure(paint::BaseColor::Cyan, 60.0);
    config.valves[0].initial = ValvePosition::Open;
    let mut state = base_state(&config);

    run_controlled(&mut state, &config, 40);

    // Drains 2 L/s, refills 10 L/s once below 45 L; never empties or overflows.
    let level = state.tanks[&cid("tank_a")].level();
    assert!(level > 30.0 && level <= 70.0, "level drifted to {level}");
}

#[test]
fn test_implausible_reading_fails_safe() {
    let config = controlled_config();
    let mut state = base_state(&config);
    state.pumps.get_mut(&cid("pump_a")).unwrap().commanded = PumpMode::On;
    state.sensors.get_mut(&cid("level_a")).unwrap().last_reading =
        Some(Reading::Scalar(OUT_OF_RANGE_SCALAR));

    assert_eq!(feed_demand(&state, &config.setpoints[0]), FeedDemand::Stop);

    let mut next_id = 7;
    let commands = SetpointController.generate_commands(&state, &config, &mut next_id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].id, CommandId("cmd_000007".to_string()));
    assert_eq!(
        commands[0].command,
        Command::SetPump {
            pump_id: cid("pump_a"),
            mode: PumpMode::Off,
        }
    );
    assert_eq!(next_id, 8);
}

#[test]
fn test_no_setpoints_no_commands() {
    let config = single_tank_config();
    let state = base_state(&config);
    let mut next_id = 0;

    let commands = SetpointController.generate_commands(&state, &config, &mut next_id);

    assert!(commands.is_empty());
    assert_eq!(next_id, 0);
}
