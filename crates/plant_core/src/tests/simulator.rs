use super::*;

#[test]
fn test_running_pump_fills_tank_with_supply_color() {
    let config = single_tank_config();
    let mut state = base_state(&config);
    state.pumps.get_mut(&cid("pump_a")).unwrap().commanded = PumpMode::On;

    let report = advance(&mut state, 1.0, 1.0);

    assert!(approx(level(&state, "tank_a"), 10.0));
    assert!(approx(report.transferred, 10.0));
    assert!(approx(state.pumps[&cid("pump_a")].last_flow, 10.0));
    assert_eq!(
        state.tanks[&cid("tank_a")].color().map(|c| c.to_hex()),
        Some("#00ffff".to_string())
    );
    assert_eq!(
        state.sensors[&cid("level_a")].last_reading,
        Some(Reading::Scalar(10.0))
    );
}

#[test]
fn test_open_valve_moves_paint_between_tanks() {
    let config = transfer_config();
    let mut state = base_state(&config);
    state.valves.get_mut(&cid("valve_ab")).unwrap().commanded = ValvePosition::Open;

    advance(&mut state, 1.0, 0.0);

    assert!(approx(level(&state, "tank_src"), 45.0));
    assert!(approx(level(&state, "tank_dst"), 5.0));
    assert!(approx(
        state.tanks[&cid("tank_dst")].contents.magenta,
        5.0
    ));
    assert_eq!(
        state.sensors[&cid("flow_ab")].last_reading,
        Some(Reading::Scalar(5.0))
    );
    assert!(approx(state.tanks[&cid("tank_src")].last_outflow, 5.0));
    assert!(approx(state.tanks[&cid("tank_dst")].last_inflow, 5.0));
}

#[test]
fn test_flow_scales_with_tick_duration() {
    let config = transfer_config();
    let mut state = base_state(&config);
    state.valves.get_mut(&cid("valve_ab")).unwrap().commanded = ValvePosition::Open;

    advance(&mut state, 0.5, 0.0);

    assert!(approx(level(&state, "tank_dst"), 2.5));
}

#[test]
fn test_draw_is_limited_to_tank_contents() {
    let mut config = transfer_config();
    config.tanks[0].initial = PaintMixture::pure(BaseColor::Magenta, 3.0);
    let mut state = base_state(&config);
    state.valves.get_mut(&cid("valve_ab")).unwrap().commanded = ValvePosition::Open;

    advance(&mut state, 1.0, 0.0);

    assert!(approx(level(&state, "tank_src"), 0.0));
    assert!(approx(level(&state, "tank_dst"), 3.0));
}

#[test]
fn test_competing_outlets_share_available_paint() {
    let mut config = transfer_config();
    config.tanks[0].initial = PaintMixture::pure(BaseColor::Magenta, 6.0);
    config.valves.push(ValveDef {
        id: cid("valve_drain"),
        tank: cid("tank_src"),
        to: None,
        flow_rate: 5.0,
        initial: ValvePosition::Open,
    });
    let mut state = base_state(&config);
    state.valves.get_mut(&cid("valve_ab")).unwrap().commanded = ValvePosition::Open;

    advance(&mut state, 1.0, 0.0);

    assert!(approx(level(&state, "tank_src"), 0.0));
    assert!(approx(level(&state, "tank_dst"), 3.0));
    assert!(approx(state.valves[&cid("valve_drain")].last_flow, 3.0));
}

#[test]
fn test_overflow_is_clamped_and_reported() {
    let mut config = single_tank_config();
    config.tanks[0].initial = PaintMixture::pure(BaseColor::Cyan, 95.0);
    let mut state = base_state(&config);
    state.pumps.get_mut(&cid("pump_a")).unwrap().commanded = PumpMode::On;

    let report = advance(&mut state, 1.0, 0.0);

    assert!(approx(level(&state, "tank_a"), 100.0));
    assert!(approx(report.spilled, 5.0));
    assert!(approx(state.tanks[&cid("tank_a")].last_spill, 5.0));
}

#[test]
fn test_mixed_color_is_volume_weighted() {
    let mut config = transfer_config();
    config.tanks[1].initial = PaintMixture::pure(BaseColor::White, 5.0);
    let mut state = base_state(&config);
    state.valves.get_mut(&cid("valve_ab")).unwrap().commanded = ValvePosition::Open;

    advance(&mut state, 1.0, 0.0);

    // Half magenta (255, 0, 255), half white (255, 255, 255).
    let rgb = state.tanks[&cid("tank_dst")].color().unwrap();
    assert!(approx(rgb.r, 255.0));
    assert!(approx(rgb.g, 127.5));
    assert!(approx(rgb.b, 255.0));
}

#[test]
fn test_empty_tank_color_sensor_reads_blank() {
    let config = single_tank_config();
    let mut state = base_state(&config);

    advance(&mut state, 1.0, 0.0);

    assert_eq!(
        state.sensors[&cid("color_a")].last_reading,
        Some(Reading::Blank)
    );
}

#[test]
fn test_failed_tank_leaks() {
    let mut config = single_tank_config();
    config.tanks[0].initial = PaintMixture::pure(BaseColor::Cyan, 10.0);
    let mut state = base_state(&config);
    state.tanks.get_mut(&cid("tank_a")).unwrap().status = Health::Failed;

    let report = advance(&mut state, 2.0, 1.5);

    assert!(approx(level(&state, "tank_a"), 7.0));
    assert!(approx(report.leaked, 3.0));
}

#[test]
fn test_failed_valve_ignores_command() {
    let config = transfer_config();
    let mut state = base_state(&config);
    {
        let valve = state.valves.get_mut(&cid("valve_ab")).unwrap();
        valve.status = Health::Failed;
        valve.actual = ValveActual::Stuck(ValvePosition::Closed);
        valve.commanded = ValvePosition::Open;
    }

    advance(&mut state, 1.0, 0.0);

    assert!(approx(level(&state, "tank_src"), 50.0));
    assert_eq!(
        state.valves[&cid("valve_ab")].actual,
        ValveActual::Stuck(ValvePosition::Closed)
    );
}
