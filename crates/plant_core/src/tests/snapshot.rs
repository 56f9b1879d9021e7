use super::*;

#[test]
fn test_snapshot_lists_every_component_in_order() {
    let config = transfer_config();
    let state = base_state(&config);

    let snap = snapshot(&state, 0);

    let ids: Vec<&str> = snap.components.iter().map(|c| c.id().0.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "tank_dst",
            "tank_src",
            "valve_ab",
            "color_dst",
            "color_src",
            "flow_ab",
            "level_dst",
            "level_src",
        ]
    );
    assert_eq!(snap.tick, 0);
}

#[test]
fn test_tank_view_carries_level_and_hex_color() {
    let config = transfer_config();
    let state = base_state(&config);

    let snap = snapshot(&state, 0);

    let src = snap
        .components
        .iter()
        .find(|c| c.id() == &cid("tank_src"))
        .unwrap();
    match src {
        ComponentView::Tank { level, color, .. } => {
            assert!(approx(*level, 50.0));
            assert_eq!(color.as_deref(), Some("#ff00ff"));
        }
        other => panic!("expected tank view, got {other:?}"),
    }
}

#[test]
fn test_cursor_returns_only_newer_events() {
    let config = single_tank_config();
    let mut state = base_state(&config);
    let mut rng = make_rng();

    run(&mut state, &config, vec![force("valve_a")], &mut rng);
    let first = snapshot(&state, 0);
    assert_eq!(first.events.len(), 1);
    assert_eq!(first.cursor, 1);

    let unchanged = snapshot(&state, first.cursor);
    assert!(unchanged.events.is_empty());

    let set_open = Command::SetValve {
        valve_id: cid("valve_a"),
        position: ValvePosition::Open,
    };
    run(&mut state, &config, vec![set_open], &mut rng);
    let next = snapshot(&state, first.cursor);
    assert_eq!(next.events.len(), 1);
    assert!(matches!(next.events[0].event, Event::ValveCommanded { .. }));
    assert_eq!(next.cursor, 2);
}

#[test]
fn test_cursor_past_end_yields_no_events() {
    let config = single_tank_config();
    let mut state = base_state(&config);
    let mut rng = make_rng();
    run(&mut state, &config, vec![force("valve_a")], &mut rng);

    assert!(snapshot(&state, 99).events.is_empty());
    assert!(events_since(&state, u64::MAX).is_empty());
}

#[test]
fn test_snapshot_does_not_expose_hidden_health() {
    let config = single_tank_config();
    let mut state = base_state(&config);
    let mut rng = make_rng();
    run(&mut state, &config, vec![force("tank_a")], &mut rng);

    let json = serde_json::to_string(&snapshot(&state, 0)).unwrap();

    assert!(!json.contains("\"status\""));
    assert!(!json.contains("failed"));
}

#[test]
fn test_stuck_valve_view_shows_position_only() {
    let config = single_tank_config();
    let mut state = base_state(&config);
    let mut rng = make_rng();
    run(&mut state, &config, vec![force("valve_a")], &mut rng);
    assert_eq!(
        state.valves[&cid("valve_a")].actual,
        ValveActual::Stuck(ValvePosition::Open)
    );

    let snap = snapshot(&state, 0);

    let valve = snap
        .components
        .iter()
        .find(|c| c.id() == &cid("valve_a"))
        .unwrap();
    assert!(matches!(
        valve,
        ComponentView::Valve {
            commanded: ValvePosition::Closed,
            actual: ValvePosition::Open,
            ..
        }
    ));
    let json = serde_json::to_string(&snap).unwrap();
    assert!(!json.contains("stuck"));
}
