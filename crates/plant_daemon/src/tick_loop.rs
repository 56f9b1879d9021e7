use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use plant_control::{CommandSource, SetpointController};
use plant_core::{PlantConfig, PlantState};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use crate::state::{AppState, EventTx, SharedHistory, SharedQueue};

/// Everything the tick loop owns exclusively.
pub struct SimState {
    pub plant: PlantState,
    pub config: PlantConfig,
    pub rng: ChaCha8Rng,
    /// `None` runs the plant with no automatic control.
    pub controller: Option<SetpointController>,
}

/// Channels the loop writes to after every tick.
pub struct Outputs {
    pub plant_tx: watch::Sender<Arc<PlantState>>,
    pub commands: SharedQueue,
    pub history: SharedHistory,
    pub event_tx: EventTx,
}

impl Outputs {
    /// Matching read side for the HTTP handlers.
    pub fn app_state(
        &self,
        paused: Arc<std::sync::atomic::AtomicBool>,
        shutdown: watch::Receiver<bool>,
        tick_period_ms: u64,
    ) -> AppState {
        AppState {
            plant: self.plant_tx.subscribe(),
            commands: Arc::clone(&self.commands),
            history: Arc::clone(&self.history),
            event_tx: self.event_tx.clone(),
            paused,
            shutdown,
            tick_period_ms,
        }
    }
}

/// Runs one tick: drains queued commands, asks the controller for more,
/// advances the plant and publishes the result.
pub fn step(sim: &mut SimState, out: &Outputs) {
    let started = Instant::now();
    let commands = {
        let mut queue = out.commands.lock();
        let mut commands = std::mem::take(&mut queue.pending);
        if let Some(controller) = sim.controller.as_mut() {
            commands.extend(controller.generate_commands(
                &sim.plant,
                &sim.config,
                &mut queue.next_id,
            ));
        }
        sim.plant.counters.next_command_id = queue.next_id;
        commands
    };

    let report = plant_core::tick(&mut sim.plant, &commands, &sim.config, &mut sim.rng);

    for outcome in &report.command_results {
        if let Some(err) = &outcome.error {
            tracing::warn!(command_id = %outcome.command_id, error = %err, "command rejected");
        }
    }
    out.history.lock().record(&sim.plant);
    out.plant_tx.send_replace(Arc::new(sim.plant.clone()));
    // No subscribers is not an error.
    let _ = out.event_tx.send(report.events);

    tracing::debug!(
        tick = sim.plant.meta.tick,
        commands = commands.len(),
        elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        "tick complete"
    );
}

/// Fixed-rate loop. Stops after `max_ticks` or when `shutdown` flips; a tick
/// that has started always finishes.
pub async fn run_tick_loop(
    mut sim: SimState,
    out: Outputs,
    paused: Arc<std::sync::atomic::AtomicBool>,
    period: Duration,
    max_ticks: Option<u64>,
    mut shutdown: watch::Receiver<bool>,
) -> SimState {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(
        tick = sim.plant.meta.tick,
        period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        ?max_ticks,
        "tick loop started"
    );

    loop {
        if max_ticks.is_some_and(|max| sim.plant.meta.tick >= max) {
            tracing::info!(tick = sim.plant.meta.tick, "max ticks reached");
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        if paused.load(Ordering::Relaxed) {
            continue;
        }
        step(&mut sim, &out);
    }

    tracing::info!(tick = sim.plant.meta.tick, "tick loop stopped");
    sim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::state::CommandQueue;
    use plant_core::test_fixtures::{base_state, cid, make_rng, single_tank_config};
    use plant_core::{Command, PumpMode};
    use std::sync::atomic::AtomicBool;
    use tokio::sync::broadcast;

    fn make_sim() -> (SimState, Outputs) {
        let config = single_tank_config();
        let plant = base_state(&config);
        let (plant_tx, _) = watch::channel(Arc::new(plant.clone()));
        let (event_tx, _) = broadcast::channel(64);
        let out = Outputs {
            plant_tx,
            commands: Arc::new(parking_lot::Mutex::new(CommandQueue::new(0))),
            history: Arc::new(parking_lot::Mutex::new(History::default())),
            event_tx,
        };
        let sim = SimState {
            plant,
            config,
            rng: make_rng(),
            controller: None,
        };
        (sim, out)
    }

    #[test]
    fn test_step_applies_queued_commands_and_publishes() {
        let (mut sim, out) = make_sim();
        let rx = out.plant_tx.subscribe();
        out.commands.lock().submit(
            0,
            Command::SetPump {
                pump_id: cid("pump_a"),
                mode: PumpMode::On,
            },
        );

        step(&mut sim, &out);

        assert!(out.commands.lock().pending.is_empty());
        let published = rx.borrow().clone();
        assert_eq!(published.meta.tick, 1);
        assert_eq!(published.counters.next_command_id, 1);
        assert!((published.tanks[&cid("tank_a")].level() - 10.0).abs() < 1e-9);
        assert_eq!(out.history.lock().samples(&cid("tank_a")).unwrap().len(), 1);
    }

    #[test]
    fn test_step_broadcasts_tick_events() {
        let (mut sim, out) = make_sim();
        let mut events_rx = out.event_tx.subscribe();
        out.commands.lock().submit(
            0,
            Command::SetPump {
                pump_id: cid("pump_a"),
                mode: PumpMode::On,
            },
        );

        step(&mut sim, &out);

        let batch = events_rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].component_id, cid("pump_a"));
    }

    #[tokio::test]
    async fn test_loop_stops_at_max_ticks() {
        let (sim, out) = make_sim();
        let rx = out.plant_tx.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let sim = run_tick_loop(
            sim,
            out,
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(1),
            Some(3),
            shutdown_rx,
        )
        .await;

        assert_eq!(sim.plant.meta.tick, 3);
        assert_eq!(rx.borrow().meta.tick, 3);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let (sim, out) = make_sim();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_tick_loop(
            sim,
            out,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(1),
            None,
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        let sim = handle.await.unwrap();

        // Paused the whole time, so nothing advanced.
        assert_eq!(sim.plant.meta.tick, 0);
    }
}
