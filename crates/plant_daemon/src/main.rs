mod history;
mod routes;
mod state;
mod tick_loop;

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use plant_control::SetpointController;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;

use crate::history::History;
use crate::state::CommandQueue;
use crate::tick_loop::{Outputs, SimState};

#[derive(Parser)]
#[command(name = "plant_daemon", about = "Paint plant simulator daemon")]
struct Cli {
    #[arg(long, default_value = "./content")]
    config_dir: String,
    /// Seed for the fault injector. Defaults to the wall clock.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind: String,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Wall-clock milliseconds between ticks. Defaults to the configured period.
    #[arg(long)]
    tick_period_ms: Option<u64>,
    /// Stop ticking after this many ticks; the server keeps answering.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Start paused; resume with `POST /api/v1/resume`.
    #[arg(long)]
    paused: bool,
    /// Run without the setpoint controller.
    #[arg(long)]
    no_control: bool,
    /// Override a scalar parameter, e.g. `--set failure_rate_valve=0.01`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("ctrl-c received, shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let overrides = cli
        .overrides
        .iter()
        .map(|raw| plant_world::parse_override(raw))
        .collect::<Result<BTreeMap<_, _>>>()?;
    let seed = cli.seed.unwrap_or_else(|| {
        let seed = plant_world::time_seed();
        tracing::info!(seed, "no --seed given, using wall-clock seed");
        seed
    });
    let (config, plant) = plant_world::load_plant(&cli.config_dir, &overrides, seed)?;
    let tick_period_ms = cli.tick_period_ms.unwrap_or(config.timing.tick_period_ms).max(1);
    let cors_origin: HeaderValue = cli
        .cors_origin
        .parse()
        .with_context(|| format!("invalid CORS origin '{}'", cli.cors_origin))?;

    let (plant_tx, _) = watch::channel(Arc::new(plant.clone()));
    let (event_tx, _) = broadcast::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let paused = Arc::new(AtomicBool::new(cli.paused));

    let outputs = Outputs {
        plant_tx,
        commands: Arc::new(parking_lot::Mutex::new(CommandQueue::new(
            plant.counters.next_command_id,
        ))),
        history: Arc::new(parking_lot::Mutex::new(History::default())),
        event_tx,
    };
    let app_state = outputs.app_state(Arc::clone(&paused), shutdown_rx.clone(), tick_period_ms);
    let sim = SimState {
        rng: plant_world::make_rng(plant.meta.seed),
        plant,
        config,
        controller: (!cli.no_control).then_some(SetpointController),
    };

    let tick_handle = tokio::spawn(tick_loop::run_tick_loop(
        sim,
        outputs,
        paused,
        Duration::from_millis(tick_period_ms),
        cli.max_ticks,
        shutdown_rx,
    ));

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    tracing::info!(
        "plant_daemon listening on http://{}  seed={seed}  tick_period={tick_period_ms}ms",
        cli.bind
    );

    let app = routes::make_router_with_cors(app_state, cors_origin);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_ctrl_c().await;
            // Stops the tick loop and any open event streams.
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("serving HTTP")?;

    let sim = tick_handle.await.context("tick loop task failed")?;
    tracing::info!(
        tick = sim.plant.meta.tick,
        events = sim.plant.events.len(),
        active_alarms = sim.plant.alarms.active().count(),
        "plant_daemon stopped"
    );
    Ok(())
}
