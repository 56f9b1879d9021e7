use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plant_control::{CommandSource, SetpointController};
use plant_core::{
    AlarmState, Event, EventEnvelope, PlantConfig, PlantState, SensorDef, SensorKind,
};
use plant_world::{
    load_config, load_plant, make_rng, parse_override, read_checkpoint, time_seed,
    write_checkpoint,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "plant_cli", about = "Paint plant simulator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation headless for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Seed for the fault injector. Defaults to the wall clock.
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Resume from a checkpoint written by `--dump-state`. The fault
        /// stream continues where the checkpoint left it.
        #[arg(long = "state", conflicts_with = "seed")]
        state_file: Option<String>,
        #[arg(long, default_value = "./content")]
        config_dir: String,
        #[arg(long, default_value_t = 10)]
        print_every: u64,
        /// Run without the setpoint controller; nothing commands the plant.
        #[arg(long)]
        no_control: bool,
        /// Override a scalar parameter, e.g. `--set failure_rate_valve=0.01`.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Write a checkpoint (final state plus RNG position) to this path.
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Validate a configuration directory and print a topology summary.
    Check {
        #[arg(long, default_value = "./content")]
        config_dir: String,
    },
}

struct RunArgs {
    ticks: u64,
    seed: Option<u64>,
    state_file: Option<String>,
    config_dir: String,
    print_every: u64,
    no_control: bool,
    overrides: Vec<String>,
    dump_state: Option<String>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(args: RunArgs) -> Result<()> {
    let overrides = args
        .overrides
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let seed = args.seed.unwrap_or_else(|| {
        let seed = time_seed();
        tracing::info!(seed, "no --seed given, using wall-clock seed");
        seed
    });
    let (config, state) = load_plant(&args.config_dir, &overrides, seed)?;
    let (mut state, mut rng) = match &args.state_file {
        Some(path) => read_checkpoint(Path::new(path))?.resume(),
        None => {
            let rng = make_rng(state.meta.seed);
            (state, rng)
        }
    };

    let mut controller = SetpointController;
    let print_every = args.print_every.max(1);

    println!(
        "Starting simulation: ticks={} seed={} tanks={} config_version={} control={}",
        args.ticks,
        state.meta.seed,
        state.tanks.len(),
        state.meta.config_version,
        if args.no_control { "off" } else { "setpoints" },
    );
    println!("{}", "-".repeat(80));

    for _ in 0..args.ticks {
        let commands = if args.no_control {
            Vec::new()
        } else {
            let mut next_command_id = state.counters.next_command_id;
            let commands = controller.generate_commands(&state, &config, &mut next_command_id);
            state.counters.next_command_id = next_command_id;
            commands
        };

        let report = plant_core::tick(&mut state, &commands, &config, &mut rng);

        for outcome in &report.command_results {
            if let Some(err) = &outcome.error {
                tracing::warn!(command_id = %outcome.command_id.0, error = %err, "command rejected");
            }
        }
        for event in &report.events {
            print_alarm_transition(event);
        }

        if state.meta.tick % print_every == 0 {
            print_status(&state);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);
    print_alarm_table(&state);

    if let Some(path) = &args.dump_state {
        write_checkpoint(Path::new(path), &state, &rng)?;
        println!("Checkpoint written to {path}");
    }

    Ok(())
}

fn print_alarm_transition(event: &EventEnvelope) {
    let transition = match &event.event {
        Event::AlarmRaised { alarm_id, .. } => format!("RAISED   {alarm_id}"),
        Event::AlarmCleared { alarm_id, .. } => format!("CLEARED  {alarm_id}"),
        Event::AlarmAcknowledged { alarm_id } => format!("ACKED    {alarm_id}"),
        Event::AlarmMerged { alarm_id } => format!("MERGED   {alarm_id}"),
        _ => return,
    };
    println!(
        "*** [tick={:04}] {transition} ({:?}) {} ***",
        event.tick, event.severity, event.description
    );
}

fn print_status(state: &PlantState) {
    let tanks: Vec<String> = state
        .tanks
        .values()
        .map(|tank| {
            let color = tank.color().map_or_else(|| "-".to_string(), |c| c.to_hex());
            format!("{}={:.1}L {color}", tank.id, tank.level())
        })
        .collect();
    let active = state.alarms.active().count();

    println!(
        "[tick={:04}]  alarms={active:2}  {}",
        state.meta.tick,
        tanks.join("  ")
    );
}

fn print_alarm_table(state: &PlantState) {
    if state.alarms.is_empty() {
        println!("No alarms recorded.");
        return;
    }
    println!(
        "{:<36} {:<9} {:<8} {:<5} {:>7} {:>7} {:>5}",
        "alarm", "severity", "state", "ack", "raised", "cleared", "count"
    );
    for alarm in state.alarms.iter() {
        let state_label = match alarm.state {
            AlarmState::Active => "active",
            AlarmState::Cleared => "cleared",
        };
        let cleared = alarm
            .cleared_at
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        println!(
            "{:<36} {:<9} {:<8} {:<5} {:>7} {:>7} {:>5}",
            alarm.id.0,
            format!("{:?}", alarm.severity),
            state_label,
            alarm.acknowledged,
            alarm.raised_at,
            cleared,
            alarm.occurrences,
        );
    }
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

fn check(config_dir: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    plant_core::validate_config(&config)
        .with_context(|| format!("invalid plant configuration in {config_dir}"))?;

    println!("Configuration OK: {config_dir} ({})", config.config_version);
    println!(
        "  tanks={} valves={} pumps={} sensors={} setpoints={}",
        config.tanks.len(),
        config.valves.len(),
        config.pumps.len(),
        config.sensors.len(),
        config.setpoints.len(),
    );
    print_topology(&config);
    Ok(())
}

fn print_topology(config: &PlantConfig) {
    for tank in &config.tanks {
        let sensors: Vec<String> = config
            .sensors
            .iter()
            .filter(|s| s.attached_to == tank.id)
            .map(|s| format!("{}({})", s.id, sensor_label(s)))
            .collect();
        println!(
            "  tank {} capacity={}L initial={:.1}L sensors=[{}]",
            tank.id,
            tank.capacity,
            tank.initial.volume(),
            sensors.join(", ")
        );
    }
    for valve in &config.valves {
        let to = valve
            .to
            .as_ref()
            .map_or_else(|| "drain".to_string(), ToString::to_string);
        println!(
            "  valve {} {} -> {to} at {} L/s",
            valve.id, valve.tank, valve.flow_rate
        );
    }
    for pump in &config.pumps {
        let from = match (&pump.from, pump.supply) {
            (Some(tank), _) => tank.to_string(),
            (None, Some(color)) => format!("supply:{color:?}"),
            (None, None) => "?".to_string(),
        };
        let to = pump
            .to
            .as_ref()
            .map_or_else(|| "drain".to_string(), ToString::to_string);
        println!("  pump {} {from} -> {to} at {} L/s", pump.id, pump.rate);
    }
    let flow_sensors = config
        .sensors
        .iter()
        .filter(|s| s.kind == SensorKind::Flow)
        .count();
    println!(
        "  faults: {:?} sensors, {:?} actuators, leak {} L/s; {flow_sensors} flow sensor(s)",
        config.faults.sensor_policy, config.faults.actuator_mode, config.faults.tank_leak_rate,
    );
    for (id, rate) in &config.faults.rate_overrides {
        println!("  failure rate override: {id} = {rate}");
    }
}

fn sensor_label(sensor: &SensorDef) -> String {
    match (sensor.kind, sensor.switch) {
        (SensorKind::Switch, Some(switch)) => {
            format!("switch:{}@{:.2}", switch.point.label(), switch.fraction)
        }
        (SensorKind::Level, _) => "level".to_string(),
        (SensorKind::Color, _) => "color".to_string(),
        (SensorKind::Flow, _) => "flow".to_string(),
        (SensorKind::Switch, None) => "switch".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            state_file,
            config_dir,
            print_every,
            no_control,
            overrides,
            dump_state,
        } => run(RunArgs {
            ticks,
            seed,
            state_file,
            config_dir,
            print_every,
            no_control,
            overrides,
            dump_state,
        })?,
        Commands::Check { config_dir } => check(&config_dir)?,
    }
    Ok(())
}
