//! `plant_core`: deterministic paint plant simulation tick.
//!
//! No IO, no network, no clocks. All randomness via the passed-in Rng.

mod alarms;
mod commands;
mod config;
mod engine;
pub mod error;
mod faults;
pub mod paint;
mod simulator;
mod snapshot;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use alarms::AlarmBook;
pub use commands::{validate_command, CommandOutcome};
pub use config::{initial_state, validate_config, SCHEMA_VERSION};
pub use engine::{run_detection, tick, TickReport};
pub use error::{CommandError, ConfigError, InvariantViolation};
pub use faults::inject;
pub use simulator::{advance, FlowReport, OUT_OF_RANGE_SCALAR};
pub use snapshot::{events_since, snapshot, ComponentView, Snapshot};
pub use types::*;

pub(crate) fn emit(
    counters: &mut Counters,
    tick: u64,
    component_id: ComponentId,
    severity: Severity,
    description: String,
    event: Event,
) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        tick,
        component_id,
        severity,
        description,
        event,
    }
}

#[cfg(test)]
mod tests;
