//! Error taxonomy for the plant core.
//!
//! Sensor and actuator faults are simulated domain events and go through the
//! alarm path; nothing here represents one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AlarmId, ComponentId, ComponentKind, SensorKind};

/// Rejected plant configuration. Fatal at load; the simulator never starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("component id must not be empty")]
    EmptyId,

    #[error("component id '{0}' is declared more than once")]
    DuplicateId(ComponentId),

    #[error("{component} references unknown {expected:?} '{target}' in field '{field}'")]
    DanglingReference {
        component: ComponentId,
        field: &'static str,
        expected: ComponentKind,
        target: ComponentId,
    },

    #[error("tank '{tank}' has non-positive capacity {capacity}")]
    NonPositiveCapacity { tank: ComponentId, capacity: f64 },

    #[error("tank '{tank}' starts with {initial} L, above its capacity of {capacity} L")]
    InitialOverCapacity {
        tank: ComponentId,
        initial: f64,
        capacity: f64,
    },

    #[error("tank '{tank}' has invalid level bands (low {low:?}, high {high:?})")]
    InvalidLevelBands {
        tank: ComponentId,
        low: Option<f64>,
        high: Option<f64>,
    },

    #[error("{what} must be a finite non-negative number, got {value}")]
    InvalidRate { what: String, value: f64 },

    #[error("failure probability for {kind:?} must be within [0, 1], got {value}")]
    InvalidProbability { kind: ComponentKind, value: f64 },

    #[error("pump '{0}' has neither a source tank nor a supply colour")]
    PumpWithoutSource(ComponentId),

    #[error("{kind:?} sensor '{sensor}' cannot observe {target_kind:?} '{target}'")]
    IncompatibleSensor {
        sensor: ComponentId,
        kind: SensorKind,
        target: ComponentId,
        target_kind: ComponentKind,
    },

    #[error("sensor '{sensor}' has an invalid switch point: {reason}")]
    InvalidSwitch { sensor: ComponentId, reason: String },

    #[error("failure rate override names unknown component '{0}'")]
    UnknownOverride(ComponentId),

    #[error("consecutive bad reading threshold must be at least 1")]
    ZeroConsecutiveThreshold,

    #[error("tick duration must be positive and finite, got {0}")]
    NonPositiveTickDuration(f64),

    #[error("setpoint for tank '{tank}' is invalid: {reason}")]
    InvalidSetpoint { tank: ComponentId, reason: String },
}

/// Rejected operator or harness command. Affects nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum CommandError {
    #[error("unknown component '{0}'")]
    UnknownComponent(ComponentId),

    #[error("unknown alarm '{0}'")]
    UnknownAlarm(AlarmId),

    #[error("invalid transition for '{target}': {reason}")]
    InvalidTransition { target: String, reason: String },
}

/// Internal bookkeeping inconsistency. Logged and repaired in place; the
/// simulation keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("alarm stored under '{stored_as}' belongs to '{canonical}'; merged")]
    DuplicateAlarm { stored_as: AlarmId, canonical: AlarmId },
}
