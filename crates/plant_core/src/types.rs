//! Type definitions for `plant_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the simulation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::alarms::AlarmBook;
use crate::paint::{BaseColor, PaintMixture, Rgb};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(ComponentId);
string_id!(AlarmId);
string_id!(EventId);
string_id!(CommandId);

impl AlarmId {
    /// Alarm identity is derived from its content, never from a counter, so a
    /// second alarm for the same (component, kind) pair cannot be minted.
    pub fn for_fault(component_id: &ComponentId, kind: AlarmKind) -> Self {
        Self(format!("{component_id}/{}", kind.label()))
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Tank,
    Valve,
    Pump,
    Sensor,
}

/// Hidden ground truth. `Failed` is sticky until an explicit repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    #[default]
    Healthy,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValvePosition {
    Open,
    #[default]
    Closed,
}

impl ValvePosition {
    pub fn opposite(self) -> Self {
        match self {
            ValvePosition::Open => ValvePosition::Closed,
            ValvePosition::Closed => ValvePosition::Open,
        }
    }
}

/// What the valve is physically doing. A healthy valve follows its command;
/// a failed one is stuck at some position regardless of command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValveActual {
    Open,
    Closed,
    Stuck(ValvePosition),
}

impl ValveActual {
    pub fn position(self) -> ValvePosition {
        match self {
            ValveActual::Open => ValvePosition::Open,
            ValveActual::Closed => ValvePosition::Closed,
            ValveActual::Stuck(position) => position,
        }
    }

    pub fn following(position: ValvePosition) -> Self {
        match position {
            ValvePosition::Open => ValveActual::Open,
            ValvePosition::Closed => ValveActual::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self.position() == ValvePosition::Open
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpMode {
    On,
    #[default]
    Off,
}

impl PumpMode {
    pub fn opposite(self) -> Self {
        match self {
            PumpMode::On => PumpMode::Off,
            PumpMode::Off => PumpMode::On,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Litres in the attached tank.
    Level,
    /// Mixed colour of the attached tank.
    Color,
    /// Litres that passed through the attached valve or pump last tick.
    Flow,
    /// Binary level switch on the attached tank.
    Switch,
}

/// Mounting point of a level switch. Low points trip at or below their
/// level, high points above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPoint {
    VeryLow,
    Low,
    High,
    VeryHigh,
}

impl SwitchPoint {
    pub fn label(self) -> &'static str {
        match self {
            SwitchPoint::VeryLow => "very_low",
            SwitchPoint::Low => "low",
            SwitchPoint::High => "high",
            SwitchPoint::VeryHigh => "very_high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSwitch {
    pub point: SwitchPoint,
    /// Trip level as a fraction of tank capacity.
    pub fraction: f64,
}

impl LevelSwitch {
    /// Contact state for `level` litres in a tank of `capacity` litres.
    pub fn tripped(&self, level: f64, capacity: f64) -> bool {
        let trip_at = self.fraction * capacity;
        match self.point {
            SwitchPoint::VeryLow | SwitchPoint::Low => level <= trip_at,
            SwitchPoint::High | SwitchPoint::VeryHigh => level > trip_at,
        }
    }
}

/// A sensor's most recent observable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    Scalar(f64),
    Color(Rgb),
    /// Colour sensor looking at an empty tank.
    Blank,
    /// Level switch contact; `true` when tripped.
    Switch(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    /// Sensor reading outside its plausible range for N consecutive ticks.
    SensorFault,
    /// Valve or pump reports a state different from its command.
    ActuatorFault,
    /// Tank level falling with nothing drawing from it.
    Leak,
    /// Tank level rising with nothing feeding it.
    UncontrolledInflow,
    /// Tank drained by an open outlet but the level does not move.
    Stagnation,
    /// Level and colour sensors on one tank disagree about emptiness.
    SensorConflict,
    /// A level switch disagrees with the continuous level reading.
    LevelConflict(SwitchPoint),
    LevelLow,
    LevelHigh,
    Empty,
    /// An outlet is draining a non-empty tank.
    Emptying,
}

impl AlarmKind {
    pub fn label(self) -> &'static str {
        match self {
            AlarmKind::SensorFault => "sensor_fault",
            AlarmKind::ActuatorFault => "actuator_fault",
            AlarmKind::Leak => "leak",
            AlarmKind::UncontrolledInflow => "uncontrolled_inflow",
            AlarmKind::Stagnation => "stagnation",
            AlarmKind::SensorConflict => "sensor_conflict",
            AlarmKind::LevelConflict(SwitchPoint::VeryLow) => "level_conflict_very_low",
            AlarmKind::LevelConflict(SwitchPoint::Low) => "level_conflict_low",
            AlarmKind::LevelConflict(SwitchPoint::High) => "level_conflict_high",
            AlarmKind::LevelConflict(SwitchPoint::VeryHigh) => "level_conflict_very_high",
            AlarmKind::LevelLow => "level_low",
            AlarmKind::LevelHigh => "level_high",
            AlarmKind::Empty => "empty",
            AlarmKind::Emptying => "emptying",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AlarmKind::SensorFault => "Sensor reading implausible",
            AlarmKind::ActuatorFault => "Actuator does not follow its command",
            AlarmKind::Leak => "The tank is leaking",
            AlarmKind::UncontrolledInflow => "Uncontrolled inflow to tank",
            AlarmKind::Stagnation => "Level stagnation",
            AlarmKind::SensorConflict => "Level and colour sensors disagree",
            AlarmKind::LevelConflict(SwitchPoint::VeryLow) => "Level conflict: very low",
            AlarmKind::LevelConflict(SwitchPoint::Low) => "Level conflict: low",
            AlarmKind::LevelConflict(SwitchPoint::High) => "Level conflict: high",
            AlarmKind::LevelConflict(SwitchPoint::VeryHigh) => "Level conflict: very high",
            AlarmKind::LevelLow => "The tank level is low",
            AlarmKind::LevelHigh => "The tank level is very high",
            AlarmKind::Empty => "The tank is empty",
            AlarmKind::Emptying => "The tank is currently emptying",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            AlarmKind::ActuatorFault | AlarmKind::Leak | AlarmKind::UncontrolledInflow => {
                Severity::Critical
            }
            AlarmKind::SensorFault
            | AlarmKind::Stagnation
            | AlarmKind::SensorConflict
            | AlarmKind::LevelConflict(_)
            | AlarmKind::LevelLow
            | AlarmKind::LevelHigh
            | AlarmKind::Empty => Severity::Warning,
            AlarmKind::Emptying => Severity::Info,
        }
    }

    /// Alarm a Failed component of `kind` is held under when no symptom
    /// rule has flagged it yet.
    pub fn for_failure(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Tank => AlarmKind::Leak,
            ComponentKind::Valve | ComponentKind::Pump => AlarmKind::ActuatorFault,
            ComponentKind::Sensor => AlarmKind::SensorFault,
        }
    }
}

impl std::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantState {
    pub meta: MetaState,
    pub tanks: BTreeMap<ComponentId, TankState>,
    pub valves: BTreeMap<ComponentId, ValveState>,
    pub pumps: BTreeMap<ComponentId, PumpState>,
    pub sensors: BTreeMap<ComponentId, SensorState>,
    pub alarms: AlarmBook,
    /// Append-only audit log. Never mutated or reordered after push.
    pub events: Vec<EventEnvelope>,
    pub detection: DetectionMemory,
    pub counters: Counters,
}

impl PlantState {
    pub fn component_kind(&self, id: &ComponentId) -> Option<ComponentKind> {
        if self.tanks.contains_key(id) {
            Some(ComponentKind::Tank)
        } else if self.valves.contains_key(id) {
            Some(ComponentKind::Valve)
        } else if self.pumps.contains_key(id) {
            Some(ComponentKind::Pump)
        } else if self.sensors.contains_key(id) {
            Some(ComponentKind::Sensor)
        } else {
            None
        }
    }

    pub fn health(&self, id: &ComponentId) -> Option<Health> {
        self.tanks
            .get(id)
            .map(|t| t.status)
            .or_else(|| self.valves.get(id).map(|v| v.status))
            .or_else(|| self.pumps.get(id).map(|p| p.status))
            .or_else(|| self.sensors.get(id).map(|s| s.status))
    }

    pub(crate) fn health_mut(&mut self, id: &ComponentId) -> Option<&mut Health> {
        if let Some(tank) = self.tanks.get_mut(id) {
            return Some(&mut tank.status);
        }
        if let Some(valve) = self.valves.get_mut(id) {
            return Some(&mut valve.status);
        }
        if let Some(pump) = self.pumps.get_mut(id) {
            return Some(&mut pump.status);
        }
        self.sensors.get_mut(id).map(|s| &mut s.status)
    }

    /// Component ids in trial order: tanks, valves, pumps, sensors, each sorted.
    pub fn component_ids(&self) -> impl Iterator<Item = &ComponentId> {
        self.tanks
            .keys()
            .chain(self.valves.keys())
            .chain(self.pumps.keys())
            .chain(self.sensors.keys())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    /// Index of the next tick to run. Strictly increasing.
    pub tick: u64,
    pub seed: u64,
    pub schema_version: u32,
    pub config_version: String,
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankState {
    pub id: ComponentId,
    pub capacity: f64,
    pub contents: PaintMixture,
    pub status: Health,
    /// Base paint used by the `Fill` command, if the tank has a supply.
    pub fill_color: Option<BaseColor>,
    pub level_bands: LevelBands,
    /// Valves whose source is this tank.
    pub outlets: SmallVec<[ComponentId; 4]>,
    /// Litres received / released during the last tick.
    pub last_inflow: f64,
    pub last_outflow: f64,
    pub last_spill: f64,
    /// Tick of the last operator fill or flush.
    pub manual_change_tick: Option<u64>,
}

impl TankState {
    pub fn level(&self) -> f64 {
        self.contents.volume()
    }

    pub fn level_fraction(&self) -> f64 {
        self.level() / self.capacity
    }

    /// Colour is only meaningful while the tank holds paint.
    pub fn color(&self) -> Option<Rgb> {
        self.contents.color()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValveState {
    pub id: ComponentId,
    /// Owning tank (weak reference by id).
    pub tank: ComponentId,
    /// Destination tank; `None` drains out of the plant.
    pub to: Option<ComponentId>,
    /// Litres per simulated second when open.
    pub flow_rate: f64,
    pub commanded: ValvePosition,
    pub actual: ValveActual,
    pub status: Health,
    pub last_flow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpState {
    pub id: ComponentId,
    /// Source tank; `None` draws from the external `supply`.
    pub from: Option<ComponentId>,
    /// Destination tank; `None` discharges out of the plant.
    pub to: Option<ComponentId>,
    pub supply: Option<BaseColor>,
    /// Litres per simulated second when running.
    pub rate: f64,
    pub commanded: PumpMode,
    pub actual: PumpMode,
    pub status: Health,
    pub last_flow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorState {
    pub id: ComponentId,
    pub kind: SensorKind,
    /// Observed component (weak reference by id).
    pub attached_to: ComponentId,
    pub status: Health,
    /// Upper bound of the plausible scalar range; the lower bound is zero.
    /// Unused by colour sensors, which check channel ranges instead.
    pub plausible_max: f64,
    /// Trip point; set for switch sensors only.
    #[serde(default)]
    pub switch: Option<LevelSwitch>,
    pub last_reading: Option<Reading>,
    /// Set on failure; fixed for the lifetime of that failure.
    pub corruption: Option<SensorCorruption>,
}

impl SensorState {
    /// Whether `reading` is something a healthy sensor of this kind could report.
    pub fn is_plausible(&self, reading: &Reading) -> bool {
        match (self.kind, reading) {
            (SensorKind::Level | SensorKind::Flow, Reading::Scalar(value)) => {
                value.is_finite() && *value >= 0.0 && *value <= self.plausible_max + 1e-9
            }
            (SensorKind::Color, Reading::Color(rgb)) => rgb.is_valid(),
            (SensorKind::Color, Reading::Blank) | (SensorKind::Switch, Reading::Switch(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorCorruption {
    /// Keeps reporting the last pre-failure reading.
    Frozen(Option<Reading>),
    /// Reports a value outside the plausible range.
    OutOfRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelBands {
    /// Fraction of capacity at or below which `LevelLow` is raised.
    pub low: Option<f64>,
    /// Fraction of capacity at or above which `LevelHigh` is raised.
    pub high: Option<f64>,
    /// Raise `Empty` when the level reads zero.
    #[serde(default)]
    pub empty: bool,
    /// Raise `Emptying` while an outlet drains the tank.
    #[serde(default)]
    pub emptying: bool,
}

/// Per-tick detection memory, keyed by tick so a second pass over the same
/// tick reuses the first pass's observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionMemory {
    pub sensor_streaks: BTreeMap<ComponentId, Streak>,
    pub level_trends: BTreeMap<ComponentId, LevelTrend>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Streak {
    pub evaluated_at: Option<u64>,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LevelTrend {
    pub evaluated_at: Option<u64>,
    pub previous: Option<f64>,
    pub current: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Active,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub component_id: ComponentId,
    pub kind: AlarmKind,
    pub severity: Severity,
    pub state: AlarmState,
    pub acknowledged: bool,
    /// Tick of the most recent raise.
    pub raised_at: u64,
    pub cleared_at: Option<u64>,
    /// How many times this identity has gone Active.
    pub occurrences: u32,
}

impl Alarm {
    pub fn is_active(&self) -> bool {
        self.state == AlarmState::Active
    }
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SetValve {
        valve_id: ComponentId,
        position: ValvePosition,
    },
    SetPump {
        pump_id: ComponentId,
        mode: PumpMode,
    },
    /// Maintenance: Failed -> Healthy.
    Repair { component_id: ComponentId },
    Acknowledge { alarm_id: AlarmId },
    Fill { tank_id: ComponentId },
    Flush { tank_id: ComponentId },
    /// Test harness: failure probability 1.0 on the next injection pass only.
    ForceFault { component_id: ComponentId },
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub component_id: ComponentId,
    pub severity: Severity,
    pub description: String,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AlarmRaised { alarm_id: AlarmId, kind: AlarmKind },
    AlarmCleared { alarm_id: AlarmId, kind: AlarmKind },
    AlarmAcknowledged { alarm_id: AlarmId },
    /// A misfiled alarm entry was folded into its canonical identity.
    AlarmMerged { alarm_id: AlarmId },
    ValveCommanded { position: ValvePosition },
    PumpCommanded { mode: PumpMode },
    ComponentRepaired,
    TankFilled { litres: f64 },
    TankFlushed { litres: f64 },
}

/// Hidden failure produced by the fault injector. Never enters the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub component_id: ComponentId,
    pub kind: ComponentKind,
    pub tick: u64,
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    pub config_version: String,
    pub timing: TimingDef,
    pub tanks: Vec<TankDef>,
    pub valves: Vec<ValveDef>,
    pub pumps: Vec<PumpDef>,
    pub sensors: Vec<SensorDef>,
    pub faults: FaultConfig,
    pub detection: DetectionConfig,
    pub setpoints: Vec<SetpointDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingDef {
    /// Simulated seconds advanced per tick.
    pub tick_seconds: f64,
    /// Wall-clock period between ticks when run live.
    pub tick_period_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankDef {
    pub id: ComponentId,
    pub capacity: f64,
    #[serde(default)]
    pub initial: PaintMixture,
    #[serde(default)]
    pub fill_color: Option<BaseColor>,
    #[serde(default)]
    pub level_bands: LevelBands,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValveDef {
    pub id: ComponentId,
    pub tank: ComponentId,
    #[serde(default)]
    pub to: Option<ComponentId>,
    pub flow_rate: f64,
    #[serde(default)]
    pub initial: ValvePosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpDef {
    pub id: ComponentId,
    #[serde(default)]
    pub from: Option<ComponentId>,
    #[serde(default)]
    pub to: Option<ComponentId>,
    #[serde(default)]
    pub supply: Option<BaseColor>,
    pub rate: f64,
    #[serde(default)]
    pub initial: PumpMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDef {
    pub id: ComponentId,
    pub kind: SensorKind,
    pub attached_to: ComponentId,
    /// Required for `Switch` sensors, rejected for every other kind.
    #[serde(default)]
    pub switch: Option<LevelSwitch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    pub failure_rates: FailureRates,
    pub sensor_policy: SensorFaultPolicy,
    pub actuator_mode: ActuatorFaultMode,
    /// Litres per simulated second lost by a failed tank.
    pub tank_leak_rate: f64,
    /// Per-component probabilities that replace the kind's rate, e.g. a
    /// refill pump that wears faster than the outlet valves.
    #[serde(default)]
    pub rate_overrides: BTreeMap<ComponentId, f64>,
}

impl FaultConfig {
    pub fn failure_rate(&self, id: &ComponentId, kind: ComponentKind) -> f64 {
        self.rate_overrides
            .get(id)
            .copied()
            .unwrap_or_else(|| self.failure_rates.for_kind(kind))
    }
}

/// Per-tick failure probability for each component kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FailureRates {
    pub tank: f64,
    pub valve: f64,
    pub pump: f64,
    pub sensor: f64,
}

impl FailureRates {
    pub fn for_kind(&self, kind: ComponentKind) -> f64 {
        match kind {
            ComponentKind::Tank => self.tank,
            ComponentKind::Valve => self.valve,
            ComponentKind::Pump => self.pump,
            ComponentKind::Sensor => self.sensor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFaultPolicy {
    Freeze,
    #[default]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorFaultMode {
    /// Sticks at the opposite of whatever it was commanded to at failure time.
    #[default]
    StuckOpposite,
    /// Sticks wherever it physically was at failure time.
    StuckInPlace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Consecutive implausible readings before a `SensorFault` is raised.
    pub consecutive_bad_readings: u32,
    /// Litres of level change treated as noise by the trend rules.
    pub trend_tolerance: f64,
    /// Enables the level-vs-colour corroboration rule.
    pub cross_check: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            consecutive_bad_readings: 1,
            trend_tolerance: 0.01,
            cross_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetpointDef {
    pub tank: ComponentId,
    /// Level sensor the controller reads.
    pub sensor: ComponentId,
    /// Target level in litres.
    pub target: f64,
    pub deadband: f64,
    /// Valves or pumps that raise the tank's level.
    pub feeders: Vec<ComponentId>,
}
