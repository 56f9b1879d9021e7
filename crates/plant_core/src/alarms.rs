//! Alarm book and detection rules.
//!
//! The symptom rules read observable values only: sensor readings, commanded
//! states and actuator position feedback. Hidden component health is read in
//! two places. A Failed component is always held under its failure alarm,
//! even while the fault has no visible symptom yet (a frozen sensor, an
//! actuator stuck where it was commanded, a leaking tank that is already
//! empty). And Active -> Cleared waits for the component to be Healthy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, InvariantViolation};
use crate::{
    Alarm, AlarmId, AlarmKind, AlarmState, ComponentId, DetectionConfig, DetectionMemory, Event,
    EventEnvelope, Health, PlantState, Reading, SensorKind, Severity, TankState,
};

/// Alarms keyed by their content-derived identity. Entries are never removed;
/// a cleared alarm stays for audit and is re-raised in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmBook(BTreeMap<AlarmId, Alarm>);

impl AlarmBook {
    pub fn get(&self, id: &AlarmId) -> Option<&Alarm> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &AlarmId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.0.values()
    }

    pub fn active(&self) -> impl Iterator<Item = &Alarm> {
        self.0.values().filter(|alarm| alarm.is_active())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Moves the alarm for `(component_id, kind)` to Active(unacked).
    /// Returns `None` when it is already active.
    fn raise(&mut self, component_id: &ComponentId, kind: AlarmKind, tick: u64) -> Option<AlarmId> {
        let id = AlarmId::for_fault(component_id, kind);
        match self.0.get_mut(&id) {
            Some(alarm) if alarm.is_active() => None,
            Some(alarm) => {
                alarm.state = AlarmState::Active;
                alarm.acknowledged = false;
                alarm.raised_at = tick;
                alarm.cleared_at = None;
                alarm.occurrences += 1;
                Some(id)
            }
            None => {
                self.0.insert(
                    id.clone(),
                    Alarm {
                        id: id.clone(),
                        component_id: component_id.clone(),
                        kind,
                        severity: kind.severity(),
                        state: AlarmState::Active,
                        acknowledged: false,
                        raised_at: tick,
                        cleared_at: None,
                        occurrences: 1,
                    },
                );
                Some(id)
            }
        }
    }

    fn clear(&mut self, id: &AlarmId, tick: u64) {
        if let Some(alarm) = self.0.get_mut(id) {
            alarm.state = AlarmState::Cleared;
            alarm.cleared_at = Some(tick);
        }
    }

    /// Sets the acknowledged flag. Leaves Active/Cleared untouched.
    pub(crate) fn acknowledge(&mut self, id: &AlarmId) -> Result<(), CommandError> {
        let alarm = self
            .0
            .get_mut(id)
            .ok_or_else(|| CommandError::UnknownAlarm(id.clone()))?;
        if alarm.acknowledged {
            return Err(CommandError::InvalidTransition {
                target: id.to_string(),
                reason: "alarm is already acknowledged".to_string(),
            });
        }
        alarm.acknowledged = true;
        Ok(())
    }

    /// Finds entries filed under a key that does not match their content and
    /// folds them into the canonical entry.
    pub(crate) fn audit(&mut self) -> Vec<InvariantViolation> {
        let misfiled: Vec<AlarmId> = self
            .0
            .iter()
            .filter(|(key, alarm)| {
                **key != AlarmId::for_fault(&alarm.component_id, alarm.kind) || alarm.id != **key
            })
            .map(|(key, _)| key.clone())
            .collect();

        let mut violations = Vec::new();
        for stored_as in misfiled {
            let Some(mut stray) = self.0.remove(&stored_as) else {
                continue;
            };
            let canonical = AlarmId::for_fault(&stray.component_id, stray.kind);
            stray.id = canonical.clone();
            let merged = match self.0.remove(&canonical) {
                Some(existing) => merge_alarms(existing, stray),
                None => stray,
            };
            self.0.insert(canonical.clone(), merged);
            violations.push(InvariantViolation::DuplicateAlarm {
                stored_as,
                canonical,
            });
        }
        violations
    }
}

fn merge_alarms(a: Alarm, b: Alarm) -> Alarm {
    let active = a.is_active() || b.is_active();
    Alarm {
        state: if active {
            AlarmState::Active
        } else {
            AlarmState::Cleared
        },
        acknowledged: a.acknowledged && b.acknowledged,
        raised_at: a.raised_at.max(b.raised_at),
        cleared_at: if active {
            None
        } else {
            a.cleared_at.max(b.cleared_at)
        },
        occurrences: a.occurrences.max(b.occurrences),
        ..a
    }
}

// ---------------------------------------------------------------------------
// Detection pass
// ---------------------------------------------------------------------------

type Candidates = BTreeMap<AlarmId, (ComponentId, AlarmKind)>;

fn add_candidate(candidates: &mut Candidates, component_id: &ComponentId, kind: AlarmKind) {
    candidates.insert(
        AlarmId::for_fault(component_id, kind),
        (component_id.clone(), kind),
    );
}

/// Runs every detection rule for `tick` and reconciles the alarm book.
/// Running it twice for the same tick changes nothing the second time.
pub(crate) fn detect(
    state: &mut PlantState,
    tick: u64,
    config: &DetectionConfig,
    events: &mut Vec<EventEnvelope>,
) {
    for violation in state.alarms.audit() {
        tracing::error!(%violation, "alarm book invariant violated");
        let InvariantViolation::DuplicateAlarm { canonical, .. } = &violation;
        let component_id = state
            .alarms
            .get(canonical)
            .map(|alarm| alarm.component_id.clone())
            .unwrap_or_else(|| ComponentId(canonical.0.clone()));
        events.push(crate::emit(
            &mut state.counters,
            tick,
            component_id,
            Severity::Critical,
            violation.to_string(),
            Event::AlarmMerged {
                alarm_id: canonical.clone(),
            },
        ));
    }

    let mut memory = std::mem::take(&mut state.detection);
    let mut candidates = Candidates::new();
    sensor_candidates(state, tick, &mut memory, config, &mut candidates);
    actuator_candidates(state, &mut candidates);
    tank_candidates(state, tick, &mut memory, config, &mut candidates);
    failure_candidates(state, &mut candidates);
    state.detection = memory;

    for (component_id, kind) in candidates.values() {
        if let Some(alarm_id) = state.alarms.raise(component_id, *kind, tick) {
            tracing::warn!(%alarm_id, tick, "alarm raised");
            events.push(crate::emit(
                &mut state.counters,
                tick,
                component_id.clone(),
                kind.severity(),
                format!("raised: {}", kind.description()),
                Event::AlarmRaised {
                    alarm_id,
                    kind: *kind,
                },
            ));
        }
    }

    // Clearing needs both the symptom gone and the component healthy.
    let to_clear: Vec<(AlarmId, ComponentId, AlarmKind)> = state
        .alarms
        .active()
        .filter(|alarm| !candidates.contains_key(&alarm.id))
        .filter(|alarm| state.health(&alarm.component_id) != Some(Health::Failed))
        .map(|alarm| (alarm.id.clone(), alarm.component_id.clone(), alarm.kind))
        .collect();

    for (alarm_id, component_id, kind) in to_clear {
        state.alarms.clear(&alarm_id, tick);
        tracing::info!(%alarm_id, tick, "alarm cleared");
        events.push(crate::emit(
            &mut state.counters,
            tick,
            component_id,
            Severity::Info,
            format!("cleared: {}", kind.description()),
            Event::AlarmCleared { alarm_id, kind },
        ));
    }
}

fn sensor_candidates(
    state: &PlantState,
    tick: u64,
    memory: &mut DetectionMemory,
    config: &DetectionConfig,
    candidates: &mut Candidates,
) {
    for sensor in state.sensors.values() {
        let implausible = sensor
            .last_reading
            .as_ref()
            .is_some_and(|reading| !sensor.is_plausible(reading));
        let streak = memory.sensor_streaks.entry(sensor.id.clone()).or_default();
        if streak.evaluated_at != Some(tick) {
            streak.count = if implausible { streak.count + 1 } else { 0 };
            streak.evaluated_at = Some(tick);
        }
        if streak.count >= config.consecutive_bad_readings {
            add_candidate(candidates, &sensor.id, AlarmKind::SensorFault);
        }
    }
}

fn actuator_candidates(state: &PlantState, candidates: &mut Candidates) {
    for valve in state.valves.values() {
        if valve.actual.position() != valve.commanded {
            add_candidate(candidates, &valve.id, AlarmKind::ActuatorFault);
        }
    }
    for pump in state.pumps.values() {
        if pump.actual != pump.commanded {
            add_candidate(candidates, &pump.id, AlarmKind::ActuatorFault);
        }
    }
}

fn failure_candidates(state: &PlantState, candidates: &mut Candidates) {
    for id in state.component_ids() {
        if state.health(id) != Some(Health::Failed) {
            continue;
        }
        if let Some(kind) = state.component_kind(id) {
            add_candidate(candidates, id, AlarmKind::for_failure(kind));
        }
    }
}

/// First plausible reading from a sensor of `kind` attached to `tank_id`.
fn tank_reading(state: &PlantState, tank_id: &ComponentId, kind: SensorKind) -> Option<Reading> {
    state
        .sensors
        .values()
        .filter(|s| s.kind == kind && s.attached_to == *tank_id)
        .find_map(|s| s.last_reading.filter(|reading| s.is_plausible(reading)))
}

/// Whether any valve or pump moved paint out of / into the tank during the
/// last advance, as reported by position feedback.
fn flow_feedback(state: &PlantState, tank_id: &ComponentId) -> (bool, bool) {
    let drawing = state
        .valves
        .values()
        .any(|v| v.tank == *tank_id && v.last_flow > 0.0)
        || state
            .pumps
            .values()
            .any(|p| p.from.as_ref() == Some(tank_id) && p.last_flow > 0.0);
    let feeding = state
        .valves
        .values()
        .any(|v| v.to.as_ref() == Some(tank_id) && v.last_flow > 0.0)
        || state
            .pumps
            .values()
            .any(|p| p.to.as_ref() == Some(tank_id) && p.last_flow > 0.0);
    (drawing, feeding)
}

fn tank_candidates(
    state: &PlantState,
    tick: u64,
    memory: &mut DetectionMemory,
    config: &DetectionConfig,
    candidates: &mut Candidates,
) {
    let tolerance = config.trend_tolerance;

    for tank in state.tanks.values() {
        let level = match tank_reading(state, &tank.id, SensorKind::Level) {
            Some(Reading::Scalar(litres)) => Some(litres),
            _ => None,
        };

        let trend = memory.level_trends.entry(tank.id.clone()).or_default();
        if trend.evaluated_at != Some(tick) {
            trend.previous = trend.current;
            trend.current = level;
            trend.evaluated_at = Some(tick);
        }

        let (drawing, feeding) = flow_feedback(state, &tank.id);
        let manual_change = tank.manual_change_tick == Some(tick);
        if let (false, Some(previous), Some(current)) = (manual_change, trend.previous, trend.current)
        {
            let delta = current - previous;
            if delta < -tolerance && !drawing {
                add_candidate(candidates, &tank.id, AlarmKind::Leak);
            }
            if delta > tolerance && !feeding {
                add_candidate(candidates, &tank.id, AlarmKind::UncontrolledInflow);
            }
            if drawing && !feeding && previous > tolerance && delta >= -tolerance {
                add_candidate(candidates, &tank.id, AlarmKind::Stagnation);
            }
        }

        let Some(litres) = level else {
            continue;
        };

        if config.cross_check {
            if let Some(color) = tank_reading(state, &tank.id, SensorKind::Color) {
                let level_says_empty = litres <= 0.0;
                let color_says_empty = matches!(color, Reading::Blank);
                if level_says_empty != color_says_empty {
                    add_candidate(candidates, &tank.id, AlarmKind::SensorConflict);
                }
            }
            switch_conflicts(state, tank, litres, candidates);
        }

        let fraction = litres / tank.capacity;
        if tank.level_bands.low.is_some_and(|low| fraction <= low) {
            add_candidate(candidates, &tank.id, AlarmKind::LevelLow);
        }
        if tank.level_bands.high.is_some_and(|high| fraction >= high) {
            add_candidate(candidates, &tank.id, AlarmKind::LevelHigh);
        }
        if tank.level_bands.empty && litres <= tolerance {
            add_candidate(candidates, &tank.id, AlarmKind::Empty);
        }
        if tank.level_bands.emptying && drawing && litres > tolerance {
            add_candidate(candidates, &tank.id, AlarmKind::Emptying);
        }
    }
}

/// Compares every level switch on the tank with what the continuous level
/// reading says the switch should show.
fn switch_conflicts(
    state: &PlantState,
    tank: &TankState,
    litres: f64,
    candidates: &mut Candidates,
) {
    let switches = state
        .sensors
        .values()
        .filter(|s| s.kind == SensorKind::Switch && s.attached_to == tank.id);
    for sensor in switches {
        let (Some(switch), Some(Reading::Switch(tripped))) = (sensor.switch, sensor.last_reading)
        else {
            continue;
        };
        if tripped != switch.tripped(litres, tank.capacity) {
            add_candidate(candidates, &tank.id, AlarmKind::LevelConflict(switch.point));
        }
    }
}
