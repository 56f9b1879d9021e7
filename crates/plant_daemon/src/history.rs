use std::collections::{BTreeMap, VecDeque};

use plant_core::{ComponentId, PlantState};
use serde::Serialize;

/// Samples kept per tank.
pub const HISTORY_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankSample {
    pub tick: u64,
    pub level: f64,
    /// Whether any outlet valve reported open during the tick.
    pub outlet_open: bool,
}

/// Rolling level/valve history for every tank, oldest sample first.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct History {
    tanks: BTreeMap<ComponentId, VecDeque<TankSample>>,
}

impl History {
    /// Records one sample per tank from a post-tick state.
    pub fn record(&mut self, state: &PlantState) {
        let tick = state.meta.tick.saturating_sub(1);
        for tank in state.tanks.values() {
            let outlet_open = tank
                .outlets
                .iter()
                .filter_map(|valve_id| state.valves.get(valve_id))
                .any(|valve| valve.actual.is_open());
            let samples = self.tanks.entry(tank.id.clone()).or_default();
            if samples.len() == HISTORY_LEN {
                samples.pop_front();
            }
            samples.push_back(TankSample {
                tick,
                level: tank.level(),
                outlet_open,
            });
        }
    }

    pub fn samples(&self, tank_id: &ComponentId) -> Option<&VecDeque<TankSample>> {
        self.tanks.get(tank_id)
    }
}
