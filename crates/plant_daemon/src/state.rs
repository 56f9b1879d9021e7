use plant_core::{Command, CommandEnvelope, CommandId, EventEnvelope, PlantState};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::history::History;

/// Commands submitted over HTTP, waiting for the next tick.
///
/// Also owns the command id counter so operator and controller commands
/// draw from one sequence.
#[derive(Debug)]
pub struct CommandQueue {
    pub next_id: u64,
    pub pending: Vec<CommandEnvelope>,
}

impl CommandQueue {
    pub fn new(next_id: u64) -> Self {
        Self {
            next_id,
            pending: Vec::new(),
        }
    }

    pub fn submit(&mut self, issued_tick: u64, command: Command) -> CommandId {
        let id = CommandId(format!("cmd_{:06}", self.next_id));
        self.next_id += 1;
        self.pending.push(CommandEnvelope {
            id: id.clone(),
            issued_tick,
            command,
        });
        id
    }
}

pub type SharedQueue = Arc<parking_lot::Mutex<CommandQueue>>;
pub type SharedHistory = Arc<parking_lot::Mutex<History>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

/// Read side handed to the HTTP handlers. The live `PlantState` is owned by
/// the tick loop; handlers only see the copy it last published.
#[derive(Clone)]
pub struct AppState {
    pub plant: watch::Receiver<Arc<PlantState>>,
    pub commands: SharedQueue,
    pub history: SharedHistory,
    pub event_tx: EventTx,
    pub paused: Arc<AtomicBool>,
    pub shutdown: watch::Receiver<bool>,
    pub tick_period_ms: u64,
}
