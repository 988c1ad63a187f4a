//! Refresh decision engine.
//!
//! A pure state machine over `Idle`/`Refreshing`:
//! - **Input**: [`EngineEvent`]
//! - **Output**: `Vec<EngineCommand>` for the loader to execute
//!
//! It never performs I/O and never awaits. At most one cycle is in flight;
//! any number of requests made during a cycle collapse into one follow-up.

pub mod state;
mod logic;
pub mod types;

#[cfg(test)]
mod tests;

pub use crate::documents::engine::state::{Phase, RefreshCycle};
pub use crate::documents::engine::types::{EngineCommand, EngineEvent};

use state::EngineState;

#[derive(Debug, Default)]
pub struct RefreshEngine {
    state: EngineState,
}

impl RefreshEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event, get the commands it implies.
    pub fn handle_event(&mut self, event: EngineEvent) -> Vec<EngineCommand> {
        match event {
            EngineEvent::RefreshRequested => logic::on_refresh_requested(&mut self.state),
            EngineEvent::ListenerAdded { cache_populated } => {
                logic::on_listener_added(&mut self.state, cache_populated)
            }
            EngineEvent::CycleSettled(cycle) => logic::on_cycle_settled(&mut self.state, cycle),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn has_coalesced_request(&self) -> bool {
        self.state.had_coalesced_request
    }

    pub fn cycles_started(&self) -> u64 {
        self.state.cycles_started
    }

    pub fn notifications(&self) -> u64 {
        self.state.notifications
    }

    pub fn last_cycle(&self) -> Option<&RefreshCycle> {
        self.state.last_cycle.as_ref()
    }
}
