use crate::documents::engine::state::{EngineState, Phase, RefreshCycle};
use crate::documents::engine::types::EngineCommand;

fn start_cycle(state: &mut EngineState) -> EngineCommand {
    state.phase = Phase::Refreshing;
    state.cycles_started += 1;
    log::debug!("[ENGINE] starting cycle #{}", state.cycles_started);
    EngineCommand::StartCycle
}

pub fn on_refresh_requested(state: &mut EngineState) -> Vec<EngineCommand> {
    match state.phase {
        Phase::Idle => vec![start_cycle(state)],
        Phase::Refreshing => {
            log::debug!("[ENGINE] already refreshing, coalescing request");
            state.had_coalesced_request = true;
            vec![]
        }
    }
}

pub fn on_listener_added(state: &mut EngineState, cache_populated: bool) -> Vec<EngineCommand> {
    if cache_populated {
        return vec![];
    }
    match state.phase {
        Phase::Idle => {
            log::info!("[ENGINE] no cached documents, cold start");
            vec![start_cycle(state)]
        }
        // The running cycle will populate the cache.
        Phase::Refreshing => vec![],
    }
}

pub fn on_cycle_settled(state: &mut EngineState, cycle: RefreshCycle) -> Vec<EngineCommand> {
    if state.phase != Phase::Refreshing {
        log::warn!("[ENGINE] cycle settled while idle, ignoring");
        return vec![];
    }

    let mut cmds = Vec::new();

    if cycle.produced_changes {
        state.notifications += 1;
        cmds.push(EngineCommand::NotifyListeners);
    }
    state.last_cycle = Some(cycle);

    if state.had_coalesced_request {
        state.had_coalesced_request = false;
        cmds.push(start_cycle(state));
    } else {
        state.phase = Phase::Idle;
        cmds.push(EngineCommand::EnterIdle);
    }

    cmds
}
