use crate::documents::engine::{EngineCommand, EngineEvent, Phase, RefreshCycle, RefreshEngine};

fn settled(produced_changes: bool) -> EngineEvent {
    EngineEvent::CycleSettled(RefreshCycle {
        produced_changes,
        ..Default::default()
    })
}

#[test]
fn first_request_starts_a_cycle() {
    let mut engine = RefreshEngine::new();

    let cmds = engine.handle_event(EngineEvent::RefreshRequested);

    assert_eq!(cmds, vec![EngineCommand::StartCycle]);
    assert_eq!(engine.phase(), Phase::Refreshing);
}

#[test]
fn burst_during_cycle_collapses_into_one_follow_up() {
    let mut engine = RefreshEngine::new();
    engine.handle_event(EngineEvent::RefreshRequested);

    for _ in 0..10 {
        let cmds = engine.handle_event(EngineEvent::RefreshRequested);
        assert!(cmds.is_empty(), "no second concurrent cycle");
    }
    assert!(engine.has_coalesced_request());

    let cmds = engine.handle_event(settled(true));
    assert_eq!(cmds, vec![EngineCommand::NotifyListeners, EngineCommand::StartCycle]);
    assert_eq!(engine.phase(), Phase::Refreshing);
    assert!(!engine.has_coalesced_request());

    let cmds = engine.handle_event(settled(false));
    assert_eq!(cmds, vec![EngineCommand::EnterIdle]);
    assert_eq!(engine.phase(), Phase::Idle);
    assert_eq!(engine.cycles_started(), 2);
}

#[test]
fn unchanged_cycle_does_not_notify() {
    let mut engine = RefreshEngine::new();
    engine.handle_event(EngineEvent::RefreshRequested);

    let cmds = engine.handle_event(settled(false));

    assert_eq!(cmds, vec![EngineCommand::EnterIdle]);
    assert_eq!(engine.notifications(), 0);
}

#[test]
fn listener_on_empty_cache_cold_starts_once() {
    let mut engine = RefreshEngine::new();

    let cmds = engine.handle_event(EngineEvent::ListenerAdded { cache_populated: false });
    assert_eq!(cmds, vec![EngineCommand::StartCycle]);

    // A second listener defers to the cycle already running.
    let cmds = engine.handle_event(EngineEvent::ListenerAdded { cache_populated: false });
    assert!(cmds.is_empty());
    assert!(!engine.has_coalesced_request());
}

#[test]
fn listener_on_populated_cache_does_nothing() {
    let mut engine = RefreshEngine::new();
    let cmds = engine.handle_event(EngineEvent::ListenerAdded { cache_populated: true });
    assert!(cmds.is_empty());
    assert_eq!(engine.phase(), Phase::Idle);
}

#[test]
fn stray_settle_while_idle_is_ignored() {
    let mut engine = RefreshEngine::new();
    assert!(engine.handle_event(settled(true)).is_empty());
    assert_eq!(engine.notifications(), 0);
}
