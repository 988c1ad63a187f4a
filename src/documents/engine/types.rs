use crate::documents::engine::state::RefreshCycle;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A caller asked for a refresh.
    RefreshRequested,
    /// A listener registered; `cache_populated` tells whether any tracked
    /// type is already stored.
    ListenerAdded { cache_populated: bool },
    /// The in-flight cycle finished (successfully or not).
    CycleSettled(RefreshCycle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Spawn a new cycle. Never emitted while another is in flight.
    StartCycle,
    /// Fire "documents were updated" on the notification context.
    NotifyListeners,
    EnterIdle,
}
