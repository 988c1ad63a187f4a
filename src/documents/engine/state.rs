use std::collections::BTreeSet;

use crate::documents::types::DocTypeCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Refreshing,
}

/// What one reconciliation cycle did, reported back when it settles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshCycle {
    /// Types considered stale when the cycle started.
    pub stale_set: BTreeSet<DocTypeCode>,
    /// Nothing tracked was cached when the cycle started.
    pub cold_start: bool,
    pub produced_changes: bool,
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub phase: Phase,

    /// A refresh was requested while a cycle was in flight.
    pub had_coalesced_request: bool,

    pub cycles_started: u64,
    pub notifications: u64,
    pub last_cycle: Option<RefreshCycle>,
}
