//! Document freshness reconciliation.
//!
//! - [`engine`]: pure refresh state machine (idle / refreshing / coalescing)
//! - [`freshness`] and [`merge`]: what is stale, how responses are folded in
//! - [`source`]: where documents come from
//! - [`runtime`]: the loader that drives all of the above
//! - [`processor`]: read side for presentation

pub mod engine;
pub mod freshness;
pub mod merge;
pub mod ordering;
pub mod processor;
pub mod runtime;
pub mod source;
pub mod types;
