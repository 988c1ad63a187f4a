pub mod listeners;
pub mod orchestrator;


pub use listeners::{DocumentsListener, ListenerId};
pub use orchestrator::DocumentsLoader;
